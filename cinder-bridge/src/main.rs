use tracing_subscriber::EnvFilter;

use cinder_bridge::app;
use cinder_bridge::config::{self, Config};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never interleave with program output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = config::parse_args(std::env::args().skip(1))?;
    if args.help {
        println!("{}", config::USAGE);
        println!();
        println!("{}", cinder_bridge::keyboard::HELP_TEXT);
        return Ok(());
    }

    let config = Config::resolve(args.config.as_deref())?;

    tracing::info!("Cinder v{} starting...", env!("CARGO_PKG_VERSION"));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config, args))
}
