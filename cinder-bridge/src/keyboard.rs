//! Line dispatch: what a typed line means given the active affordance.
//!
//! While the program waits for input every line, empty ones included, goes to
//! the program. Otherwise lines are console commands:
//!   run / r / Enter → start a run
//!   clear           → clear the transcript
//!   show            → print the current source
//!   help / ?        → list commands
//!   quit / q / exit → leave
//!
//! While waiting, `:cancel`, `:quit` and `:help` still reach the console.

use cinder_core::Affordance;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
    Run,
    Submit(String),
    Abandon,
    Clear,
    Show,
    Help,
    Quit,
    /// Typed while a request was outstanding; dropped.
    Ignored(String),
    Unknown(String),
}

/// Prefix that escapes a console command while the program is waiting for input.
pub const COMMAND_PREFIX: &str = ":";

pub fn parse_action(line: &str, affordance: Affordance) -> ViewAction {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);

    match affordance {
        Affordance::Disabled => ViewAction::Ignored(line.to_string()),
        Affordance::Submit => match line.strip_prefix(COMMAND_PREFIX) {
            Some(cmd) if is_waiting_command(cmd) => parse_command(cmd),
            _ => ViewAction::Submit(line.to_string()),
        },
        Affordance::Run => {
            let cmd = line.trim();
            parse_command(cmd.strip_prefix(COMMAND_PREFIX).unwrap_or(cmd))
        }
    }
}

/// Commands reachable while the program is waiting for input.
/// Anything else after `:` is ordinary input.
fn is_waiting_command(cmd: &str) -> bool {
    matches!(cmd.trim(), "cancel" | "quit" | "q" | "help")
}

fn parse_command(cmd: &str) -> ViewAction {
    match cmd.trim().to_lowercase().as_str() {
        "" | "run" | "r" => ViewAction::Run,
        "cancel" => ViewAction::Abandon,
        "clear" | "cls" => ViewAction::Clear,
        "show" | "cat" => ViewAction::Show,
        "help" | "?" => ViewAction::Help,
        "quit" | "q" | "exit" => ViewAction::Quit,
        other => ViewAction::Unknown(other.to_string()),
    }
}

pub const HELP_TEXT: &str = "\
Commands:
  run, r, <Enter>   compile and run the source
  show              print the source that will run
  clear             clear the transcript
  help              show this help
  quit, q           exit
While the program waits for input, every line is sent to it.
  :cancel           abandon the waiting program
  :quit             exit
Ctrl+C cancels a request in flight, or exits when idle.";
