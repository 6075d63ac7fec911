//! Application state and the console event loop.
//!
//! KEY ARCHITECTURAL NOTES:
//!   - stdin lines are pumped into an mpsc channel by a reader task, so the
//!     loop can wait on input and Ctrl+C together.
//!   - A user action is applied first (`begin_*`), the new transcript entries
//!     are painted, then the round trip is awaited.
//!   - Every line is stamped with the input epoch it was read in. The epoch
//!     advances when a round trip starts and when it ends, so a line typed
//!     while one was outstanding is stale however late the reader delivers it.
//!   - Ctrl+C cancels an outstanding request, abandons a program waiting for
//!     input, or exits when idle.

use std::collections::VecDeque;
use std::io::{IsTerminal, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use anyhow::Result;
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use cinder_client::{CompileBackend, CompileRequest};
use cinder_core::editor::HELLO_WORLD_C;
use cinder_core::{Affordance, ConsoleConfig, ConsoleError, MemoryEditor, RunStatus, Session, SourceEditor};

use crate::config::{Args, Config};
use crate::editor::FileEditor;
use crate::keyboard::{HELP_TEXT, ViewAction, parse_action};
use crate::renderer::{self, TranscriptPrinter};

/// A line read from stdin and the input epoch it was read in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedLine {
    pub epoch: u64,
    pub text: String,
}

/// Shared input epoch. The stdin reader stamps lines, the app advances it.
#[derive(Debug, Clone, Default)]
pub struct LineClock(Arc<AtomicU64>);

impl LineClock {
    pub fn stamp(&self, text: impl Into<String>) -> TypedLine {
        TypedLine {
            epoch: self.0.load(Ordering::SeqCst),
            text: text.into(),
        }
    }

    pub fn advance(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, line: &TypedLine) -> bool {
        line.epoch == self.0.load(Ordering::SeqCst)
    }
}

/// The Cinder console. Owns all state.
pub struct CinderApp {
    pub session: Session<dyn CompileBackend>,
    pub editor: Box<dyn SourceEditor>,
    pub printer: TranscriptPrinter,
    /// Set by the editor when the source changes on disk.
    pub source_changed: Arc<AtomicBool>,
    pub color: bool,
    clock: LineClock,
    /// Current lines pulled off the channel while draining stale ones.
    pending: VecDeque<TypedLine>,
    /// Run whose end-of-run badge has been shown.
    badge_run: u64,
    pub wants_exit: bool,
}

impl CinderApp {
    pub fn new(
        backend: Arc<dyn CompileBackend>,
        mut editor: Box<dyn SourceEditor>,
        console: ConsoleConfig,
        color: bool,
        terminal_echo: bool,
    ) -> Self {
        let source_changed = Arc::new(AtomicBool::new(false));
        let flag = source_changed.clone();
        editor.on_change(Box::new(move |_| flag.store(true, Ordering::SeqCst)));

        Self {
            session: Session::new(backend, console),
            editor,
            printer: TranscriptPrinter::new(color).with_terminal_echo(terminal_echo),
            source_changed,
            color,
            clock: LineClock::default(),
            pending: VecDeque::new(),
            badge_run: 0,
            wants_exit: false,
        }
    }

    /// Handle for the stdin reader to stamp lines with.
    pub fn clock(&self) -> LineClock {
        self.clock.clone()
    }

    /// A current line kept back by the last drain.
    pub fn take_pending(&mut self) -> Option<TypedLine> {
        self.pending.pop_front()
    }

    /// Write whatever the transcript gained since the last paint.
    pub fn paint(&mut self) -> Result<()> {
        let frame = self.printer.catch_up(self.session.console());
        let mut out = std::io::stdout();
        if frame.clear {
            execute!(out, Clear(ClearType::All), MoveTo(0, 0))?;
        }
        out.write_all(frame.text.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    /// Status line and prompt, when the affordance calls for one.
    pub fn show_prompt(&mut self) -> Result<()> {
        let mut out = std::io::stdout();

        if self.session.affordance() == Affordance::Run {
            let run = self.session.console().run_number();
            if run != self.badge_run {
                let now = chrono::Local::now().format("%H:%M:%S").to_string();
                if let Some(badge) = renderer::status_badge(self.session.status(), &now) {
                    self.notice(&badge)?;
                }
                self.badge_run = run;
            }
            if self.source_changed.swap(false, Ordering::SeqCst) {
                self.notice("↻ source changed on disk")?;
            }
        }

        if let Some(prompt) = renderer::prompt(self.session.affordance()) {
            if !self.printer.at_line_start() {
                writeln!(out)?;
                self.printer.mark_line_start();
            }
            if self.color {
                write!(out, "{}", prompt.cyan())?;
            } else {
                write!(out, "{}", prompt)?;
            }
        }
        out.flush()?;
        Ok(())
    }

    fn notice(&mut self, text: &str) -> Result<()> {
        let mut out = std::io::stdout();
        if !self.printer.at_line_start() {
            writeln!(out)?;
        }
        if self.color {
            writeln!(out, "{}", text.dark_grey())?;
        } else {
            writeln!(out, "{}", text)?;
        }
        self.printer.mark_line_start();
        Ok(())
    }

    /// Handle one typed line. Stale lines are dropped.
    pub async fn handle_line(
        &mut self,
        line: TypedLine,
        lines: &mut mpsc::Receiver<TypedLine>,
    ) -> Result<()> {
        if !self.clock.is_current(&line) {
            tracing::debug!("Dropping stale line from epoch {}", line.epoch);
            return self.report_ignored(1);
        }
        match parse_action(&line.text, self.session.affordance()) {
            ViewAction::Run => {
                let source = self.editor.text();
                match self.session.begin_run(&source) {
                    Ok(request) => self.round_trip(request, lines).await?,
                    Err(e) => self.reject(e)?,
                }
            }
            ViewAction::Submit(text) => match self.session.begin_submit(&text) {
                Ok(request) => self.round_trip(request, lines).await?,
                Err(e) => self.reject(e)?,
            },
            ViewAction::Abandon => match self.session.abandon() {
                Ok(_) => self.paint()?,
                Err(e) => self.reject(e)?,
            },
            ViewAction::Clear => match self.session.clear_transcript() {
                Ok(()) => self.paint()?,
                Err(e) => self.reject(e)?,
            },
            ViewAction::Show => {
                let source = self.editor.text();
                let mut listing = String::new();
                for (i, l) in source.lines().enumerate() {
                    listing.push_str(&format!("{:>4} │ {}\n", i + 1, l));
                }
                self.notice(&format!("── {} source ──", self.editor.language()))?;
                print!("{}", listing);
            }
            ViewAction::Help => self.notice(HELP_TEXT)?,
            ViewAction::Quit => self.wants_exit = true,
            ViewAction::Ignored(_) => {}
            ViewAction::Unknown(cmd) => {
                self.notice(&format!("Unknown command {:?}. Type help.", cmd))?;
            }
        }
        Ok(())
    }

    async fn round_trip(
        &mut self,
        request: CompileRequest,
        lines: &mut mpsc::Receiver<TypedLine>,
    ) -> Result<()> {
        self.paint()?;

        // The affordance is disabled for the whole round trip.
        self.clock.advance();
        let status = self
            .session
            .round_trip(request, tokio::signal::ctrl_c())
            .await;
        self.clock.advance();

        let mut dropped = 0;
        while let Ok(line) = lines.try_recv() {
            if self.clock.is_current(&line) {
                self.pending.push_back(line);
            } else {
                dropped += 1;
            }
        }

        self.paint()?;
        self.report_ignored(dropped)?;
        if let Err(e) = status {
            self.reject(e)?;
        }
        Ok(())
    }

    fn report_ignored(&mut self, dropped: usize) -> Result<()> {
        if dropped == 0 {
            return Ok(());
        }
        self.notice(&format!("(ignored {} line(s) typed while running)", dropped))
    }

    fn reject(&mut self, err: ConsoleError) -> Result<()> {
        tracing::debug!("Action rejected: {}", err);
        self.notice(&format!("⚠️  {}", err))
    }

    /// Ctrl+C outside a round trip. Returns true when the app should exit.
    pub fn interrupt(&mut self) -> Result<bool> {
        if self.session.status() == RunStatus::AwaitingInput {
            self.session.abandon()?;
            self.printer.mark_line_start();
            println!();
            self.paint()?;
            return Ok(false);
        }
        Ok(true)
    }
}

// ════════════════════════════════════════════════════════════════════
// Entry Point
// ════════════════════════════════════════════════════════════════════

/// Run the Cinder console until the user quits or stdin closes.
pub async fn run(config: Config, args: Args) -> Result<()> {
    let backend: Arc<dyn CompileBackend> = Arc::new(config.build_client());

    let editor: Box<dyn SourceEditor> = match &args.source {
        Some(path) => Box::new(FileEditor::open(path, &config.language)?),
        None => Box::new(MemoryEditor::new(&config.language, HELLO_WORLD_C)),
    };

    let color = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    let terminal_echo = std::io::stdin().is_terminal();
    let mut app = CinderApp::new(backend, editor, config.console_config()?, color, terminal_echo);

    let (line_tx, mut line_rx) = mpsc::channel::<TypedLine>(64);
    let clock = app.clock();
    tokio::spawn(async move {
        let mut reader = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            if line_tx.send(clock.stamp(line)).await.is_err() {
                break;
            }
        }
    });

    let source_label = match &args.source {
        Some(path) => path.display().to_string(),
        None => "built-in sample".to_string(),
    };
    app.notice(&format!(
        "Cinder · {} · {} · type help",
        config.backend_url, source_label
    ))?;

    loop {
        app.show_prompt()?;
        if let Some(line) = app.take_pending() {
            app.handle_line(line, &mut line_rx).await?;
            if app.wants_exit {
                break;
            }
            continue;
        }
        tokio::select! {
            line = line_rx.recv() => match line {
                Some(line) => app.handle_line(line, &mut line_rx).await?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                if app.interrupt()? {
                    break;
                }
            }
        }
        if app.wants_exit {
            break;
        }
    }

    println!();
    tracing::info!("Cinder exiting after {} run(s)", app.session.console().run_number());
    Ok(())
}
