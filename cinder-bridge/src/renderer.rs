//! Terminal Renderer — turns the console transcript into styled terminal text.
//!
//! Only entries that are new since the last frame are printed. A transcript
//! reset (new run in reset mode, or an explicit clear) produces a clearing frame.

use crossterm::style::Stylize;

use cinder_core::{Affordance, Console, ErrorKind, RunStatus, TranscriptEntry, TranscriptMode};

/// What the view should write next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Clear the screen before writing `text`.
    pub clear: bool,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct TranscriptPrinter {
    color: bool,
    /// The terminal already echoed typed lines, so incremental frames skip them.
    terminal_echo: bool,
    printed: u64,
    run: u64,
    at_line_start: bool,
}

impl TranscriptPrinter {
    pub fn new(color: bool) -> Self {
        Self {
            color,
            terminal_echo: false,
            printed: 0,
            run: 0,
            at_line_start: true,
        }
    }

    pub fn with_terminal_echo(mut self, terminal_echo: bool) -> Self {
        self.terminal_echo = terminal_echo;
        self
    }

    pub fn at_line_start(&self) -> bool {
        self.at_line_start
    }

    /// The cursor moved to a new line outside the printer's control.
    pub fn mark_line_start(&mut self) {
        self.at_line_start = true;
    }

    /// Render everything appended since the previous call.
    pub fn catch_up(&mut self, console: &Console) -> Frame {
        let transcript = console.transcript();
        let entries = transcript.entries();

        let new_run = console.run_number() != self.run;
        let clear = transcript.appended() < self.printed
            || (new_run && console.mode() == TranscriptMode::ResetPerRun);

        let fresh = if clear {
            self.at_line_start = true;
            entries.len()
        } else {
            ((transcript.appended() - self.printed) as usize).min(entries.len())
        };

        let mut text = String::new();
        let skip_input = self.terminal_echo && !clear;
        for entry in &entries[entries.len() - fresh..] {
            self.write_entry(entry, skip_input, &mut text);
        }

        self.printed = transcript.appended();
        self.run = console.run_number();
        Frame { clear, text }
    }

    fn write_entry(&mut self, entry: &TranscriptEntry, skip_input: bool, out: &mut String) {
        match entry {
            TranscriptEntry::Output(s) => {
                out.push_str(s);
                if !s.is_empty() {
                    self.at_line_start = s.ends_with('\n');
                }
            }
            TranscriptEntry::Input(_) if skip_input => self.at_line_start = true,
            TranscriptEntry::Input(s) => {
                out.push_str(&self.paint(s, Paint::Input));
                out.push('\n');
                self.at_line_start = true;
            }
            TranscriptEntry::Status(s) => self.write_line(s, Paint::Status, out),
            TranscriptEntry::Error(s) => self.write_line(s, Paint::Error, out),
        }
    }

    fn write_line(&mut self, s: &str, paint: Paint, out: &mut String) {
        if !self.at_line_start {
            out.push('\n');
        }
        out.push_str(&self.paint(s, paint));
        out.push('\n');
        self.at_line_start = true;
    }

    fn paint(&self, s: &str, paint: Paint) -> String {
        if !self.color {
            return s.to_string();
        }
        match paint {
            Paint::Status => s.dark_grey().to_string(),
            Paint::Input => s.green().to_string(),
            Paint::Error => s.red().bold().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Paint {
    Status,
    Input,
    Error,
}

// ════════════════════════════════════════════════════════════════════
// Prompt & status
// ════════════════════════════════════════════════════════════════════

/// Prompt for the active affordance.
///
/// No prompt while the program waits for input: its own prompt is already
/// on screen. None while a request is outstanding either.
pub fn prompt(affordance: Affordance) -> Option<&'static str> {
    match affordance {
        Affordance::Run => Some("cinder ▸ "),
        Affordance::Submit | Affordance::Disabled => None,
    }
}

/// One-line summary shown after a run ends, e.g. `✔ exit 0 · 14:02:11`.
pub fn status_badge(status: RunStatus, at: &str) -> Option<String> {
    let label = match status {
        RunStatus::Completed(Some(0)) => "✔ exit 0".to_string(),
        RunStatus::Completed(Some(code)) => format!("✘ exit {}", code),
        RunStatus::Completed(None) => "✔ finished".to_string(),
        RunStatus::Failed(kind) => format!("✘ {}", kind_label(kind)),
        RunStatus::Idle | RunStatus::Running | RunStatus::AwaitingInput => return None,
    };
    Some(format!("{} · {}", label, at))
}

pub fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Service => "service error",
        ErrorKind::Transport => "connection error",
        ErrorKind::Timeout => "timed out",
        ErrorKind::Cancelled => "cancelled",
        ErrorKind::Unknown => "unexpected error",
    }
}
