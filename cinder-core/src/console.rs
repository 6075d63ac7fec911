//! The interactive run state machine.
//!
//! A stateless request/response service is made to look like a live,
//! line-buffered terminal. Each round trip resends the pinned source and all
//! stdin gathered so far; the service replays the program from the start and
//! either finishes or reports that it is blocked on a read.
//!
//! All state lives in one [`RunStatus`] value and changes only through
//! [`Console::apply`].

use cinder_client::{CompileRequest, CompileResponse, ErrorKind, ExecutionError};
use thiserror::Error;
use tracing::{debug, info};

use crate::input::InputBuffer;
use crate::transcript::{Transcript, TranscriptEntry, TranscriptMode};

/// Status line written when a run starts.
pub const COMPILING: &str = "Compiling...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    /// Exactly one request is in flight.
    Running,
    AwaitingInput,
    Completed(Option<i32>),
    Failed(ErrorKind),
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed(_) | RunStatus::Failed(_))
    }
}

/// Which user action the view should offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    Run,
    Submit,
    /// A request is outstanding; nothing may be triggered.
    Disabled,
}

#[derive(Debug, Clone)]
pub enum ConsoleEvent {
    Run { source: String },
    Submit { line: String },
    Responded(CompileResponse),
    Failed(ExecutionError),
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("a request is already in flight")]
    Busy,
    #[error("the program is not waiting for input")]
    NotAwaitingInput,
    #[error("the program is waiting for input; submit a line or cancel first")]
    AwaitingInput,
    #[error("no request is in flight")]
    NoRequestInFlight,
}

#[derive(Debug, Clone, Default)]
pub struct ConsoleConfig {
    pub mode: TranscriptMode,
    /// Byte cap for the scrollback transcript. Ignored when resetting per run.
    pub scrollback_limit: Option<usize>,
}

#[derive(Debug)]
pub struct Console {
    config: ConsoleConfig,
    status: RunStatus,
    input: InputBuffer,
    transcript: Transcript,
    /// Source pinned for the current run.
    source: String,
    /// Program output already shown for the current run, for replay de-duplication.
    shown_output: String,
    runs: u64,
}

impl Console {
    pub fn new(config: ConsoleConfig) -> Self {
        let transcript = match (config.mode, config.scrollback_limit) {
            (TranscriptMode::Scrollback, Some(limit)) => Transcript::with_limit(limit),
            _ => Transcript::new(),
        };
        Self {
            config,
            status: RunStatus::Idle,
            input: InputBuffer::new(),
            transcript,
            source: String::new(),
            shown_output: String::new(),
            runs: 0,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn affordance(&self) -> Affordance {
        match self.status {
            RunStatus::Running => Affordance::Disabled,
            RunStatus::AwaitingInput => Affordance::Submit,
            RunStatus::Idle | RunStatus::Completed(_) | RunStatus::Failed(_) => Affordance::Run,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn input(&self) -> &InputBuffer {
        &self.input
    }

    pub fn mode(&self) -> TranscriptMode {
        self.config.mode
    }

    /// Number of runs started so far, 1-based once the first run begins.
    pub fn run_number(&self) -> u64 {
        self.runs
    }

    /// Clear the transcript without touching the run. Only allowed between requests.
    pub fn clear_transcript(&mut self) -> Result<(), ConsoleError> {
        if self.status == RunStatus::Running {
            return Err(ConsoleError::Busy);
        }
        self.transcript.clear();
        Ok(())
    }

    /// The single transition function.
    ///
    /// Returns the request the caller must dispatch, if the transition issues one.
    /// A rejected event leaves every field untouched.
    pub fn apply(&mut self, event: ConsoleEvent) -> Result<Option<CompileRequest>, ConsoleError> {
        match event {
            ConsoleEvent::Run { source } => self.start_run(source).map(Some),
            ConsoleEvent::Submit { line } => self.submit_line(&line).map(Some),
            ConsoleEvent::Responded(resp) => self.on_response(resp).map(|_| None),
            ConsoleEvent::Failed(err) => self.on_failure(err).map(|_| None),
            ConsoleEvent::Cancel => self.cancel().map(|_| None),
        }
    }

    fn start_run(&mut self, source: String) -> Result<CompileRequest, ConsoleError> {
        match self.status {
            RunStatus::Running => return Err(ConsoleError::Busy),
            RunStatus::AwaitingInput => return Err(ConsoleError::AwaitingInput),
            _ => {}
        }

        self.runs += 1;
        self.input.clear();
        self.shown_output.clear();
        match self.config.mode {
            TranscriptMode::ResetPerRun => self.transcript.clear(),
            TranscriptMode::Scrollback if !self.transcript.is_empty() => {
                self.transcript
                    .push(TranscriptEntry::Status(format!("── run #{} ──", self.runs)));
            }
            TranscriptMode::Scrollback => {}
        }
        self.transcript
            .push(TranscriptEntry::Status(COMPILING.to_string()));

        self.source = source;
        self.status = RunStatus::Running;
        info!("Run #{} started ({} bytes of source)", self.runs, self.source.len());

        Ok(self.request())
    }

    fn submit_line(&mut self, line: &str) -> Result<CompileRequest, ConsoleError> {
        match self.status {
            RunStatus::AwaitingInput => {}
            RunStatus::Running => return Err(ConsoleError::Busy),
            _ => return Err(ConsoleError::NotAwaitingInput),
        }

        self.input.push_line(line);
        let echoed = self.input.lines().last().cloned().unwrap_or_default();
        self.transcript.push(TranscriptEntry::Input(echoed));
        self.status = RunStatus::Running;
        debug!("Run #{}: resubmitting with {} input line(s)", self.runs, self.input.len());

        Ok(self.request())
    }

    fn on_response(&mut self, resp: CompileResponse) -> Result<(), ConsoleError> {
        if self.status != RunStatus::Running {
            return Err(ConsoleError::NoRequestInFlight);
        }

        let fresh = self.fresh_output(&resp.output);

        if resp.waiting_for_input {
            if !fresh.is_empty() {
                self.transcript.push(TranscriptEntry::Output(fresh));
            }
            self.status = RunStatus::AwaitingInput;
            debug!("Run #{} is waiting for input", self.runs);
            return Ok(());
        }

        if fresh.is_empty() {
            self.transcript
                .push(TranscriptEntry::Status(exit_message(resp.exit_code)));
        } else {
            self.transcript.push(TranscriptEntry::Output(fresh));
        }
        self.input.clear();
        self.status = RunStatus::Completed(resp.exit_code);
        info!("Run #{} completed (exit code {:?})", self.runs, resp.exit_code);
        Ok(())
    }

    fn on_failure(&mut self, err: ExecutionError) -> Result<(), ConsoleError> {
        if self.status != RunStatus::Running {
            return Err(ConsoleError::NoRequestInFlight);
        }

        self.transcript.push(TranscriptEntry::Error(err.to_string()));
        self.input.clear();
        self.status = RunStatus::Failed(err.kind());
        info!("Run #{} failed: {:?}", self.runs, err.kind());
        Ok(())
    }

    /// Abandon the run, whether a request is in flight or the program is blocked on input.
    fn cancel(&mut self) -> Result<(), ConsoleError> {
        if self.status == RunStatus::AwaitingInput {
            // Nothing is in flight; treat the abandoned read like a cancelled request.
            self.status = RunStatus::Running;
        }
        self.on_failure(ExecutionError::Cancelled)
    }

    /// The part of `output` not yet shown in this run.
    ///
    /// The service replays the program from the beginning, so a response
    /// normally repeats everything shown before and extends it. When it does
    /// not (a nondeterministic program, or a backend that only sends new
    /// text) the whole output is treated as new.
    fn fresh_output(&mut self, output: &str) -> String {
        let fresh = match output.strip_prefix(self.shown_output.as_str()) {
            Some(rest) => rest.to_string(),
            None => {
                debug!("Replayed output diverged from what was shown; appending it whole");
                self.shown_output.clear();
                output.to_string()
            }
        };
        self.shown_output.push_str(&fresh);
        fresh
    }

    fn request(&self) -> CompileRequest {
        CompileRequest::new(self.source.clone(), self.input.stdin())
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new(ConsoleConfig::default())
    }
}

fn exit_message(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("Process exited with code {}", code),
        None => "Process exited".to_string(),
    }
}
