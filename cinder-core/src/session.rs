//! Async driver tying the console state machine to a compile backend.

use std::future::Future;
use std::sync::Arc;

use cinder_client::{CompileBackend, CompileRequest};
use tracing::{debug, warn};

use crate::console::{Affordance, Console, ConsoleConfig, ConsoleError, ConsoleEvent, RunStatus};

/// One user's console session.
///
/// Every operation takes `&mut self` and awaits its round trip before
/// returning, so a second request cannot be issued while one is outstanding.
pub struct Session<B: CompileBackend + ?Sized> {
    console: Console,
    backend: Arc<B>,
}

impl<B: CompileBackend + ?Sized> std::fmt::Debug for Session<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("status", &self.console.status())
            .field("runs", &self.console.run_number())
            .finish()
    }
}

impl<B: CompileBackend + ?Sized> Session<B> {
    pub fn new(backend: Arc<B>, config: ConsoleConfig) -> Self {
        Self {
            console: Console::new(config),
            backend,
        }
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn status(&self) -> RunStatus {
        self.console.status()
    }

    pub fn affordance(&self) -> Affordance {
        self.console.affordance()
    }

    pub fn clear_transcript(&mut self) -> Result<(), ConsoleError> {
        self.console.clear_transcript()
    }

    /// Start a new run of `source` with empty stdin.
    pub async fn run(&mut self, source: &str) -> Result<RunStatus, ConsoleError> {
        self.run_until(source, std::future::pending::<()>()).await
    }

    /// Feed one line to a program blocked on input.
    pub async fn submit(&mut self, line: &str) -> Result<RunStatus, ConsoleError> {
        self.submit_until(line, std::future::pending::<()>()).await
    }

    /// As [`Session::run`], abandoning the round trip if `cancel` resolves first.
    pub async fn run_until<F>(&mut self, source: &str, cancel: F) -> Result<RunStatus, ConsoleError>
    where
        F: Future,
    {
        let request = self.begin_run(source)?;
        self.round_trip(request, cancel).await
    }

    /// As [`Session::submit`], abandoning the round trip if `cancel` resolves first.
    pub async fn submit_until<F>(&mut self, line: &str, cancel: F) -> Result<RunStatus, ConsoleError>
    where
        F: Future,
    {
        let request = self.begin_submit(line)?;
        self.round_trip(request, cancel).await
    }

    /// Abandon a program that is blocked on input.
    pub fn abandon(&mut self) -> Result<RunStatus, ConsoleError> {
        self.console.apply(ConsoleEvent::Cancel)?;
        Ok(self.console.status())
    }

    /// First half of [`Session::run`]: start the run and return the request to send.
    ///
    /// Lets a view repaint (e.g. show "Compiling...") before awaiting
    /// [`Session::round_trip`].
    pub fn begin_run(&mut self, source: &str) -> Result<CompileRequest, ConsoleError> {
        let event = ConsoleEvent::Run {
            source: source.to_string(),
        };
        self.console
            .apply(event)?
            .ok_or(ConsoleError::NoRequestInFlight)
    }

    /// First half of [`Session::submit`].
    pub fn begin_submit(&mut self, line: &str) -> Result<CompileRequest, ConsoleError> {
        let event = ConsoleEvent::Submit {
            line: line.to_string(),
        };
        self.console
            .apply(event)?
            .ok_or(ConsoleError::NoRequestInFlight)
    }

    /// Second half: perform the round trip for a request returned by
    /// [`Session::begin_run`] or [`Session::begin_submit`].
    pub async fn round_trip<F>(
        &mut self,
        request: CompileRequest,
        cancel: F,
    ) -> Result<RunStatus, ConsoleError>
    where
        F: Future,
    {
        if self.console.status() != RunStatus::Running {
            return Err(ConsoleError::NoRequestInFlight);
        }

        let event = tokio::select! {
            result = self.backend.execute(&request) => match result {
                Ok(resp) => ConsoleEvent::Responded(resp),
                Err(err) => ConsoleEvent::Failed(err),
            },
            _ = cancel => {
                warn!("Round trip cancelled by the user");
                ConsoleEvent::Cancel
            }
        };

        self.console.apply(event)?;
        debug!("Round trip finished: {:?}", self.console.status());
        Ok(self.console.status())
    }
}
