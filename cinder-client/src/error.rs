use std::time::Duration;

use thiserror::Error;

/// Why a round trip produced no usable response.
///
/// The `Display` text is what the console shows the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The service answered, but reported failure.
    #[error("{}", service_text(*status, message.as_deref()))]
    Service { status: u16, message: Option<String> },

    /// No response was received at all.
    #[error("Cannot connect to the compiler service. Please check if the server is running.")]
    Transport(String),

    #[error("The compiler service did not answer within {}s.", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("Run cancelled.")]
    Cancelled,

    #[error("An unexpected error occurred: {0}")]
    Unknown(String),
}

/// Fieldless classification, carried by a failed run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Service,
    Transport,
    Timeout,
    Cancelled,
    Unknown,
}

impl ExecutionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutionError::Service { .. } => ErrorKind::Service,
            ExecutionError::Transport(_) => ErrorKind::Transport,
            ExecutionError::Timeout(_) => ErrorKind::Timeout,
            ExecutionError::Cancelled => ErrorKind::Cancelled,
            ExecutionError::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

fn service_text(status: u16, message: Option<&str>) -> String {
    match message {
        Some(msg) => format!("Error: {}", msg),
        None => {
            let reason = reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("");
            format!("Server error: {} {}", status, reason).trim_end().to_string()
        }
    }
}
