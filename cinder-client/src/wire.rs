//! Request and response bodies of `POST /api/compile`.

use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::sentinel::Sentinel;

/// One round trip's worth of work: the whole program plus all stdin seen so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileRequest {
    #[serde(rename = "code")]
    pub source: String,
    #[serde(rename = "input")]
    pub stdin: String,
}

impl CompileRequest {
    pub fn new(source: impl Into<String>, stdin: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            stdin: stdin.into(),
        }
    }
}

/// Raw body returned by the service, success or failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompileReply {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default, rename = "exitCode")]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A classified, marker-free response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileResponse {
    pub output: String,
    pub exit_code: Option<i32>,
    pub waiting_for_input: bool,
}

/// Classify one HTTP exchange.
///
/// - non-2xx, or any body carrying `error` → `Service`
/// - 2xx with an undecodable body → `Unknown`
/// - otherwise the output is split on the sentinel
pub fn interpret_reply(
    status: u16,
    body: &str,
    sentinel: &Sentinel,
) -> Result<CompileResponse, ExecutionError> {
    let success = (200..300).contains(&status);
    let parsed = serde_json::from_str::<CompileReply>(body);

    if !success {
        let message = parsed.ok().and_then(|r| r.error);
        return Err(ExecutionError::Service { status, message });
    }

    let reply = parsed.map_err(|e| {
        ExecutionError::Unknown(format!("malformed response body: {}", e))
    })?;

    if let Some(message) = reply.error {
        return Err(ExecutionError::Service {
            status,
            message: Some(message),
        });
    }

    let (output, waiting_for_input) = sentinel.split(reply.output.as_deref().unwrap_or(""));

    Ok(CompileResponse {
        output,
        exit_code: reply.exit_code,
        waiting_for_input,
    })
}
