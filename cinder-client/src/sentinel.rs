//! Waiting-for-input marker detection.
//!
//! The compile service has no channel for "the program is blocked on stdin".
//! It signals that condition by embedding a reserved marker in the `output`
//! text. All knowledge of the marker lives here: callers above the client only
//! ever see a boolean and clean text.

/// Marker the service places in `output` when the program blocks on a read.
pub const DEFAULT_MARKER: &str = "\u{1}[awaiting-input]\u{1}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentinel {
    marker: String,
}

impl Sentinel {
    /// An empty marker would match every output, so it falls back to the default.
    pub fn new(marker: impl Into<String>) -> Self {
        let marker = marker.into();
        if marker.is_empty() {
            tracing::warn!("Empty sentinel marker ignored, using the default");
            return Self::default();
        }
        Self { marker }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Exact, case-sensitive check.
    pub fn is_present(&self, output: &str) -> bool {
        output.contains(self.marker.as_str())
    }

    /// Strip every occurrence of the marker.
    /// Returns the remaining text and whether the marker was present.
    ///
    /// The service puts the marker at the start of `output`, but it is
    /// accepted in any position.
    pub fn split(&self, output: &str) -> (String, bool) {
        if !self.is_present(output) {
            return (output.to_string(), false);
        }
        (output.replace(self.marker.as_str(), ""), true)
    }
}

impl Default for Sentinel {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
        }
    }
}
