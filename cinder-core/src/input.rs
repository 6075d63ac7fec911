/// Every line the user has submitted during the current run.
///
/// The service is stateless, so the whole buffer is resent on each round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputBuffer {
    lines: Vec<String>,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line. A trailing `\n` or `\r\n` is dropped; the newline is
    /// re-added when the buffer is rendered as stdin.
    pub fn push_line(&mut self, line: &str) {
        let line = line
            .strip_suffix('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .unwrap_or(line);
        self.lines.push(line.to_string());
    }

    /// Concatenation of all lines, each followed by `\n`.
    pub fn stdin(&self) -> String {
        let mut out = String::with_capacity(self.lines.iter().map(|l| l.len() + 1).sum());
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
