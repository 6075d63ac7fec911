//! The console transcript: program output interleaved with echoed input.

/// One chunk of the transcript, in the order it was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEntry {
    /// A line written by the console itself ("Compiling...", exit messages).
    Status(String),
    /// Raw program output. May end mid-line (e.g. a prompt).
    Output(String),
    /// A line the user submitted, echoed without its newline.
    Input(String),
    /// A failed round trip, already classified for display.
    Error(String),
}

impl TranscriptEntry {
    pub fn text(&self) -> &str {
        match self {
            TranscriptEntry::Status(s)
            | TranscriptEntry::Output(s)
            | TranscriptEntry::Input(s)
            | TranscriptEntry::Error(s) => s,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            TranscriptEntry::Status(_) => EntryKind::Status,
            TranscriptEntry::Output(_) => EntryKind::Output,
            TranscriptEntry::Input(_) => EntryKind::Input,
            TranscriptEntry::Error(_) => EntryKind::Error,
        }
    }
}

/// Entry kind without payload, for renderers that style by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Status,
    Output,
    Input,
    Error,
}

/// Whether a new run starts from a blank transcript.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TranscriptMode {
    /// Fresh terminal per run.
    #[default]
    ResetPerRun,
    /// Keep earlier runs as scrollback.
    Scrollback,
}

impl TranscriptMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "reset" | "reset-per-run" | "fresh" => Some(Self::ResetPerRun),
            "scrollback" | "keep" | "log" => Some(Self::Scrollback),
            _ => None,
        }
    }
}

/// Marker inserted where older entries were dropped.
pub const TRIM_NOTICE: &str = "··· (older output trimmed) ···";

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    bytes: usize,
    /// Entries pushed since the last clear, including any trimmed away.
    appended: u64,
    /// Soft cap on total text bytes. `None` keeps everything.
    limit: Option<usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.bytes = 0;
        self.appended = 0;
    }

    /// Monotonic within a run of pushes; drops to zero on `clear`.
    /// Lets a view print only what is new even after trimming.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.bytes += entry.text().len();
        self.appended += 1;
        self.entries.push(entry);
        self.enforce_limit();
    }

    /// Drop the oldest entries until the transcript fits, keeping at least the newest one.
    fn enforce_limit(&mut self) {
        let Some(limit) = self.limit else {
            return;
        };
        if self.bytes <= limit {
            return;
        }

        let mut drop_count = 0;
        let mut remaining = self.bytes;
        for entry in &self.entries[..self.entries.len() - 1] {
            if remaining <= limit {
                break;
            }
            remaining -= entry.text().len();
            drop_count += 1;
        }
        if drop_count == 0 {
            return;
        }

        self.entries.drain(..drop_count);
        let already_noted =
            matches!(self.entries.first(), Some(TranscriptEntry::Status(s)) if s == TRIM_NOTICE);
        if !already_noted {
            self.entries
                .insert(0, TranscriptEntry::Status(TRIM_NOTICE.to_string()));
            remaining += TRIM_NOTICE.len();
        }
        self.bytes = remaining;
        tracing::debug!("Transcript trimmed {} entries", drop_count);
    }

    /// Flatten into terminal text.
    ///
    /// Status and error lines always start on a fresh line; echoed input
    /// continues the current line, as it would after a prompt.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            match entry {
                TranscriptEntry::Output(s) => out.push_str(s),
                TranscriptEntry::Input(s) => {
                    out.push_str(s);
                    out.push('\n');
                }
                TranscriptEntry::Status(s) | TranscriptEntry::Error(s) => {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push_str(s);
                    out.push('\n');
                }
            }
        }
        out
    }
}
