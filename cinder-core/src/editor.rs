//! The editing capability: whatever hosts the program text.
//!
//! The console only reads the buffer when a run starts. It never depends on
//! how the text is edited.

use std::sync::{Arc, Mutex};

/// Program shown when no source file is given.
pub const HELLO_WORLD_C: &str =
    "#include <stdio.h>\n\nint main() {\n    printf(\"Hello, World!\\n\");\n    return 0;\n}";

pub type ChangeCallback = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
#[error("editor error: {0}")]
pub struct EditorError(pub String);

pub trait SourceEditor: Send {
    /// Language the buffer is configured for (e.g. `"c"`).
    fn language(&self) -> &str;

    /// Current buffer contents. Possibly empty.
    fn text(&self) -> String;

    fn set_text(&mut self, text: &str) -> Result<(), EditorError>;

    /// Register a callback fired with the new contents after every change.
    fn on_change(&mut self, callback: ChangeCallback);
}

/// In-memory buffer.
pub struct MemoryEditor {
    language: String,
    text: Arc<Mutex<String>>,
    callbacks: Vec<ChangeCallback>,
}

impl std::fmt::Debug for MemoryEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEditor")
            .field("language", &self.language)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl MemoryEditor {
    pub fn new(language: &str, text: &str) -> Self {
        Self {
            language: language.to_string(),
            text: Arc::new(Mutex::new(text.to_string())),
            callbacks: Vec::new(),
        }
    }
}

impl Default for MemoryEditor {
    fn default() -> Self {
        Self::new("c", HELLO_WORLD_C)
    }
}

impl SourceEditor for MemoryEditor {
    fn language(&self) -> &str {
        &self.language
    }

    fn text(&self) -> String {
        self.text.lock().map(|t| t.clone()).unwrap_or_default()
    }

    fn set_text(&mut self, text: &str) -> Result<(), EditorError> {
        {
            let mut guard = self
                .text
                .lock()
                .map_err(|_| EditorError("buffer lock poisoned".to_string()))?;
            if *guard == text {
                return Ok(());
            }
            *guard = text.to_string();
        }
        for cb in &self.callbacks {
            cb(text);
        }
        Ok(())
    }

    fn on_change(&mut self, callback: ChangeCallback) {
        self.callbacks.push(callback);
    }
}
