//! File-backed editing capability.
//!
//! The user edits the source file in their own editor; the console reads it
//! at the start of every run. Changes on disk are reported through a
//! `notify` watcher on the file's directory, so atomic-rename saves are seen too.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use cinder_core::editor::{ChangeCallback, EditorError, HELLO_WORLD_C};
use cinder_core::SourceEditor;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

type Callbacks = Arc<Mutex<Vec<ChangeCallback>>>;

pub struct FileEditor {
    path: PathBuf,
    language: String,
    /// Last contents seen, so unchanged saves do not fire callbacks.
    last: Arc<Mutex<String>>,
    callbacks: Callbacks,
    watcher: Option<RecommendedWatcher>,
}

impl std::fmt::Debug for FileEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileEditor")
            .field("path", &self.path)
            .field("language", &self.language)
            .field("watching", &self.watcher.is_some())
            .finish()
    }
}

impl FileEditor {
    /// Open `path`, creating it with the sample program if it does not exist.
    pub fn open(path: &Path, language: &str) -> Result<Self> {
        if !path.exists() {
            std::fs::write(path, HELLO_WORLD_C)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            tracing::info!("Created {} with the sample program", path.display());
        }
        let path = path
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", path.display()))?;
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Ok(Self {
            path,
            language: language.to_string(),
            last: Arc::new(Mutex::new(text)),
            callbacks: Arc::new(Mutex::new(Vec::new())),
            watcher: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn start_watching(&mut self) -> Result<()> {
        if self.watcher.is_some() {
            return Ok(());
        }
        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let path = self.path.clone();
        let last = self.last.clone();
        let callbacks = self.callbacks.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_relevant(&event, &path) => {
                    if let Ok(text) = std::fs::read_to_string(&path) {
                        notify_if_changed(&last, &callbacks, text);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::debug!("Watching {} for edits", self.path.display());

        self.watcher = Some(watcher);
        Ok(())
    }
}

fn is_relevant(event: &Event, path: &Path) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_)
    ) && event
        .paths
        .iter()
        .any(|p| p.file_name() == path.file_name())
}

/// Callbacks run while `last` is held, so a change is fully reported before
/// anyone else can observe it as already seen.
fn notify_if_changed(last: &Mutex<String>, callbacks: &Callbacks, text: String) {
    let Ok(mut guard) = last.lock() else {
        return;
    };
    if *guard == text {
        return;
    }
    *guard = text.clone();
    if let Ok(cbs) = callbacks.lock() {
        for cb in cbs.iter() {
            cb(&text);
        }
    }
}

impl SourceEditor for FileEditor {
    fn language(&self) -> &str {
        &self.language
    }

    /// Fresh from disk; falls back to the last contents if the file is mid-save.
    fn text(&self) -> String {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => {
                if let Ok(mut guard) = self.last.lock() {
                    *guard = text.clone();
                }
                text
            }
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", self.path.display(), e);
                self.last.lock().map(|t| t.clone()).unwrap_or_default()
            }
        }
    }

    fn set_text(&mut self, text: &str) -> Result<(), EditorError> {
        std::fs::write(&self.path, text)
            .map_err(|e| EditorError(format!("{}: {}", self.path.display(), e)))?;
        notify_if_changed(&self.last, &self.callbacks, text.to_string());
        Ok(())
    }

    fn on_change(&mut self, callback: ChangeCallback) {
        if let Ok(mut cbs) = self.callbacks.lock() {
            cbs.push(callback);
        }
        if let Err(e) = self.start_watching() {
            tracing::warn!("File watching unavailable: {:#}", e);
        }
    }
}
