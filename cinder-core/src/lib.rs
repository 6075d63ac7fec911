pub mod console;
pub mod editor;
pub mod input;
pub mod session;
pub mod transcript;

// Re-export the main types so users can just use `cinder_core::Session`
pub use console::{Affordance, Console, ConsoleConfig, ConsoleError, ConsoleEvent, RunStatus};
pub use editor::{MemoryEditor, SourceEditor};
pub use input::InputBuffer;
pub use session::Session;
pub use transcript::{EntryKind, Transcript, TranscriptEntry, TranscriptMode};

// Re-export the client surface the UI needs
pub use cinder_client::{CompileBackend, ErrorKind, ExecutionError};
