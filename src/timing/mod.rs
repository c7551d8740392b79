pub mod commands;
pub mod editor;
pub mod file;
pub mod recorder;

pub use commands::EditorCommand;
pub use editor::TimingEditor;
pub use file::{TimingEntry, TimingFile};
pub use recorder::{RecordingState, TimingRecorder, DEFAULT_SPAN};
