pub mod commands;
pub mod controller;
pub mod state;

pub use commands::ViewerCommand;
pub use controller::SequenceController;
pub use state::{PlaybackMode, PlaybackState};
