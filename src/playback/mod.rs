pub mod commands;
pub mod controller;
pub mod state;
pub mod view;

pub use commands::{dispatch, CommandOutcome, PlayerCommand};
pub use controller::{PlaybackController, PlaybackEvent};
pub use state::{PlaybackState, PlaybackStatus};
pub use view::{LineView, PlaybackSnapshot, SegmentView};
