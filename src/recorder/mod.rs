pub mod controller;
pub mod events;
pub mod frame;
pub mod loop_worker;
pub mod session;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::RecorderController;
pub use events::RecorderEvent;
pub use frame::{mean_squared_difference, Frame};
pub use loop_worker::{recorder_loop, LoopOptions};
pub use session::RecordingSession;
pub use state::{transition, Action, DetectionConfig, DetectionState, RecorderStatus};
