mod engine;
pub mod recovery;
mod steps;

pub use engine::{CountdownEngine, SessionSnapshot, TimerState};
pub use recovery::{
    on_backgrounding, on_foregrounding, CheckpointStore, Clock, ManualClock,
    MemoryCheckpointStore, RecoveredState, SuspendedCheckpoint, SystemClock,
};
pub use steps::{generate_steps, Schedule, Step, StepType};
