mod scheduler;
mod state;

pub use scheduler::ProgressScheduler;
pub use state::{ProgressState, ProgressView, RunPhase};
