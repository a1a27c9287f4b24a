mod job;
mod state;

pub use job::{ArtifactKind, FailureKind, JobSpec, JobState, JobStatus, RetryPolicy, Unit};
pub use state::{Event, StateMachine, Transition};
