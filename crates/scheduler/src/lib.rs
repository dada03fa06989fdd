//! Proactive task scheduling for Prowl.
//!
//! A `Task` describes work the agent should do without a live user request:
//! a one-shot reminder, a recurring digest, an externally signalled event.
//! The `Scheduler` owns the durable task set and, on a fixed tick, turns due
//! tasks into `PendingWorkItem`s on disk — the hand-off point to the watcher
//! that delivers them into the agent.

pub mod recurrence;
pub mod scheduler;
pub mod store;
pub mod task;

pub use recurrence::Recurrence;
pub use scheduler::Scheduler;
pub use store::{PendingStore, ResultStore, TaskStore};
pub use task::{PendingWorkItem, Task, TaskAction, TaskKind, TaskResult, TaskSpec, Trigger};
