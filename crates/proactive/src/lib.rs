//! The proactive delivery pipeline: watcher + coordinator.
//!
//! The scheduler writes pending work items to disk; this crate gets them
//! into a conversation. The [`Watcher`] observes the pending directory
//! through two racing discovery paths (a live nudge channel and a periodic
//! re-scan backstop) and delivers each item to a handler exactly once per
//! process lifetime. The [`ProactiveCoordinator`] is that handler: it turns
//! an item into a synthetic user message, steers it into the agent, and
//! wakes the agent if it is idle.

pub mod coordinator;
pub mod watcher;

pub use coordinator::{ProactiveCoordinator, Steerable};
pub use watcher::{Watcher, WorkItemHandler};
