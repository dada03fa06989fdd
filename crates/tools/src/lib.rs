//! Built-in tool implementations for Prowl.
//!
//! The task management tools are the interesting ones: they give the model
//! the ability to schedule proactive work for itself — "remind me", "check
//! this every five minutes" — which re-enters the system through the same
//! scheduler the CLI uses.

pub mod clock;
pub mod tasks;

use prowl_core::tool::ToolRegistry;
use prowl_scheduler::Scheduler;
use std::sync::Arc;

pub use clock::ClockTool;
pub use tasks::{CancelTaskTool, ListTasksTool, ScheduleTaskTool};

/// Create a registry with all built-in tools wired to the given scheduler.
pub fn default_registry(scheduler: Arc<Scheduler>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ClockTool));
    registry.register(Box::new(ScheduleTaskTool::new(scheduler.clone())));
    registry.register(Box::new(ListTasksTool::new(scheduler.clone())));
    registry.register(Box::new(CancelTaskTool::new(scheduler)));
    registry
}
