//! Task domain types — durable proactive work and its firing records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What flavor of trigger a task has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// One-shot at an absolute time; terminal after a single firing
    Scheduled,
    /// Fires on a recurrence expression, re-armed after each firing
    Recurring,
    /// Externally signalled; the scheduler never computes a next firing
    Event,
}

/// When a task should fire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trigger {
    /// Absolute instant for one-shot tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,

    /// Recurrence expression ("*/N * * * *" form) for recurring tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every: Option<String>,
}

/// What happens when a task fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAction {
    /// The prompt injected into the agent as if from the user
    pub prompt: String,

    /// Optional allow-list of tool names the firing may use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,
}

/// A durable, user- or tool-defined unit of proactive work.
///
/// Owned exclusively by the Scheduler; persisted one JSON file per task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Trigger flavor
    pub kind: TaskKind,

    /// When to fire
    pub trigger: Trigger,

    /// What to do on firing
    pub action: TaskAction,

    /// Whether this task is active
    pub enabled: bool,

    /// When this task last fired
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,

    /// Earliest future instant at which the task is eligible to fire.
    /// `None` means terminal (a fired one-shot) or externally signalled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,

    /// How many times this task has fired
    #[serde(default)]
    pub run_count: u32,

    /// Firing cap; a task at the cap is never re-armed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_runs: Option<u32>,

    /// When this task was created
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Whether the firing cap has been reached.
    pub fn exhausted(&self) -> bool {
        matches!(self.max_runs, Some(max) if self.run_count >= max)
    }

    /// Whether this task should fire at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled || self.exhausted() {
            return false;
        }
        matches!(self.next_run, Some(next) if next <= now)
    }
}

/// Input for creating a task; the scheduler fills in id, creation time,
/// and the initial `next_run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub kind: TaskKind,
    pub trigger: Trigger,
    pub action: TaskAction,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_runs: Option<u32>,
}

fn default_enabled() -> bool {
    true
}

/// The at-least-once delivery envelope for one firing of a task.
///
/// One item per occurrence: a recurring task produces a fresh item every
/// time it fires. Written by the scheduler, deleted by the watcher after
/// successful handling, orphaned on handler failure so a later scan can
/// retry it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingWorkItem {
    /// The task that fired
    pub task_id: String,

    /// The task's name at fire time
    pub task_name: String,

    /// The prompt to inject
    pub prompt: String,

    /// Optional allow-list of tool names carried from the task action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,

    /// When the task fired
    pub fired_at: DateTime<Utc>,
}

impl PendingWorkItem {
    /// The on-disk file name for this item: fire timestamp first so a
    /// directory listing sorts in firing order, task id for uniqueness.
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}.json",
            self.fired_at.format("%Y%m%dT%H%M%S%3f"),
            self.task_id
        )
    }
}

/// An immutable record of one firing's outcome. Append-only, used only for
/// observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub timestamp: DateTime<Utc>,
}
