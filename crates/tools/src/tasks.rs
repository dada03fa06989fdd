//! Task management tools — the model's handle on the proactive scheduler.
//!
//! `schedule_task` creates one-shot or recurring work; `list_tasks` and
//! `cancel_task` complete the loop so the model can inspect and undo what
//! it scheduled.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prowl_core::error::ToolError;
use prowl_core::tool::{Tool, ToolResult};
use prowl_scheduler::{Scheduler, TaskAction, TaskKind, TaskSpec, Trigger};
use std::sync::Arc;

/// Create a proactive task through the scheduler.
pub struct ScheduleTaskTool {
    scheduler: Arc<Scheduler>,
}

impl ScheduleTaskTool {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for ScheduleTaskTool {
    fn name(&self) -> &str {
        "schedule_task"
    }

    fn description(&self) -> &str {
        "Schedule a proactive task. Provide either 'at' (RFC 3339 timestamp) for a one-shot task, \
         or 'every' (a \"*/N * * * *\" expression, every N minutes) for a recurring one. \
         The prompt is delivered to you as a user message when the task fires."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Short human-readable task name"
                },
                "prompt": {
                    "type": "string",
                    "description": "What to do when the task fires"
                },
                "at": {
                    "type": "string",
                    "description": "RFC 3339 timestamp for a one-shot task"
                },
                "every": {
                    "type": "string",
                    "description": "Recurrence expression, e.g. \"*/5 * * * *\" for every 5 minutes"
                },
                "max_runs": {
                    "type": "integer",
                    "description": "Optional cap on the number of firings"
                }
            },
            "required": ["name", "prompt"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let name = arguments["name"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'name' argument".into()))?;
        let prompt = arguments["prompt"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'prompt' argument".into()))?;

        let at = arguments["at"]
            .as_str()
            .map(|s| {
                DateTime::parse_from_rfc3339(s)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| ToolError::InvalidArguments(format!("Bad 'at' timestamp: {e}")))
            })
            .transpose()?;
        let every = arguments["every"].as_str().map(String::from);

        let kind = match (&at, &every) {
            (Some(_), None) => TaskKind::Scheduled,
            (None, Some(_)) => TaskKind::Recurring,
            _ => {
                return Err(ToolError::InvalidArguments(
                    "Provide exactly one of 'at' or 'every'".into(),
                ));
            }
        };

        let spec = TaskSpec {
            name: name.to_string(),
            kind,
            trigger: Trigger { at, every },
            action: TaskAction {
                prompt: prompt.to_string(),
                allowed_tools: None,
            },
            enabled: true,
            max_runs: arguments["max_runs"].as_u64().map(|n| n as u32),
        };

        let task = self
            .scheduler
            .create_task(spec)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "schedule_task".into(),
                reason: e.to_string(),
            })?;

        Ok(ToolResult::ok(format!(
            "Scheduled task '{}' (id {}), next run: {}",
            task.name,
            task.id,
            task.next_run
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "none".into())
        )))
    }
}

/// List the scheduler's tasks.
pub struct ListTasksTool {
    scheduler: Arc<Scheduler>,
}

impl ListTasksTool {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for ListTasksTool {
    fn name(&self) -> &str {
        "list_tasks"
    }

    fn description(&self) -> &str {
        "List all scheduled tasks with their ids, triggers, and run counts."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let tasks = self.scheduler.list_tasks().await;
        if tasks.is_empty() {
            return Ok(ToolResult::ok("No tasks scheduled."));
        }

        let mut lines = Vec::with_capacity(tasks.len());
        for task in tasks {
            lines.push(format!(
                "{} | {} | enabled: {} | runs: {} | next: {}",
                task.id,
                task.name,
                task.enabled,
                task.run_count,
                task.next_run
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "none".into())
            ));
        }
        Ok(ToolResult::ok(lines.join("\n")))
    }
}

/// Delete a task by id.
pub struct CancelTaskTool {
    scheduler: Arc<Scheduler>,
}

impl CancelTaskTool {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for CancelTaskTool {
    fn name(&self) -> &str {
        "cancel_task"
    }

    fn description(&self) -> &str {
        "Cancel (delete) a scheduled task by its id."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_id": {
                    "type": "string",
                    "description": "Id of the task to cancel"
                }
            },
            "required": ["task_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let task_id = arguments["task_id"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'task_id' argument".into()))?;

        let removed = self
            .scheduler
            .delete_task(task_id)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "cancel_task".into(),
                reason: e.to_string(),
            })?;

        if removed {
            Ok(ToolResult::ok(format!("Task {task_id} cancelled.")))
        } else {
            Ok(ToolResult::ok(format!("No task with id {task_id}.")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prowl_core::event::EventBus;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_scheduler(dir: &TempDir) -> Arc<Scheduler> {
        Arc::new(
            Scheduler::new(
                dir.path(),
                Duration::from_secs(60),
                Arc::new(EventBus::default()),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn schedule_one_shot_task() {
        let dir = TempDir::new().unwrap();
        let scheduler = test_scheduler(&dir);
        let tool = ScheduleTaskTool::new(scheduler.clone());

        let at = (Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
        let result = tool
            .execute(serde_json::json!({
                "name": "reminder",
                "prompt": "check the oven",
                "at": at,
            }))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.contains("reminder"));
        assert_eq!(scheduler.list_tasks().await.len(), 1);
    }

    #[tokio::test]
    async fn schedule_recurring_task() {
        let dir = TempDir::new().unwrap();
        let scheduler = test_scheduler(&dir);
        let tool = ScheduleTaskTool::new(scheduler.clone());

        let result = tool
            .execute(serde_json::json!({
                "name": "digest",
                "prompt": "summarize inbox",
                "every": "*/5 * * * *",
                "max_runs": 3,
            }))
            .await
            .unwrap();

        assert!(result.success);
        let tasks = scheduler.list_tasks().await;
        assert_eq!(tasks[0].kind, TaskKind::Recurring);
        assert_eq!(tasks[0].max_runs, Some(3));
    }

    #[tokio::test]
    async fn schedule_requires_exactly_one_trigger() {
        let dir = TempDir::new().unwrap();
        let tool = ScheduleTaskTool::new(test_scheduler(&dir));

        let neither = tool
            .execute(serde_json::json!({"name": "x", "prompt": "y"}))
            .await;
        assert!(matches!(neither, Err(ToolError::InvalidArguments(_))));

        let both = tool
            .execute(serde_json::json!({
                "name": "x",
                "prompt": "y",
                "at": Utc::now().to_rfc3339(),
                "every": "*/5 * * * *",
            }))
            .await;
        assert!(matches!(both, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn unsupported_recurrence_surfaces_as_tool_error() {
        let dir = TempDir::new().unwrap();
        let tool = ScheduleTaskTool::new(test_scheduler(&dir));

        let result = tool
            .execute(serde_json::json!({
                "name": "bad",
                "prompt": "won't work",
                "every": "0 9 * * 1-5",
            }))
            .await;
        assert!(matches!(result, Err(ToolError::ExecutionFailed { .. })));
    }

    #[tokio::test]
    async fn list_and_cancel_roundtrip() {
        let dir = TempDir::new().unwrap();
        let scheduler = test_scheduler(&dir);

        let schedule = ScheduleTaskTool::new(scheduler.clone());
        schedule
            .execute(serde_json::json!({
                "name": "doomed",
                "prompt": "soon gone",
                "every": "*/10 * * * *",
            }))
            .await
            .unwrap();

        let list = ListTasksTool::new(scheduler.clone());
        let listing = list.execute(serde_json::json!({})).await.unwrap();
        assert!(listing.output.contains("doomed"));

        let task_id = scheduler.list_tasks().await[0].id.clone();
        let cancel = CancelTaskTool::new(scheduler.clone());
        let cancelled = cancel
            .execute(serde_json::json!({"task_id": task_id}))
            .await
            .unwrap();
        assert!(cancelled.output.contains("cancelled"));

        let listing = list.execute(serde_json::json!({})).await.unwrap();
        assert_eq!(listing.output, "No tasks scheduled.");
    }
}
