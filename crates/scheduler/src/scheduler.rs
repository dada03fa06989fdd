//! The scheduler — durable task CRUD plus the periodic tick evaluator.

use crate::recurrence::Recurrence;
use crate::store::{PendingStore, ResultStore, TaskStore};
use crate::task::{PendingWorkItem, Task, TaskKind, TaskResult, TaskSpec};
use chrono::{DateTime, Utc};
use prowl_core::error::{Error, Result, TaskError};
use prowl_core::event::{DomainEvent, EventBus};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

/// Owns the durable task set and fires due tasks on a fixed tick.
///
/// Firing a task means: advance its bookkeeping, persist it, and write a
/// `PendingWorkItem` to the pending directory — delivery to the agent is
/// the watcher's job, not the scheduler's.
pub struct Scheduler {
    inner: Arc<Inner>,
    tick_period: Duration,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

struct Inner {
    tasks: RwLock<HashMap<String, Task>>,
    store: TaskStore,
    pending: PendingStore,
    results: ResultStore,
    event_bus: Arc<EventBus>,
    nudge: Mutex<Option<mpsc::Sender<()>>>,
}

impl Scheduler {
    /// Create a scheduler rooted at the given data directory, loading any
    /// previously persisted tasks.
    pub fn new(
        data_dir: &Path,
        tick_period: Duration,
        event_bus: Arc<EventBus>,
    ) -> Result<Self> {
        let store = TaskStore::new(data_dir.join("tasks"));
        let pending = PendingStore::new(data_dir.join("pending"));
        let results = ResultStore::new(data_dir.join("results"));

        let mut tasks = HashMap::new();
        for task in store.load_all()? {
            tasks.insert(task.id.clone(), task);
        }
        info!(count = tasks.len(), "Scheduler loaded persisted tasks");

        Ok(Self {
            inner: Arc::new(Inner {
                tasks: RwLock::new(tasks),
                store,
                pending,
                results,
                event_bus,
                nudge: Mutex::new(None),
            }),
            tick_period,
            handle: Mutex::new(None),
        })
    }

    /// A handle to the pending item directory, for wiring up the watcher.
    pub fn pending_store(&self) -> PendingStore {
        self.inner.pending.clone()
    }

    /// Attach the live notification channel pinged after each pending-item
    /// write. Must be set before `start()` for nudges to be delivered.
    pub fn set_notifier(&self, tx: mpsc::Sender<()>) {
        if let Ok(mut nudge) = self.inner.nudge.lock() {
            *nudge = Some(tx);
        }
    }

    /// Create a task: assign id and creation time, compute the initial
    /// `next_run` from the trigger, persist, return.
    ///
    /// Unsupported recurrence syntax is rejected here rather than left to
    /// sit armed and silently never fire.
    pub async fn create_task(&self, spec: TaskSpec) -> Result<Task> {
        let now = Utc::now();
        let next_run = initial_next_run(&spec, now)?;

        let task = Task {
            id: uuid::Uuid::new_v4().to_string(),
            name: spec.name,
            kind: spec.kind,
            trigger: spec.trigger,
            action: spec.action,
            enabled: spec.enabled,
            last_run: None,
            next_run,
            run_count: 0,
            max_runs: spec.max_runs,
            created_at: now,
        };

        self.inner.store.save(&task)?;
        self.inner
            .tasks
            .write()
            .await
            .insert(task.id.clone(), task.clone());

        info!(task_id = %task.id, name = %task.name, next_run = ?task.next_run, "Task created");
        self.inner.event_bus.publish(DomainEvent::TaskCreated {
            task_id: task.id.clone(),
            name: task.name.clone(),
            timestamp: now,
        });

        Ok(task)
    }

    /// List all tasks, sorted by creation time.
    pub async fn list_tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.inner.tasks.read().await.values().cloned().collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        tasks
    }

    /// Get one task by id.
    pub async fn get_task(&self, id: &str) -> Option<Task> {
        self.inner.tasks.read().await.get(id).cloned()
    }

    /// Delete a task from the map and from disk. Returns whether it existed.
    pub async fn delete_task(&self, id: &str) -> Result<bool> {
        let removed = self.inner.tasks.write().await.remove(id).is_some();
        let had_file = self.inner.store.delete(id)?;
        Ok(removed || had_file)
    }

    /// Enable or disable a task, persisting the change.
    pub async fn toggle_task(&self, id: &str, enabled: bool) -> Result<Task> {
        let mut tasks = self.inner.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| Error::Task(TaskError::NotFound(id.to_string())))?;
        task.enabled = enabled;
        let snapshot = task.clone();
        drop(tasks);

        self.inner.store.save(&snapshot)?;
        Ok(snapshot)
    }

    /// Append a firing outcome record.
    pub fn record_result(&self, result: &TaskResult) -> Result<()> {
        self.inner.results.append(result)?;
        debug!(task_id = %result.task_id, success = result.success, "Task result recorded");
        Ok(())
    }

    /// Load recorded outcomes for one task, oldest first.
    pub fn results_for(&self, task_id: &str) -> Result<Vec<TaskResult>> {
        Ok(self.inner.results.for_task(task_id)?)
    }

    /// Arm the periodic tick. Calling `start` while already started is a
    /// no-op.
    pub fn start(&self) {
        let Ok(mut handle) = self.handle.lock() else {
            return;
        };
        if handle.is_some() {
            return;
        }

        let inner = self.inner.clone();
        let period = self.tick_period;
        info!(period_secs = period.as_secs(), "Scheduler tick armed");

        *handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                inner.tick(Utc::now()).await;
            }
        }));
    }

    /// Disarm the periodic tick. Idempotent.
    pub fn stop(&self) {
        if let Ok(mut handle) = self.handle.lock()
            && let Some(handle) = handle.take()
        {
            handle.abort();
            info!("Scheduler tick disarmed");
        }
    }

    /// Run one evaluation pass at the given instant. Returns how many tasks
    /// fired. Exposed so callers (and tests) can evaluate without waiting
    /// for the timer.
    pub async fn tick(&self, now: DateTime<Utc>) -> usize {
        self.inner.tick(now).await
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    async fn tick(&self, now: DateTime<Utc>) -> usize {
        let due_ids: Vec<String> = {
            let tasks = self.tasks.read().await;
            tasks
                .values()
                .filter(|t| t.is_due(now))
                .map(|t| t.id.clone())
                .collect()
        };

        let mut fired = 0;
        for id in due_ids {
            let (snapshot, item) = {
                let mut tasks = self.tasks.write().await;
                let Some(task) = tasks.get_mut(&id) else {
                    continue;
                };
                // Deleted or toggled between the read and write locks
                if !task.is_due(now) {
                    continue;
                }

                task.run_count += 1;
                task.last_run = Some(now);
                task.next_run = match task.kind {
                    TaskKind::Recurring if !task.exhausted() => task
                        .trigger
                        .every
                        .as_deref()
                        .and_then(|e| Recurrence::parse(e).ok())
                        .map(|r| r.next_after(now)),
                    // One-shots are terminal after firing; events re-arm
                    // only when signalled again
                    _ => None,
                };

                let item = PendingWorkItem {
                    task_id: task.id.clone(),
                    task_name: task.name.clone(),
                    prompt: task.action.prompt.clone(),
                    allowed_tools: task.action.allowed_tools.clone(),
                    fired_at: now,
                };
                (task.clone(), item)
            };

            if let Err(e) = self.store.save(&snapshot) {
                warn!(task_id = %id, error = %e, "Failed to persist fired task");
            }

            match self.pending.write(&item) {
                Ok(file) => {
                    info!(task_id = %id, file = %file, "Task fired");
                    self.event_bus.publish(DomainEvent::TaskFired {
                        task_id: id.clone(),
                        name: item.task_name.clone(),
                        fired_at: now,
                    });
                    self.nudge_watcher();
                    fired += 1;
                }
                Err(e) => {
                    warn!(task_id = %id, error = %e, "Failed to write pending work item");
                }
            }
        }

        fired
    }

    fn nudge_watcher(&self) {
        let Ok(nudge) = self.nudge.lock() else {
            return;
        };
        if let Some(tx) = nudge.as_ref() {
            // A full channel is fine: the watcher will pick the item up on
            // its pending nudge or the re-scan backstop
            let _ = tx.try_send(());
        }
    }
}

fn initial_next_run(spec: &TaskSpec, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    // Reject garbage recurrence up front no matter the kind
    let recurrence = spec
        .trigger
        .every
        .as_deref()
        .map(Recurrence::parse)
        .transpose()?;

    match spec.kind {
        TaskKind::Scheduled => {
            let at = spec.trigger.at.ok_or(TaskError::MissingTrigger)?;
            Ok(Some(at))
        }
        TaskKind::Recurring => {
            let recurrence = recurrence.ok_or(TaskError::MissingTrigger)?;
            Ok(Some(recurrence.next_after(now)))
        }
        // Externally signalled; may carry an optional first firing time
        TaskKind::Event => Ok(spec.trigger.at),
    }
}
