//! The proactive coordinator — where a pending work item becomes agent
//! input.
//!
//! Wires Scheduler → Watcher → Agent: registers itself as the watcher's
//! handler, translates each delivered item into a synthetic user message,
//! steers it into the agent, and wakes the agent if it is idle. The
//! coordinator touches the agent only through the narrow
//! steer/resume/is_idle surface.

use crate::watcher::{Watcher, WorkItemHandler};
use async_trait::async_trait;
use chrono::Utc;
use prowl_agent::Agent;
use prowl_core::Message;
use prowl_core::error::Result;
use prowl_core::event::EventBus;
use prowl_scheduler::{PendingWorkItem, Scheduler, TaskResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The narrow agent surface the coordinator is allowed to use.
#[async_trait]
pub trait Steerable: Send + Sync {
    /// Queue a message for injection; never blocks.
    fn steer(&self, message: Message);

    /// Wake an idle agent; a no-op empty string when already running.
    async fn resume(&self) -> Result<String>;

    /// Whether the reasoning loop is currently inactive.
    fn is_idle(&self) -> bool;
}

#[async_trait]
impl Steerable for Agent {
    fn steer(&self, message: Message) {
        Agent::steer(self, message);
    }

    async fn resume(&self) -> Result<String> {
        Agent::resume(self).await
    }

    fn is_idle(&self) -> bool {
        Agent::is_idle(self)
    }
}

/// Runs the whole proactive pipeline: scheduler tick → pending directory →
/// watcher → steering message → agent.
pub struct ProactiveCoordinator {
    scheduler: Arc<Scheduler>,
    watcher: Watcher,
}

impl ProactiveCoordinator {
    /// Wire the pipeline together and start both ends: the scheduler's tick
    /// and the watcher's discovery loop.
    pub fn start(
        agent: Arc<dyn Steerable>,
        scheduler: Arc<Scheduler>,
        event_bus: Arc<EventBus>,
        rescan_period: Duration,
    ) -> Self {
        let (nudge_tx, nudge_rx) = tokio::sync::mpsc::channel(32);
        scheduler.set_notifier(nudge_tx);

        let handler = Arc::new(SteeringHandler {
            agent,
            scheduler: scheduler.clone(),
        });
        let watcher = Watcher::new(
            scheduler.pending_store(),
            handler,
            rescan_period,
            event_bus,
        );
        watcher.start(nudge_rx);
        scheduler.start();

        info!("Proactive pipeline started");
        Self { scheduler, watcher }
    }

    /// Stop the timers on both ends. Idempotent.
    pub fn stop(&self) {
        self.scheduler.stop();
        self.watcher.stop();
    }
}

/// The watcher handler that turns items into steering messages.
struct SteeringHandler {
    agent: Arc<dyn Steerable>,
    scheduler: Arc<Scheduler>,
}

impl SteeringHandler {
    /// Render the synthetic user message for one firing.
    fn steering_message(item: &PendingWorkItem) -> Message {
        let mut content = format!(
            "[Scheduled task \"{}\" fired] {}",
            item.task_name, item.prompt
        );
        if let Some(tools) = &item.allowed_tools
            && !tools.is_empty()
        {
            content.push_str(&format!("\n(You may use these tools: {})", tools.join(", ")));
        }
        Message::user(content)
    }
}

#[async_trait]
impl WorkItemHandler for SteeringHandler {
    async fn handle(&self, item: PendingWorkItem) -> Result<()> {
        info!(task_id = %item.task_id, name = %item.task_name, "Delivering proactive task to agent");

        self.agent.steer(Self::steering_message(&item));

        if self.agent.is_idle() {
            // Wake the agent; its loop runs on its own task so delivery
            // never blocks the watcher. A busy agent drains the queue at
            // its next checkpoint instead.
            let agent = self.agent.clone();
            let task_id = item.task_id.clone();
            tokio::spawn(async move {
                if let Err(e) = agent.resume().await {
                    warn!(task_id = %task_id, error = %e, "Proactive wake-up failed");
                }
            });
        }

        // Delivery succeeded; failures inside the agent loop are absorbed
        // as tool-error observations, so there is nothing stronger to
        // record here
        let result = TaskResult {
            task_id: item.task_id.clone(),
            success: true,
            output: Some(format!("delivered: {}", item.task_name)),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.scheduler.record_result(&result) {
            warn!(task_id = %item.task_id, error = %e, "Failed to record task result");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prowl_core::message::Role;
    use prowl_scheduler::{TaskAction, TaskKind, TaskSpec, Trigger};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tempfile::TempDir;

    /// A steerable stub that records what reaches it.
    struct RecordingAgent {
        steered: Mutex<Vec<Message>>,
        resumed: AtomicU32,
        idle: AtomicBool,
    }

    impl RecordingAgent {
        fn new(idle: bool) -> Self {
            Self {
                steered: Mutex::new(Vec::new()),
                resumed: AtomicU32::new(0),
                idle: AtomicBool::new(idle),
            }
        }

        fn steered(&self) -> Vec<Message> {
            self.steered.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Steerable for RecordingAgent {
        fn steer(&self, message: Message) {
            self.steered.lock().unwrap().push(message);
        }

        async fn resume(&self) -> Result<String> {
            self.resumed.fetch_add(1, Ordering::SeqCst);
            Ok(String::new())
        }

        fn is_idle(&self) -> bool {
            self.idle.load(Ordering::SeqCst)
        }
    }

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

    fn one_shot_in_past() -> TaskSpec {
        TaskSpec {
            name: "reminder".into(),
            kind: TaskKind::Scheduled,
            trigger: Trigger {
                at: Some(Utc::now() - chrono::Duration::seconds(5)),
                every: None,
            },
            action: TaskAction {
                prompt: "ping".into(),
                allowed_tools: None,
            },
            enabled: true,
            max_runs: None,
        }
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        let mut waited = Duration::ZERO;
        while !done() && waited < Duration::from_secs(3) {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += Duration::from_millis(10);
        }
    }

    #[test]
    fn steering_message_embeds_name_and_prompt() {
        let item = PendingWorkItem {
            task_id: "t1".into(),
            task_name: "morning_digest".into(),
            prompt: "Summarize overnight activity".into(),
            allowed_tools: None,
            fired_at: Utc::now(),
        };
        let msg = SteeringHandler::steering_message(&item);
        assert_eq!(msg.role, Role::User);
        assert!(msg.content.contains("morning_digest"));
        assert!(msg.content.contains("Summarize overnight activity"));
    }

    #[test]
    fn steering_message_lists_allowed_tools() {
        let item = PendingWorkItem {
            task_id: "t1".into(),
            task_name: "digest".into(),
            prompt: "go".into(),
            allowed_tools: Some(vec!["clock".into(), "list_tasks".into()]),
            fired_at: Utc::now(),
        };
        let msg = SteeringHandler::steering_message(&item);
        assert!(msg.content.contains("clock, list_tasks"));
    }

    #[tokio::test]
    async fn delivered_item_steers_and_wakes_idle_agent() {
        let dir = TempDir::new().unwrap();
        let scheduler = test_scheduler(&dir);
        let agent = Arc::new(RecordingAgent::new(true));

        let coordinator = ProactiveCoordinator::start(
            agent.clone(),
            scheduler.clone(),
            Arc::new(EventBus::default()),
            Duration::from_secs(60),
        );

        let task = scheduler.create_task(one_shot_in_past()).await.unwrap();
        scheduler.tick(Utc::now()).await;

        wait_until(|| !agent.steered().is_empty()).await;
        wait_until(|| agent.resumed.load(Ordering::SeqCst) > 0).await;

        let steered = agent.steered();
        assert_eq!(steered.len(), 1);
        assert!(steered[0].content.contains("ping"));
        assert_eq!(agent.resumed.load(Ordering::SeqCst), 1);

        // The item was consumed and a success result recorded
        assert!(scheduler.pending_store().list().unwrap().is_empty());
        wait_until(|| !scheduler.results_for(&task.id).unwrap().is_empty()).await;
        let results = scheduler.results_for(&task.id).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].success);

        coordinator.stop();
    }

    #[tokio::test]
    async fn busy_agent_is_not_woken() {
        let dir = TempDir::new().unwrap();
        let scheduler = test_scheduler(&dir);
        let agent = Arc::new(RecordingAgent::new(false));

        let coordinator = ProactiveCoordinator::start(
            agent.clone(),
            scheduler.clone(),
            Arc::new(EventBus::default()),
            Duration::from_secs(60),
        );

        scheduler.create_task(one_shot_in_past()).await.unwrap();
        scheduler.tick(Utc::now()).await;

        wait_until(|| !agent.steered().is_empty()).await;
        assert_eq!(agent.steered().len(), 1);
        // Running agent: the queue is left for its own loop checkpoint
        assert_eq!(agent.resumed.load(Ordering::SeqCst), 0);

        coordinator.stop();
    }

    #[tokio::test]
    async fn orphaned_item_from_previous_run_is_delivered_on_start() {
        let dir = TempDir::new().unwrap();
        let scheduler = test_scheduler(&dir);

        // An item written before the watcher existed — e.g. left over from
        // a crashed process
        scheduler.create_task(one_shot_in_past()).await.unwrap();
        scheduler.tick(Utc::now()).await;
        assert_eq!(scheduler.pending_store().list().unwrap().len(), 1);

        let agent = Arc::new(RecordingAgent::new(true));
        let coordinator = ProactiveCoordinator::start(
            agent.clone(),
            scheduler.clone(),
            Arc::new(EventBus::default()),
            Duration::from_secs(60),
        );

        wait_until(|| !agent.steered().is_empty()).await;
        assert_eq!(agent.steered().len(), 1);

        coordinator.stop();
    }
}
