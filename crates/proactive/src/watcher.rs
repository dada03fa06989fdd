//! The pending work item watcher.
//!
//! Delivery contract: each item on disk is handed to the handler exactly
//! once per process lifetime, no matter how many discovery paths find it.
//! Two paths exist because directory change notifications alone are not
//! reliable everywhere: a live nudge channel pinged by the scheduler after
//! each write, and a periodic full re-scan as a backstop.
//!
//! Per-item state lives only in memory, so a restart resets everything to
//! unseen and the first full scan redelivers whatever is still on disk —
//! at-least-once across restarts, exactly-once within one process.

use chrono::Utc;
use prowl_core::error::{Error, Result};
use prowl_core::event::{DomainEvent, EventBus};
use prowl_scheduler::{PendingStore, PendingWorkItem};
use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Receives parsed pending work items from the watcher.
#[async_trait]
pub trait WorkItemHandler: Send + Sync {
    async fn handle(&self, item: PendingWorkItem) -> Result<()>;
}

/// In-memory delivery state for one item file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemState {
    /// Claimed by a discovery path; processing is under way
    Processing,
    /// Handled (or found already gone); never touched again
    Done,
}

/// Observes the pending directory and delivers each item once.
pub struct Watcher {
    inner: Arc<Inner>,
    rescan_period: Duration,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

struct Inner {
    pending: PendingStore,
    states: Mutex<HashMap<String, ItemState>>,
    handler: Arc<dyn WorkItemHandler>,
    event_bus: Arc<EventBus>,
}

impl Watcher {
    pub fn new(
        pending: PendingStore,
        handler: Arc<dyn WorkItemHandler>,
        rescan_period: Duration,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                pending,
                states: Mutex::new(HashMap::new()),
                handler,
                event_bus,
            }),
            rescan_period,
            handle: Mutex::new(None),
        }
    }

    /// Arm the watcher: an immediate full scan, then a select loop over the
    /// live nudge channel and the re-scan interval. Calling `start` while
    /// already started is a no-op (the extra receiver is dropped).
    pub fn start(&self, mut nudge_rx: tokio::sync::mpsc::Receiver<()>) {
        let Ok(mut handle) = self.handle.lock() else {
            return;
        };
        if handle.is_some() {
            return;
        }

        let inner = self.inner.clone();
        let rescan = self.rescan_period;
        info!(rescan_secs = rescan.as_secs(), "Watcher armed");

        *handle = Some(tokio::spawn(async move {
            inner.scan().await;

            let mut interval = tokio::time::interval(rescan);
            interval.tick().await; // Consume the immediate first tick
            loop {
                tokio::select! {
                    nudge = nudge_rx.recv() => {
                        if nudge.is_none() {
                            // Sender gone; the backstop keeps running
                            debug!("Watcher nudge channel closed");
                        }
                        inner.scan().await;
                    }
                    _ = interval.tick() => {
                        inner.scan().await;
                    }
                }
            }
        }));
    }

    /// Disarm the watcher. Idempotent.
    pub fn stop(&self) {
        if let Ok(mut handle) = self.handle.lock()
            && let Some(handle) = handle.take()
        {
            handle.abort();
            info!("Watcher disarmed");
        }
    }

    /// Run one full scan now. Returns how many items were handled.
    /// Exposed so callers (and tests) can drive discovery without timers.
    pub async fn scan(&self) -> usize {
        self.inner.scan().await
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    async fn scan(&self) -> usize {
        let names = match self.pending.list() {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Pending directory scan failed");
                return 0;
            }
        };

        let mut handled = 0;
        for name in names {
            if !self.claim(&name) {
                continue;
            }
            match self.process(&name).await {
                Ok(true) => handled += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(item = %name, error = %e, "Pending work item processing failed");
                    self.event_bus.publish(DomainEvent::ItemProcessingError {
                        item: name.clone(),
                        error_message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                }
            }
        }
        handled
    }

    /// Atomically claim an item for processing. An item already claimed by
    /// any discovery path — or already done — is not claimed again.
    fn claim(&self, name: &str) -> bool {
        let Ok(mut states) = self.states.lock() else {
            return false;
        };
        match states.entry(name.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(ItemState::Processing);
                true
            }
        }
    }

    fn mark(&self, name: &str, state: ItemState) {
        if let Ok(mut states) = self.states.lock() {
            states.insert(name.to_string(), state);
        }
    }

    fn unclaim(&self, name: &str) {
        if let Ok(mut states) = self.states.lock() {
            states.remove(name);
        }
    }

    /// Process one claimed item. `Ok(true)` means the handler ran and the
    /// item was removed; `Ok(false)` means the item was already gone.
    async fn process(&self, name: &str) -> Result<bool> {
        let item = match self.pending.read(name) {
            Ok(Some(item)) => item,
            Ok(None) => {
                // Deleted between discovery and processing: handled
                // elsewhere, not an error
                debug!(item = %name, "Pending item already gone, skipping");
                self.mark(name, ItemState::Done);
                return Ok(false);
            }
            Err(e) => {
                // Unreadable now; give a later pass another chance
                self.unclaim(name);
                return Err(Error::Storage(e));
            }
        };

        if let Err(e) = self.handler.handle(item.clone()).await {
            // Not done: the file stays on disk, eligible for retry
            self.unclaim(name);
            return Err(e);
        }

        // Handled: done first, so a delete failure can never cause a second
        // delivery
        self.mark(name, ItemState::Done);
        match self.pending.delete(name) {
            Ok(_) => {
                info!(task_id = %item.task_id, item = %name, "Pending work item processed");
                self.event_bus.publish(DomainEvent::ItemProcessed {
                    task_id: item.task_id.clone(),
                    timestamp: Utc::now(),
                });
                Ok(true)
            }
            Err(e) => Err(Error::Storage(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    /// Counts invocations; optionally fails the first N of them.
    struct CountingHandler {
        invocations: AtomicU32,
        fail_first: u32,
        delay: Duration,
    }

    impl CountingHandler {
        fn new() -> Self {
            Self {
                invocations: AtomicU32::new(0),
                fail_first: 0,
                delay: Duration::ZERO,
            }
        }

        fn failing_first(n: u32) -> Self {
            Self {
                fail_first: n,
                ..Self::new()
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new()
            }
        }

        fn count(&self) -> u32 {
            self.invocations.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WorkItemHandler for CountingHandler {
        async fn handle(&self, _item: PendingWorkItem) -> Result<()> {
            let n = self.invocations.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if n < self.fail_first {
                return Err(Error::Internal("handler rejected".into()));
            }
            Ok(())
        }
    }

    fn write_item(store: &PendingStore, task_id: &str) -> String {
        store
            .write(&PendingWorkItem {
                task_id: task_id.into(),
                task_name: "test".into(),
                prompt: "ping".into(),
                allowed_tools: None,
                fired_at: Utc::now(),
            })
            .unwrap()
    }

    fn watcher_with(
        dir: &TempDir,
        handler: Arc<CountingHandler>,
    ) -> (Watcher, PendingStore) {
        let store = PendingStore::new(dir.path());
        let watcher = Watcher::new(
            store.clone(),
            handler,
            Duration::from_secs(30),
            Arc::new(EventBus::default()),
        );
        (watcher, store)
    }

    #[tokio::test]
    async fn scan_delivers_and_deletes() {
        let dir = TempDir::new().unwrap();
        let handler = Arc::new(CountingHandler::new());
        let (watcher, store) = watcher_with(&dir, handler.clone());

        write_item(&store, "t1");
        let handled = watcher.scan().await;

        assert_eq!(handled, 1);
        assert_eq!(handler.count(), 1);
        assert!(store.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_scans_deliver_once() {
        let dir = TempDir::new().unwrap();
        let handler = Arc::new(CountingHandler::new());
        let (watcher, store) = watcher_with(&dir, handler.clone());

        write_item(&store, "t1");
        watcher.scan().await;
        watcher.scan().await;
        watcher.scan().await;

        assert_eq!(handler.count(), 1);
    }

    #[tokio::test]
    async fn concurrent_discovery_delivers_once() {
        // Overlapping scan + live-notification discovery of the same item:
        // exactly one handler invocation, one non-erroring delete
        let dir = TempDir::new().unwrap();
        let handler = Arc::new(CountingHandler::slow(Duration::from_millis(50)));
        let (watcher, store) = watcher_with(&dir, handler.clone());

        write_item(&store, "t1");
        let (a, b) = tokio::join!(watcher.scan(), watcher.scan());

        assert_eq!(a + b, 1);
        assert_eq!(handler.count(), 1);
        assert!(store.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn handler_failure_leaves_item_for_retry() {
        let dir = TempDir::new().unwrap();
        let handler = Arc::new(CountingHandler::failing_first(1));
        let (watcher, store) = watcher_with(&dir, handler.clone());

        write_item(&store, "t1");
        assert_eq!(watcher.scan().await, 0);
        // Failed: file still on disk
        assert_eq!(store.list().unwrap().len(), 1);

        // A later pass retries and succeeds
        assert_eq!(watcher.scan().await, 1);
        assert_eq!(handler.count(), 2);
        assert!(store.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn item_gone_before_processing_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let handler = Arc::new(CountingHandler::new());
        let store = PendingStore::new(dir.path());
        let watcher = Watcher::new(
            store.clone(),
            handler.clone(),
            Duration::from_secs(30),
            Arc::new(EventBus::default()),
        );

        let name = write_item(&store, "t1");
        // Simulate another actor removing the file after discovery would
        // have listed it
        watcher.inner.claim(&name);
        store.delete(&name).unwrap();
        let result = watcher.inner.process(&name).await.unwrap();

        assert!(!result);
        assert_eq!(handler.count(), 0);
    }

    #[tokio::test]
    async fn nudge_triggers_delivery() {
        let dir = TempDir::new().unwrap();
        let handler = Arc::new(CountingHandler::new());
        let (watcher, store) = watcher_with(&dir, handler.clone());

        let (tx, rx) = tokio::sync::mpsc::channel(4);
        watcher.start(rx);

        // Give the initial scan a moment, then write and nudge
        tokio::time::sleep(Duration::from_millis(20)).await;
        write_item(&store, "t1");
        tx.send(()).await.unwrap();

        let mut waited = Duration::ZERO;
        while handler.count() == 0 && waited < Duration::from_secs(2) {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += Duration::from_millis(10);
        }

        assert_eq!(handler.count(), 1);
        watcher.stop();
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let handler = Arc::new(CountingHandler::new());
        let (watcher, _store) = watcher_with(&dir, handler);

        let (_tx1, rx1) = tokio::sync::mpsc::channel(1);
        let (_tx2, rx2) = tokio::sync::mpsc::channel(1);
        watcher.start(rx1);
        watcher.start(rx2); // No-op
        watcher.stop();
        watcher.stop();
    }
}
