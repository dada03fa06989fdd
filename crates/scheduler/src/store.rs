//! File-backed stores for tasks, pending work items, and task results.
//!
//! Layout under the data directory:
//!
//! ```text
//! tasks/<task_id>.json           one file per task, rewritten on mutation
//! pending/<stamp>-<task_id>.json one file per firing, deleted after delivery
//! results/<task_id>-<stamp>.json one file per outcome, append-only
//! ```
//!
//! The pending directory is the durability boundary between the scheduler
//! and the watcher: an item that was written but not yet deleted survives a
//! process restart and is redelivered by the watcher's full scan.

use crate::task::{PendingWorkItem, Task, TaskResult};
use prowl_core::error::StorageError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<PathBuf, StorageError> {
    std::fs::create_dir_all(dir).map_err(|e| StorageError::Io {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let path = dir.join(name);
    let content =
        serde_json::to_string_pretty(value).map_err(|e| StorageError::Encode(e.to_string()))?;
    std::fs::write(&path, content).map_err(|e| StorageError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(path)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let content = std::fs::read_to_string(path).map_err(|e| StorageError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| StorageError::Decode {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn list_json_files(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(StorageError::Io {
                path: dir.display().to_string(),
                reason: e.to_string(),
            });
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            (path.extension().and_then(|e| e.to_str()) == Some("json")).then_some(path)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// The durable task set, one JSON file per task keyed by id.
pub struct TaskStore {
    dir: PathBuf,
}

impl TaskStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Persist a task, overwriting any previous version.
    pub fn save(&self, task: &Task) -> Result<(), StorageError> {
        write_json(&self.dir, &format!("{}.json", task.id), task)?;
        debug!(task_id = %task.id, "Task persisted");
        Ok(())
    }

    /// Load every task from disk. A file that fails to parse is logged and
    /// skipped; it never aborts loading the rest.
    pub fn load_all(&self) -> Result<Vec<Task>, StorageError> {
        let mut tasks = Vec::new();
        for path in list_json_files(&self.dir)? {
            match read_json::<Task>(&path) {
                Ok(task) => tasks.push(task),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping corrupt task file");
                }
            }
        }
        Ok(tasks)
    }

    /// Remove a task file. Returns whether anything was removed.
    pub fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let path = self.dir.join(format!("{id}.json"));
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// The pending work item directory — the file-system-as-queue hand-off
/// between the scheduler (writer) and the watcher (reader/deleter).
#[derive(Clone)]
pub struct PendingStore {
    dir: PathBuf,
}

impl PendingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write an item, returning its file name.
    pub fn write(&self, item: &PendingWorkItem) -> Result<String, StorageError> {
        let name = item.file_name();
        write_json(&self.dir, &name, item)?;
        debug!(task_id = %item.task_id, file = %name, "Pending work item written");
        Ok(name)
    }

    /// List item file names in firing order.
    pub fn list(&self) -> Result<Vec<String>, StorageError> {
        Ok(list_json_files(&self.dir)?
            .into_iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect())
    }

    /// Read one item by file name. `None` means the file is already gone —
    /// handled elsewhere, not an error.
    pub fn read(&self, name: &str) -> Result<Option<PendingWorkItem>, StorageError> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    /// Delete one item. `Ok(false)` means it was already gone, which the
    /// caller is expected to swallow; any other failure propagates.
    pub fn delete(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.dir.join(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Append-only store of firing outcomes.
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Append one result, keyed by task id and timestamp.
    pub fn append(&self, result: &TaskResult) -> Result<(), StorageError> {
        let name = format!(
            "{}-{}.json",
            result.task_id,
            result.timestamp.format("%Y%m%dT%H%M%S%3f")
        );
        write_json(&self.dir, &name, result)?;
        Ok(())
    }

    /// Load all recorded results for a task, oldest first.
    pub fn for_task(&self, task_id: &str) -> Result<Vec<TaskResult>, StorageError> {
        let prefix = format!("{task_id}-");
        let mut results = Vec::new();
        for path in list_json_files(&self.dir)? {
            let is_ours = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix));
            if !is_ours {
                continue;
            }
            match read_json::<TaskResult>(&path) {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping corrupt result file");
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskAction, TaskKind, Trigger};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample_task(id: &str) -> Task {
        Task {
            id: id.into(),
            name: "sample".into(),
            kind: TaskKind::Scheduled,
            trigger: Trigger {
                at: Some(Utc::now()),
                every: None,
            },
            action: TaskAction {
                prompt: "ping".into(),
                allowed_tools: None,
            },
            enabled: true,
            last_run: None,
            next_run: Some(Utc::now()),
            run_count: 0,
            max_runs: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn task_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());

        store.save(&sample_task("t1")).unwrap();
        store.save(&sample_task("t2")).unwrap();

        let tasks = store.load_all().unwrap();
        assert_eq!(tasks.len(), 2);
    }

    #[test]
    fn task_store_skips_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());

        store.save(&sample_task("good")).unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ nope").unwrap();

        let tasks = store.load_all().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "good");
    }

    #[test]
    fn task_store_delete() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());

        store.save(&sample_task("t1")).unwrap();
        assert!(store.delete("t1").unwrap());
        assert!(!store.delete("t1").unwrap());
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn pending_store_write_read_delete() {
        let dir = TempDir::new().unwrap();
        let store = PendingStore::new(dir.path());

        let item = PendingWorkItem {
            task_id: "t1".into(),
            task_name: "sample".into(),
            prompt: "ping".into(),
            allowed_tools: None,
            fired_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap(),
        };

        let name = store.write(&item).unwrap();
        assert_eq!(store.list().unwrap(), vec![name.clone()]);

        let loaded = store.read(&name).unwrap().unwrap();
        assert_eq!(loaded.prompt, "ping");

        assert!(store.delete(&name).unwrap());
        assert!(!store.delete(&name).unwrap()); // Already gone
        assert!(store.read(&name).unwrap().is_none());
    }

    #[test]
    fn pending_store_lists_in_firing_order() {
        let dir = TempDir::new().unwrap();
        let store = PendingStore::new(dir.path());

        let make = |task_id: &str, minute: u32| PendingWorkItem {
            task_id: task_id.into(),
            task_name: "sample".into(),
            prompt: "ping".into(),
            allowed_tools: None,
            fired_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, minute, 0).unwrap(),
        };

        // Written out of order; listed in fire order
        store.write(&make("zz", 10)).unwrap();
        store.write(&make("aa", 5)).unwrap();

        let names = store.list().unwrap();
        assert_eq!(names.len(), 2);
        assert!(names[0].contains("aa"));
        assert!(names[1].contains("zz"));
    }

    #[test]
    fn result_store_appends_and_filters() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::new(dir.path());

        store
            .append(&TaskResult {
                task_id: "t1".into(),
                success: true,
                output: Some("delivered".into()),
                timestamp: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
            })
            .unwrap();
        store
            .append(&TaskResult {
                task_id: "t2".into(),
                success: false,
                output: None,
                timestamp: Utc.with_ymd_and_hms(2026, 3, 2, 9, 1, 0).unwrap(),
            })
            .unwrap();

        let results = store.for_task("t1").unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].success);
    }

    #[test]
    fn empty_dirs_list_empty() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("never-created");
        assert!(TaskStore::new(&missing).load_all().unwrap().is_empty());
        assert!(PendingStore::new(&missing).list().unwrap().is_empty());
    }
}
