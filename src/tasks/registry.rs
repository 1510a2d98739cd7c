//! Task registry: every known task behind one coarse lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::TaskError;
use crate::pipeline::{AnalysisSummary, FilteredRecordDetail};
use crate::tasks::state::{TaskState, TaskStatus};

struct TaskEntry {
    state: TaskState,
    cancel: Arc<AtomicBool>,
    details: Arc<Vec<FilteredRecordDetail>>,
}

/// What `delete` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The task was active; it is now a `Cancelled` tombstone.
    Cancelled,
    /// The task was terminal and is gone.
    Removed,
}

/// Task counts per status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total_tasks: usize,
    pub pending_tasks: usize,
    pub processing_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub cancelled_tasks: usize,
    /// Mean filter rate of completed tasks, two decimals.
    pub average_filter_rate: f64,
}

/// In-memory registry of analysis tasks.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<Uuid, TaskEntry>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new task and hand back its cancellation flag.
    pub async fn insert(&self, state: TaskState) -> Arc<AtomicBool> {
        let cancel = Arc::new(AtomicBool::new(false));
        let entry = TaskEntry {
            state,
            cancel: Arc::clone(&cancel),
            details: Arc::new(Vec::new()),
        };
        self.tasks.write().await.insert(entry.state.task_id, entry);
        cancel
    }

    pub async fn get(&self, id: Uuid) -> Result<TaskState, TaskError> {
        self.tasks
            .read()
            .await
            .get(&id)
            .map(|e| e.state.clone())
            .ok_or(TaskError::NotFound { id })
    }

    /// All tasks, newest first.
    pub async fn list(&self) -> Vec<TaskState> {
        let mut tasks: Vec<TaskState> = self
            .tasks
            .read()
            .await
            .values()
            .map(|e| e.state.clone())
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    /// Mutate one task under the write lock.
    pub async fn update<F, R>(&self, id: Uuid, f: F) -> Result<R, TaskError>
    where
        F: FnOnce(&mut TaskState) -> R,
    {
        let mut tasks = self.tasks.write().await;
        let entry = tasks.get_mut(&id).ok_or(TaskError::NotFound { id })?;
        Ok(f(&mut entry.state))
    }

    /// `update` for callers on a blocking worker thread.
    ///
    /// Must not be called from inside the async runtime.
    pub fn blocking_update<F, R>(&self, id: Uuid, f: F) -> Result<R, TaskError>
    where
        F: FnOnce(&mut TaskState) -> R,
    {
        let mut tasks = self.tasks.blocking_write();
        let entry = tasks.get_mut(&id).ok_or(TaskError::NotFound { id })?;
        Ok(f(&mut entry.state))
    }

    /// Publish the final result of a run. The details become visible in the
    /// same critical section as the `Completed` status.
    pub async fn complete(
        &self,
        id: Uuid,
        summary: AnalysisSummary,
        details: Vec<FilteredRecordDetail>,
    ) -> Result<TaskState, TaskError> {
        let mut tasks = self.tasks.write().await;
        let entry = tasks.get_mut(&id).ok_or(TaskError::NotFound { id })?;
        entry.state.complete(summary)?;
        entry.details = Arc::new(details);
        Ok(entry.state.clone())
    }

    /// Filtered records of a completed task.
    pub async fn details(&self, id: Uuid) -> Result<Arc<Vec<FilteredRecordDetail>>, TaskError> {
        let tasks = self.tasks.read().await;
        let entry = tasks.get(&id).ok_or(TaskError::NotFound { id })?;
        if entry.state.status != TaskStatus::Completed {
            return Err(TaskError::NotReady {
                id,
                status: entry.state.status.to_string(),
            });
        }
        Ok(Arc::clone(&entry.details))
    }

    /// Cancel an active task (kept as a tombstone) or drop a finished one.
    pub async fn delete(&self, id: Uuid) -> Result<(DeleteOutcome, TaskState), TaskError> {
        let mut tasks = self.tasks.write().await;
        let entry = tasks.get_mut(&id).ok_or(TaskError::NotFound { id })?;

        if entry.state.status.is_active() {
            entry.cancel.store(true, Ordering::Release);
            entry.state.cancel()?;
            return Ok((DeleteOutcome::Cancelled, entry.state.clone()));
        }

        let entry = tasks.remove(&id).ok_or(TaskError::NotFound { id })?;
        Ok((DeleteOutcome::Removed, entry.state))
    }

    pub async fn stats(&self) -> TaskStats {
        let tasks = self.tasks.read().await;

        let mut stats = TaskStats::default();
        let mut rate_sum = 0.0;
        for entry in tasks.values() {
            match entry.state.status {
                TaskStatus::Pending => stats.pending_tasks += 1,
                TaskStatus::Processing => stats.processing_tasks += 1,
                TaskStatus::Completed => stats.completed_tasks += 1,
                TaskStatus::Failed => stats.failed_tasks += 1,
                TaskStatus::Cancelled => stats.cancelled_tasks += 1,
            }
            if let Some(result) = &entry.state.result {
                rate_sum += result.filter_rate;
            }
        }

        stats.total_tasks = tasks.len();
        if stats.completed_tasks > 0 {
            stats.average_filter_rate =
                (rate_sum / stats.completed_tasks as f64 * 100.0).round() / 100.0;
        }
        stats
    }
}
