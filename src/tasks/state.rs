//! Analysis task state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TaskError;
use crate::pipeline::AnalysisSummary;

/// Lifecycle of an analysis task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Submitted, waiting for a worker slot.
    Pending,
    /// Holding a worker slot and classifying records.
    Processing,
    /// Finished; the result is available.
    Completed,
    /// Aborted by an error. No partial result is kept.
    Failed,
    /// Deleted while still active.
    Cancelled,
}

impl TaskStatus {
    /// Check if this status allows transitioning to another status.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, target),
            (Pending, Processing) | (Pending, Cancelled) | (Pending, Failed) |
            (Processing, Completed) | (Processing, Failed) | (Processing, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Everything known about one task.
///
/// Replaced as a whole under the registry lock, so a reader always sees a
/// consistent set of counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    pub task_id: Uuid,
    /// Dataset name the task was submitted with.
    pub dataset: String,
    pub status: TaskStatus,
    /// 0..=100, never decreases.
    pub progress: u8,
    pub status_message: String,
    /// Live counters while processing; final counters afterwards.
    pub counters: AnalysisSummary,
    /// Present iff `status == Completed`.
    pub result: Option<AnalysisSummary>,
    /// Present iff `status == Failed`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskState {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            dataset: dataset.into(),
            status: TaskStatus::Pending,
            progress: 0,
            status_message: "waiting for a worker slot".to_string(),
            counters: AnalysisSummary::default(),
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Move to `target`, stamping start/finish times.
    pub fn transition_to(&mut self, target: TaskStatus) -> Result<(), TaskError> {
        if !self.status.can_transition_to(target) {
            return Err(TaskError::InvalidTransition {
                id: self.task_id,
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }

        self.status = target;
        let now = Utc::now();
        match target {
            TaskStatus::Processing => self.started_at = Some(now),
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => {
                self.completed_at = Some(now)
            }
            TaskStatus::Pending => {}
        }
        Ok(())
    }

    /// Record progress. Lower values than the current one are ignored.
    pub fn set_progress(&mut self, progress: u8, message: impl Into<String>) {
        self.progress = self.progress.max(progress.min(100));
        self.status_message = message.into();
    }

    pub fn complete(&mut self, summary: AnalysisSummary) -> Result<(), TaskError> {
        self.transition_to(TaskStatus::Completed)?;
        self.set_progress(100, "analysis complete");
        self.counters = summary.clone();
        self.result = Some(summary);
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), TaskError> {
        self.transition_to(TaskStatus::Failed)?;
        let reason = reason.into();
        self.status_message = format!("analysis failed: {reason}");
        self.error = Some(reason);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), TaskError> {
        self.transition_to(TaskStatus::Cancelled)?;
        self.status_message = "cancelled".to_string();
        Ok(())
    }

    /// Wall-clock run time, once both ends are known.
    pub fn processing_time_secs(&self) -> Option<f64> {
        let started = self.started_at?;
        let finished = self.completed_at?;
        Some((finished - started).num_milliseconds() as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_is_pending() {
        let task = TaskState::new("chats.json");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0);
        assert!(task.result.is_none());
    }

    #[test]
    fn happy_path_transitions() {
        let mut task = TaskState::new("chats.json");
        task.transition_to(TaskStatus::Processing).unwrap();
        assert!(task.started_at.is_some());
        task.complete(AnalysisSummary::default()).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);
        assert!(task.result.is_some());
        assert!(task.processing_time_secs().is_some());
    }

    #[test]
    fn terminal_states_are_final() {
        let mut task = TaskState::new("chats.json");
        task.transition_to(TaskStatus::Processing).unwrap();
        task.cancel().unwrap();

        let err = task.complete(AnalysisSummary::default()).unwrap_err();
        assert_eq!(err.kind(), "invalid_transition");
        assert!(task.result.is_none());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Failed));
    }

    #[test]
    fn progress_never_goes_backwards() {
        let mut task = TaskState::new("chats.json");
        task.set_progress(40, "applying filter rules");
        task.set_progress(20, "applying filter rules");
        assert_eq!(task.progress, 40);
        task.set_progress(250, "done");
        assert_eq!(task.progress, 100);
    }

    #[test]
    fn failure_records_reason() {
        let mut task = TaskState::new("chats.json");
        task.transition_to(TaskStatus::Processing).unwrap();
        task.fail("dataset not found").unwrap();
        assert_eq!(task.error.as_deref(), Some("dataset not found"));
        assert!(task.result.is_none());
    }
}
