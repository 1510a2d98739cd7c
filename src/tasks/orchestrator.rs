//! Task orchestrator: bounded pool of analysis runs.
//!
//! `submit` registers a `Pending` task and returns at once. The run waits for
//! one of `max_concurrent_analysis` permits, loads the dataset, then
//! classifies it row by row on a blocking worker thread. Progress and state
//! changes are written to the registry and broadcast as [`TaskEvent`]s.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, Semaphore, broadcast};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::{AppConfig, FilterConfig, FilterRules};
use crate::error::TaskError;
use crate::pipeline::{Aggregator, AnalysisSummary, Classifier, FilteredRecordDetail, RuleChain};
use crate::roster::RosterStore;
use crate::source::{Dataset, RecordSource};
use crate::tasks::index::FilterIndex;
use crate::tasks::registry::{DeleteOutcome, TaskRegistry, TaskStats};
use crate::tasks::state::{TaskState, TaskStatus};

/// Broadcast channel capacity.
const EVENT_CAPACITY: usize = 256;

/// Pushed to subscribers (the WebSocket) on every task change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Full task list (sent on connect and after a lag).
    TasksSync { tasks: Vec<TaskState> },
    /// A task was submitted.
    TaskCreated { task: TaskState },
    /// Progress checkpoint of a running task.
    TaskProgress {
        task_id: Uuid,
        progress: u8,
        status_message: String,
        counters: AnalysisSummary,
    },
    /// A task changed status.
    TaskUpdate { task: TaskState },
    /// A finished task was deleted.
    TaskRemoved { task_id: Uuid },
}

/// Final outcome of a completed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub task_id: Uuid,
    pub dataset: String,
    pub summary: AnalysisSummary,
    pub processing_time_secs: f64,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Receives progress checkpoints from a running classification.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: u8, message: &str, counters: &AnalysisSummary);
}

/// Classify every row of `dataset` in order.
///
/// Reports `20 + 70 * done / total` every `progress_interval` rows. Returns
/// `None` as soon as `cancel` is observed between two rows.
pub fn classify_dataset(
    dataset: &Dataset,
    classifier: &Classifier,
    progress_interval: usize,
    cancel: &AtomicBool,
    sink: &dyn ProgressSink,
) -> Option<Aggregator> {
    let total = dataset.len();
    let interval = progress_interval.max(1);
    let mut aggregator = Aggregator::new();

    for (done, record) in dataset.rows.iter().enumerate() {
        if cancel.load(Ordering::Acquire) {
            return None;
        }
        aggregator.record(classifier.classify(record));

        let done = done + 1;
        if done % interval == 0 {
            let progress = 20 + 70 * done / total;
            sink.report(progress as u8, "applying filter rules", &aggregator.summary());
        }
    }

    if cancel.load(Ordering::Acquire) {
        return None;
    }
    Some(aggregator)
}

/// Writes checkpoints into the registry from the blocking worker thread.
struct RegistrySink {
    task_id: Uuid,
    registry: Arc<TaskRegistry>,
    events: broadcast::Sender<TaskEvent>,
}

impl ProgressSink for RegistrySink {
    fn report(&self, progress: u8, message: &str, counters: &AnalysisSummary) {
        let applied = self.registry.blocking_update(self.task_id, |task| {
            if task.status != TaskStatus::Processing {
                return None;
            }
            task.set_progress(progress, message);
            task.counters = counters.clone();
            Some(task.progress)
        });

        if let Ok(Some(progress)) = applied {
            debug!(task_id = %self.task_id, progress, rows = counters.total_records, "Progress");
            let _ = self.events.send(TaskEvent::TaskProgress {
                task_id: self.task_id,
                progress,
                status_message: message.to_string(),
                counters: counters.clone(),
            });
        }
    }
}

/// Owns the task registry and runs analyses on a bounded pool.
pub struct Orchestrator {
    registry: Arc<TaskRegistry>,
    roster: Arc<RosterStore>,
    rules: RwLock<FilterRules>,
    filter: FilterConfig,
    limiter: Arc<Semaphore>,
    progress_interval: usize,
    events: broadcast::Sender<TaskEvent>,
}

impl Orchestrator {
    pub fn new(config: &AppConfig, roster: Arc<RosterStore>) -> Arc<Self> {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            registry: Arc::new(TaskRegistry::new()),
            roster,
            rules: RwLock::new(FilterRules::default()),
            filter: config.filter.clone(),
            limiter: Arc::new(Semaphore::new(config.max_concurrent_analysis.max(1))),
            progress_interval: config.progress_interval.max(1),
            events,
        })
    }

    pub fn roster(&self) -> &Arc<RosterStore> {
        &self.roster
    }

    pub fn filter_config(&self) -> &FilterConfig {
        &self.filter
    }

    /// Read path over completed tasks' filtered records.
    pub fn index(&self) -> FilterIndex {
        FilterIndex::new(Arc::clone(&self.registry))
    }

    /// Subscribe to task events. Each WebSocket client calls this.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    pub async fn rules(&self) -> FilterRules {
        *self.rules.read().await
    }

    /// Replace the rule toggles. Runs already started keep their snapshot.
    pub async fn set_rules(&self, rules: FilterRules) {
        *self.rules.write().await = rules;
        info!(?rules, "Filter rules updated");
    }

    /// Register a task for `source` and start it in the background.
    pub async fn submit(self: &Arc<Self>, source: Arc<dyn RecordSource>) -> Uuid {
        let state = TaskState::new(source.name());
        let task_id = state.task_id;
        let cancel = self.registry.insert(state.clone()).await;

        info!(task_id = %task_id, dataset = %state.dataset, "Analysis task submitted");
        let _ = self.events.send(TaskEvent::TaskCreated { task: state });

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run(task_id, source, cancel).await;
        });

        task_id
    }

    pub async fn get_status(&self, task_id: Uuid) -> Result<TaskState, TaskError> {
        self.registry.get(task_id).await
    }

    /// All tasks, newest first.
    pub async fn list_tasks(&self) -> Vec<TaskState> {
        self.registry.list().await
    }

    pub async fn get_result(&self, task_id: Uuid) -> Result<AnalysisResult, TaskError> {
        let task = self.registry.get(task_id).await?;
        let Some(summary) = task.result.clone() else {
            return Err(TaskError::NotReady {
                id: task_id,
                status: task.status.to_string(),
            });
        };
        Ok(AnalysisResult {
            task_id,
            dataset: task.dataset.clone(),
            summary,
            processing_time_secs: task.processing_time_secs().unwrap_or_default(),
            completed_at: task.completed_at,
        })
    }

    /// Cancel an active task or remove a finished one.
    pub async fn delete(&self, task_id: Uuid) -> Result<DeleteOutcome, TaskError> {
        let (outcome, task) = self.registry.delete(task_id).await?;
        match outcome {
            DeleteOutcome::Cancelled => {
                info!(task_id = %task_id, "Analysis task cancelled");
                let _ = self.events.send(TaskEvent::TaskUpdate { task });
            }
            DeleteOutcome::Removed => {
                info!(task_id = %task_id, status = %task.status, "Analysis task removed");
                let _ = self.events.send(TaskEvent::TaskRemoved { task_id });
            }
        }
        Ok(outcome)
    }

    pub async fn stats(&self) -> TaskStats {
        self.registry.stats().await
    }

    async fn run(self: Arc<Self>, task_id: Uuid, source: Arc<dyn RecordSource>, cancel: Arc<AtomicBool>) {
        let _permit = match Arc::clone(&self.limiter).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                self.fail(task_id, format!("failed to acquire worker slot: {e}")).await;
                return;
            }
        };

        if cancel.load(Ordering::Acquire) {
            debug!(task_id = %task_id, "Task cancelled before start");
            return;
        }

        // Rule toggles and roster are fixed before the task shows as Processing.
        let rules = self.rules().await;
        let roster = self.roster.snapshot().await;
        debug!(task_id = %task_id, staff = roster.len(), ?rules, "Run configuration captured");
        let classifier = Classifier::new(
            RuleChain::new(self.filter.clone(), rules),
            roster,
            Local::now().date_naive(),
        );

        let started = self
            .registry
            .update(task_id, |task| {
                task.transition_to(TaskStatus::Processing)?;
                task.set_progress(10, "reading dataset");
                Ok::<_, TaskError>(task.clone())
            })
            .await;
        match started {
            Ok(Ok(task)) => {
                info!(task_id = %task_id, dataset = %task.dataset, "Analysis started");
                let _ = self.events.send(TaskEvent::TaskUpdate { task });
            }
            Ok(Err(e)) | Err(e) => {
                debug!(task_id = %task_id, error = %e, "Task not started");
                return;
            }
        }

        match self.execute(task_id, source.as_ref(), classifier, &cancel).await {
            Ok(Some((summary, details))) => self.finish(task_id, summary, details).await,
            Ok(None) => info!(task_id = %task_id, "Analysis cancelled, result discarded"),
            Err(e) => {
                let reason = match e {
                    TaskError::Failure { reason, .. } => reason,
                    other => other.to_string(),
                };
                self.fail(task_id, reason).await;
            }
        }
    }

    async fn execute(
        &self,
        task_id: Uuid,
        source: &dyn RecordSource,
        classifier: Classifier,
        cancel: &Arc<AtomicBool>,
    ) -> Result<Option<(AnalysisSummary, Vec<FilteredRecordDetail>)>, TaskError> {
        let dataset = source.open().await.map_err(|e| TaskError::Failure {
            id: task_id,
            reason: e.to_string(),
        })?;
        if cancel.load(Ordering::Acquire) {
            return Ok(None);
        }
        debug!(task_id = %task_id, rows = dataset.len(), "Dataset loaded");

        self.publish_progress(task_id, 20, "applying filter rules", AnalysisSummary::default())
            .await;

        let sink = RegistrySink {
            task_id,
            registry: Arc::clone(&self.registry),
            events: self.events.clone(),
        };
        let interval = self.progress_interval;
        let cancel = Arc::clone(cancel);
        let outcome = tokio::task::spawn_blocking(move || {
            classify_dataset(&dataset, &classifier, interval, &cancel, &sink)
        })
        .await
        .map_err(|e| TaskError::Failure {
            id: task_id,
            reason: format!("classification worker failed: {e}"),
        })?;

        Ok(outcome.map(Aggregator::finish))
    }

    async fn finish(&self, task_id: Uuid, summary: AnalysisSummary, details: Vec<FilteredRecordDetail>) {
        self.publish_progress(task_id, 95, "building result", summary.clone())
            .await;

        match self.registry.complete(task_id, summary.clone(), details).await {
            Ok(task) => {
                info!(
                    task_id = %task_id,
                    total = summary.total_records,
                    filtered = summary.filtered_records,
                    valid = summary.valid_records,
                    filter_rate = summary.filter_rate,
                    empty = summary.empty_records_count,
                    early_morning = summary.early_morning_count,
                    staff = summary.staff_involved_count,
                    service_assistant = summary.service_assistant_count,
                    address_confirm = summary.address_confirm_count,
                    parse_error = summary.parse_error_count,
                    "Analysis complete"
                );
                let _ = self.events.send(TaskEvent::TaskUpdate { task });
            }
            Err(e) => debug!(task_id = %task_id, error = %e, "Result discarded"),
        }
    }

    async fn fail(&self, task_id: Uuid, reason: String) {
        match self
            .registry
            .update(task_id, |task| task.fail(reason.clone()).map(|_| task.clone()))
            .await
        {
            Ok(Ok(task)) => {
                error!(task_id = %task_id, error = %reason, "Analysis failed");
                let _ = self.events.send(TaskEvent::TaskUpdate { task });
            }
            Ok(Err(e)) | Err(e) => {
                debug!(task_id = %task_id, error = %reason, refused = %e, "Failure discarded");
            }
        }
    }

    async fn publish_progress(&self, task_id: Uuid, progress: u8, message: &str, counters: AnalysisSummary) {
        let applied = self
            .registry
            .update(task_id, |task| {
                if task.status != TaskStatus::Processing {
                    return None;
                }
                task.set_progress(progress, message);
                task.counters = counters.clone();
                Some(task.progress)
            })
            .await;

        if let Ok(Some(progress)) = applied {
            let _ = self.events.send(TaskEvent::TaskProgress {
                task_id,
                progress,
                status_message: message.to_string(),
                counters,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{Map, Value, json};
    use tokio::sync::Notify;

    use crate::error::SourceError;
    use crate::pipeline::FilterKind;
    use crate::source::InMemorySource;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    fn row(messages: Value, users: &str) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("messages".into(), messages);
        fields.insert("users".into(), json!(users));
        fields
    }

    fn sample_rows() -> Vec<Map<String, Value>> {
        let day = json!([{"sender_nick": "customer1", "time": "2024-06-01T14:00:00+08:00", "content": {"text": "hi"}}]);
        let night = json!([{"sender_nick": "customer2", "time": "2024-06-01T03:00:00+08:00"}]);
        vec![
            row(json!(day.to_string()), "agentA,customer1"),
            row(json!(night.to_string()), "customer2"),
            row(json!("not json"), "customer3"),
            row(json!(day.to_string()), "customer1"),
        ]
    }

    fn orchestrator(max_concurrent: usize) -> Arc<Orchestrator> {
        let config = AppConfig {
            max_concurrent_analysis: max_concurrent,
            progress_interval: 1,
            ..Default::default()
        };
        Orchestrator::new(&config, Arc::new(RosterStore::in_memory(vec!["agentA".into()])))
    }

    async fn wait_for(
        orch: &Orchestrator,
        id: Uuid,
        done: impl Fn(&TaskState) -> bool,
    ) -> TaskState {
        tokio::time::timeout(TEST_TIMEOUT, async {
            loop {
                let task = orch.get_status(id).await.unwrap();
                if done(&task) {
                    return task;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("timed out waiting for task")
    }

    /// Source whose `open` blocks until released.
    struct GatedSource {
        gate: Arc<Notify>,
        rows: Vec<Map<String, Value>>,
    }

    #[async_trait]
    impl RecordSource for GatedSource {
        fn name(&self) -> &str {
            "gated"
        }

        async fn open(&self) -> Result<Dataset, SourceError> {
            self.gate.notified().await;
            Ok(Dataset::from_rows("gated", self.rows.clone()))
        }
    }

    struct FailingSource;

    #[async_trait]
    impl RecordSource for FailingSource {
        fn name(&self) -> &str {
            "missing.json"
        }

        async fn open(&self) -> Result<Dataset, SourceError> {
            Err(SourceError::NotFound("missing.json".into()))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<u8>>,
    }

    impl ProgressSink for RecordingSink {
        fn report(&self, progress: u8, _message: &str, _counters: &AnalysisSummary) {
            self.seen.lock().unwrap().push(progress);
        }
    }

    #[test]
    fn progress_checkpoints_follow_row_count() {
        let dataset = Dataset::from_rows("d", sample_rows());
        let classifier = Classifier::new(
            RuleChain::default(),
            Default::default(),
            chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        );
        let sink = RecordingSink::default();
        let aggregator =
            classify_dataset(&dataset, &classifier, 1, &AtomicBool::new(false), &sink).unwrap();
        assert_eq!(aggregator.total(), 4);
        assert_eq!(*sink.seen.lock().unwrap(), vec![37, 55, 72, 90]);
    }

    #[test]
    fn cancel_flag_stops_classification() {
        struct CancellingSink<'a>(&'a AtomicBool);
        impl ProgressSink for CancellingSink<'_> {
            fn report(&self, _: u8, _: &str, _: &AnalysisSummary) {
                self.0.store(true, Ordering::Release);
            }
        }

        let dataset = Dataset::from_rows("d", sample_rows());
        let classifier = Classifier::new(
            RuleChain::default(),
            Default::default(),
            chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        );
        let cancel = AtomicBool::new(false);
        let sink = CancellingSink(&cancel);
        assert!(classify_dataset(&dataset, &classifier, 1, &cancel, &sink).is_none());
    }

    #[tokio::test]
    async fn completed_run_publishes_summary_and_details() {
        let orch = orchestrator(2);
        let mut rx = orch.subscribe();
        let id = orch
            .submit(Arc::new(InMemorySource::new("inline", sample_rows())))
            .await;

        let task = wait_for(&orch, id, |t| t.status.is_terminal()).await;
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);

        let result = orch.get_result(id).await.unwrap();
        let summary = result.summary;
        assert_eq!(summary.total_records, 4);
        assert_eq!(summary.filtered_records, 3);
        assert_eq!(summary.valid_records, 1);
        assert_eq!(summary.staff_involved_count, 1);
        assert_eq!(summary.early_morning_count, 1);
        assert_eq!(summary.parse_error_count, 1);
        assert_eq!(summary.filter_rate, 75.0);

        let page = orch.index().query(id, FilterKind::ParseError, 1, 50).await.unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.records[0].row_index, 2);

        let mut progress = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                TaskEvent::TaskProgress { progress: p, .. } => progress.push(p),
                TaskEvent::TaskUpdate { task } if task.status == TaskStatus::Completed => {
                    progress.push(task.progress)
                }
                _ => {}
            }
        }
        assert_eq!(progress.first(), Some(&20));
        assert!(progress.contains(&95));
        assert_eq!(progress.last(), Some(&100));
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn empty_dataset_completes_with_zero_rate() {
        let orch = orchestrator(1);
        let id = orch.submit(Arc::new(InMemorySource::new("empty", Vec::new()))).await;
        let task = wait_for(&orch, id, |t| t.status.is_terminal()).await;
        assert_eq!(task.status, TaskStatus::Completed);
        let result = orch.get_result(id).await.unwrap();
        assert_eq!(result.summary.total_records, 0);
        assert_eq!(result.summary.filter_rate, 0.0);
    }

    #[tokio::test]
    async fn source_failure_fails_task() {
        let orch = orchestrator(1);
        let id = orch.submit(Arc::new(FailingSource)).await;
        let task = wait_for(&orch, id, |t| t.status.is_terminal()).await;
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.unwrap().contains("missing.json"));
        assert!(matches!(orch.get_result(id).await, Err(TaskError::NotReady { .. })));
    }

    #[tokio::test]
    async fn delete_while_processing_cancels() {
        let orch = orchestrator(1);
        let gate = Arc::new(Notify::new());
        let id = orch
            .submit(Arc::new(GatedSource {
                gate: Arc::clone(&gate),
                rows: sample_rows(),
            }))
            .await;
        wait_for(&orch, id, |t| t.status == TaskStatus::Processing).await;

        assert_eq!(orch.delete(id).await.unwrap(), DeleteOutcome::Cancelled);
        gate.notify_one();

        // Let the run observe the flag, then confirm nothing was published.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let task = orch.get_status(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert!(task.result.is_none());
        assert!(matches!(orch.get_result(id).await, Err(TaskError::NotReady { .. })));
        assert!(orch.index().query(id, FilterKind::ParseError, 1, 10).await.is_err());
    }

    #[tokio::test]
    async fn pool_bounds_concurrent_runs() {
        let orch = orchestrator(1);
        let gate = Arc::new(Notify::new());
        let first = orch
            .submit(Arc::new(GatedSource {
                gate: Arc::clone(&gate),
                rows: sample_rows(),
            }))
            .await;
        wait_for(&orch, first, |t| t.status == TaskStatus::Processing).await;

        let second = orch
            .submit(Arc::new(InMemorySource::new("inline", sample_rows())))
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(orch.get_status(second).await.unwrap().status, TaskStatus::Pending);

        gate.notify_one();
        wait_for(&orch, first, |t| t.status == TaskStatus::Completed).await;
        wait_for(&orch, second, |t| t.status == TaskStatus::Completed).await;

        let listed: Vec<Uuid> = orch.list_tasks().await.iter().map(|t| t.task_id).collect();
        assert_eq!(listed.len(), 2);
        assert_eq!(orch.stats().await.completed_tasks, 2);
    }

    #[tokio::test]
    async fn disabled_rule_is_skipped_for_new_runs() {
        let orch = orchestrator(1);
        orch.set_rules(FilterRules {
            staff: false,
            ..Default::default()
        })
        .await;

        let id = orch
            .submit(Arc::new(InMemorySource::new("inline", sample_rows())))
            .await;
        wait_for(&orch, id, |t| t.status.is_terminal()).await;
        let summary = orch.get_result(id).await.unwrap().summary;
        assert_eq!(summary.staff_involved_count, 0);
        assert_eq!(summary.valid_records, 2);
    }

    async fn started_gated_run(orch: &Arc<Orchestrator>, rows: Vec<Map<String, Value>>) -> (Uuid, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let id = orch
            .submit(Arc::new(GatedSource {
                gate: Arc::clone(&gate),
                rows,
            }))
            .await;
        wait_for(orch, id, |t| t.status == TaskStatus::Processing).await;
        (id, gate)
    }

    fn staffed_daytime_row() -> Vec<Map<String, Value>> {
        let day = json!([{"sender_nick": "c", "time": "2024-06-01T14:00:00+08:00", "content": {"text": "hi"}}]);
        vec![row(json!(day.to_string()), "agentA,c")]
    }

    #[tokio::test]
    async fn roster_edit_during_load_does_not_reach_running_task() {
        let orch = Orchestrator::new(
            &AppConfig::default(),
            Arc::new(RosterStore::in_memory(Vec::new())),
        );
        let (id, gate) = started_gated_run(&orch, staffed_daytime_row()).await;

        orch.roster().add("agentA").await.unwrap();
        gate.notify_one();

        let task = wait_for(&orch, id, |t| t.status.is_terminal()).await;
        assert_eq!(task.status, TaskStatus::Completed);
        let summary = orch.get_result(id).await.unwrap().summary;
        assert_eq!(summary.staff_involved_count, 0);
        assert_eq!(summary.valid_records, 1);
    }

    #[tokio::test]
    async fn rule_toggle_during_load_does_not_reach_running_task() {
        let orch = orchestrator(1);
        let (id, gate) = started_gated_run(&orch, staffed_daytime_row()).await;

        orch.set_rules(FilterRules {
            staff: false,
            ..Default::default()
        })
        .await;
        gate.notify_one();

        wait_for(&orch, id, |t| t.status.is_terminal()).await;
        let summary = orch.get_result(id).await.unwrap().summary;
        assert_eq!(summary.staff_involved_count, 1);
        assert_eq!(summary.valid_records, 0);
    }

    #[tokio::test]
    async fn late_failure_leaves_cancelled_task_alone() {
        let orch = orchestrator(1);
        let (id, gate) = started_gated_run(&orch, sample_rows()).await;
        assert_eq!(orch.delete(id).await.unwrap(), DeleteOutcome::Cancelled);

        let mut rx = orch.subscribe();
        orch.fail(id, "dataset vanished".into()).await;

        let task = orch.get_status(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert!(task.error.is_none());
        assert!(rx.try_recv().is_err());
        gate.notify_one();
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let orch = orchestrator(1);
        let id = Uuid::new_v4();
        assert!(matches!(orch.get_status(id).await, Err(TaskError::NotFound { .. })));
        assert!(matches!(orch.delete(id).await, Err(TaskError::NotFound { .. })));
    }
}
