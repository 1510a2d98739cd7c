//! Filtered-record index: paged reads over a completed task's details.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TaskError;
use crate::pipeline::{FilterKind, FilteredRecordDetail};
use crate::tasks::registry::TaskRegistry;

/// Default page size of the HTTP surface.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// One page of filtered records of a single kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterDetailPage {
    pub filter_kind: FilterKind,
    pub total_count: usize,
    pub records: Vec<FilteredRecordDetail>,
    /// 1-indexed.
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

/// Slice `details` down to page `page` of the records of `kind`.
///
/// Row order is preserved; a page past the end is empty but still reports the
/// real `total_count`.
pub fn paginate(
    details: &[FilteredRecordDetail],
    kind: FilterKind,
    page: usize,
    page_size: usize,
) -> Result<FilterDetailPage, TaskError> {
    if page == 0 {
        return Err(TaskError::InvalidInput("page must be at least 1".into()));
    }
    if page_size == 0 {
        return Err(TaskError::InvalidInput("page_size must be at least 1".into()));
    }

    let matching: Vec<&FilteredRecordDetail> =
        details.iter().filter(|d| d.filter_kind == kind).collect();
    let total_count = matching.len();
    let records = matching
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .cloned()
        .collect();

    Ok(FilterDetailPage {
        filter_kind: kind,
        total_count,
        records,
        page,
        page_size,
        total_pages: total_count.div_ceil(page_size),
    })
}

/// Read-only view used by the HTTP layer.
#[derive(Clone)]
pub struct FilterIndex {
    registry: Arc<TaskRegistry>,
}

impl FilterIndex {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self { registry }
    }

    pub async fn query(
        &self,
        task_id: Uuid,
        kind: FilterKind,
        page: usize,
        page_size: usize,
    ) -> Result<FilterDetailPage, TaskError> {
        let details = self.registry.details(task_id).await?;
        paginate(&details, kind, page, page_size)
    }

    pub async fn find_by_record_id(
        &self,
        task_id: Uuid,
        record_id: &str,
    ) -> Result<FilteredRecordDetail, TaskError> {
        let details = self.registry.details(task_id).await?;
        details
            .iter()
            .find(|d| d.record_id == record_id)
            .cloned()
            .ok_or_else(|| TaskError::RecordNotFound {
                id: task_id,
                record_id: record_id.to_string(),
            })
    }
}
