//! Running totals and the ordered filtered-record list for one run.

use serde::{Deserialize, Serialize};

use crate::pipeline::classifier::Classification;
use crate::pipeline::types::{FilterKind, FilteredRecordDetail};

/// Counters of a finished (or in-flight) run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_records: usize,
    pub filtered_records: usize,
    pub valid_records: usize,
    /// Percentage of filtered records, two decimals; 0 for an empty dataset.
    pub filter_rate: f64,
    pub early_morning_count: usize,
    pub staff_involved_count: usize,
    pub service_assistant_count: usize,
    pub address_confirm_count: usize,
    pub parse_error_count: usize,
    pub empty_records_count: usize,
}

impl AnalysisSummary {
    pub fn count_for(&self, kind: FilterKind) -> usize {
        match kind {
            FilterKind::EmptyRecord => self.empty_records_count,
            FilterKind::EarlyMorning => self.early_morning_count,
            FilterKind::StaffInvolved => self.staff_involved_count,
            FilterKind::ServiceAssistantOnly => self.service_assistant_count,
            FilterKind::AddressConfirmation => self.address_confirm_count,
            FilterKind::ParseError => self.parse_error_count,
        }
    }
}

/// Folds classifications into counters and an append-only detail list.
#[derive(Debug, Default)]
pub struct Aggregator {
    total: usize,
    per_kind: [usize; FilterKind::ALL.len()],
    details: Vec<FilteredRecordDetail>,
}

fn slot(kind: FilterKind) -> usize {
    match kind {
        FilterKind::EmptyRecord => 0,
        FilterKind::EarlyMorning => 1,
        FilterKind::StaffInvolved => 2,
        FilterKind::ServiceAssistantOnly => 3,
        FilterKind::AddressConfirmation => 4,
        FilterKind::ParseError => 5,
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one record. Each record lands in at most one bucket.
    pub fn record(&mut self, classification: Classification) {
        self.total += 1;
        if let Some(kind) = classification.verdict.kind() {
            self.per_kind[slot(kind)] += 1;
        }
        if let Some(detail) = classification.detail {
            self.details.push(detail);
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn filtered(&self) -> usize {
        self.per_kind.iter().sum()
    }

    pub fn details(&self) -> &[FilteredRecordDetail] {
        &self.details
    }

    pub fn summary(&self) -> AnalysisSummary {
        let filtered = self.filtered();
        let filter_rate = if self.total == 0 {
            0.0
        } else {
            (filtered as f64 / self.total as f64 * 100.0 * 100.0).round() / 100.0
        };

        AnalysisSummary {
            total_records: self.total,
            filtered_records: filtered,
            valid_records: self.total - filtered,
            filter_rate,
            empty_records_count: self.per_kind[slot(FilterKind::EmptyRecord)],
            early_morning_count: self.per_kind[slot(FilterKind::EarlyMorning)],
            staff_involved_count: self.per_kind[slot(FilterKind::StaffInvolved)],
            service_assistant_count: self.per_kind[slot(FilterKind::ServiceAssistantOnly)],
            address_confirm_count: self.per_kind[slot(FilterKind::AddressConfirmation)],
            parse_error_count: self.per_kind[slot(FilterKind::ParseError)],
        }
    }

    /// Consume the aggregator, yielding the summary and the details in row
    /// order.
    pub fn finish(self) -> (AnalysisSummary, Vec<FilteredRecordDetail>) {
        let summary = self.summary();
        (summary, self.details)
    }
}
