//! Whole-dataset properties of the filtering pipeline.

use chrono::NaiveDate;
use serde_json::{Map, Value, json};

use chat_filter::config::{FilterConfig, FilterRules};
use chat_filter::pipeline::{
    Aggregator, AnalysisSummary, Classifier, FilterKind, FilteredRecordDetail, RawRecord, RuleChain,
};
use chat_filter::roster::RosterSnapshot;
use chat_filter::source::Dataset;
use chat_filter::tasks::index::paginate;

fn classifier() -> Classifier {
    Classifier::new(
        RuleChain::new(FilterConfig::default(), FilterRules::default()),
        RosterSnapshot::new(vec!["agentA".into(), "agentB".into()]),
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
    )
}

/// A mixed dataset cycling through every outcome.
fn mixed_dataset(rows: usize) -> Dataset {
    let config = FilterConfig::default();
    let day = |sender: &str| json!({"sender_nick": sender, "time": "2024-06-01T14:00:00+08:00", "content": {"text": "hi"}});

    let fields: Vec<Map<String, Value>> = (0..rows)
        .map(|i| {
            let (messages, users) = match i % 7 {
                0 => (json!([day("c")]).to_string(), "agentA,c".to_string()),
                1 => (
                    json!([{"sender_nick": "c", "time": "2024-06-01 05:30:00"}]).to_string(),
                    "c".to_string(),
                ),
                2 => ("{broken".to_string(), "c".to_string()),
                3 => (String::new(), "c".to_string()),
                4 => (
                    json!([{"sender_nick": config.assistant_account, "time": "2024-06-01T10:00:00+08:00", "content": {"text": "auto"}}])
                        .to_string(),
                    "c".to_string(),
                ),
                5 => (
                    json!([{"sender_nick": "c", "time": "2024-06-01T10:00:00+08:00", "content": {"summary": config.address_confirm_tag}}])
                        .to_string(),
                    "c".to_string(),
                ),
                _ => (json!([day("c")]).to_string(), "c".to_string()),
            };
            let mut row = Map::new();
            row.insert("messages".into(), json!(messages));
            row.insert("users".into(), json!(users));
            row.insert("order_id".into(), json!(format!("ORD{i}")));
            row
        })
        .collect();
    Dataset::from_rows("mixed", fields)
}

fn run(dataset: &Dataset) -> (AnalysisSummary, Vec<FilteredRecordDetail>) {
    let classifier = classifier();
    let mut aggregator = Aggregator::new();
    for record in &dataset.rows {
        aggregator.record(classifier.classify(record));
    }
    aggregator.finish()
}

#[test]
fn counters_are_consistent() {
    let (summary, details) = run(&mixed_dataset(140));

    assert_eq!(summary.total_records, 140);
    assert_eq!(summary.valid_records + summary.filtered_records, summary.total_records);
    let per_kind: usize = FilterKind::ALL.iter().map(|k| summary.count_for(*k)).sum();
    assert_eq!(per_kind, summary.filtered_records);
    assert_eq!(details.len(), summary.filtered_records);

    for kind in FilterKind::ALL {
        let n = details.iter().filter(|d| d.filter_kind == kind).count();
        assert_eq!(n, summary.count_for(kind), "{kind}");
        assert_eq!(n, 20, "{kind}");
    }
    assert_eq!(summary.valid_records, 20);
}

#[test]
fn details_keep_row_order() {
    let (_, details) = run(&mixed_dataset(50));
    assert!(details.windows(2).all(|w| w[0].row_index < w[1].row_index));
}

#[test]
fn classification_is_idempotent() {
    let dataset = mixed_dataset(70);
    assert_eq!(run(&dataset), run(&dataset));
}

#[test]
fn pages_reassemble_each_kind() {
    let (_, details) = run(&mixed_dataset(700));

    for kind in FilterKind::ALL {
        let expected: Vec<&FilteredRecordDetail> =
            details.iter().filter(|d| d.filter_kind == kind).collect();
        let first = paginate(&details, kind, 1, 50).unwrap();
        assert_eq!(first.total_count, expected.len());
        assert_eq!(first.total_pages, expected.len().div_ceil(50));

        let mut collected = Vec::new();
        for page in 1..=first.total_pages {
            collected.extend(paginate(&details, kind, page, 50).unwrap().records);
        }
        let collected: Vec<&FilteredRecordDetail> = collected.iter().collect();
        assert_eq!(collected, expected);

        let beyond = paginate(&details, kind, first.total_pages + 1, 50).unwrap();
        assert!(beyond.records.is_empty());
        assert_eq!(beyond.total_count, expected.len());
    }
}

#[test]
fn early_morning_beats_staff() {
    let record = RawRecord::new(
        0,
        json!({
            "messages": json!([{"sender_nick": "c", "time": "2024-06-01T03:00:00+08:00"}]).to_string(),
            "users": "agentA"
        })
        .as_object()
        .cloned()
        .unwrap(),
    );
    let c = classifier().classify(&record);
    assert_eq!(c.verdict.kind(), Some(FilterKind::EarlyMorning));
}

#[test]
fn empty_dataset_has_zero_rate() {
    let (summary, details) = run(&mixed_dataset(0));
    assert_eq!(summary.total_records, 0);
    assert_eq!(summary.filter_rate, 0.0);
    assert!(details.is_empty());
}
