//! Record filtering pipeline.
//!
//! Every row of a dataset flows through:
//! 1. `classifier::parse_messages` / `parse_users`: lenient field parsing
//! 2. `RuleChain::evaluate()`: fixed-order rules, first match wins
//! 3. `Aggregator::record()`: counters plus the ordered detail list
//!
//! A bad row becomes a `parse_error` detail; it never fails the run.

pub mod aggregator;
pub mod classifier;
pub mod rules;
pub mod types;

pub use aggregator::{AnalysisSummary, Aggregator};
pub use classifier::{Classification, Classifier};
pub use rules::RuleChain;
pub use types::{FilterKind, FilterMatch, FilterVerdict, FilteredRecordDetail, Message, RawRecord};
