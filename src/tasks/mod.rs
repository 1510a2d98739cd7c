//! Analysis tasks: lifecycle, registry, bounded execution and the read path
//! over finished results.

pub mod index;
pub mod orchestrator;
pub mod registry;
pub mod state;

pub use index::{FilterDetailPage, FilterIndex};
pub use orchestrator::{AnalysisResult, Orchestrator, ProgressSink, TaskEvent};
pub use registry::{DeleteOutcome, TaskRegistry, TaskStats};
pub use state::{TaskState, TaskStatus};
