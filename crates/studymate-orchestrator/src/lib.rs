//! Fan-out of one question to several backends, deterministic merging of
//! their answers, outline formatting and the per-document session facade.
pub mod combine;
pub mod formatter;
pub mod orchestrator;
pub mod session;

pub use combine::{CombinePolicy, Contribution, LabeledConcatenation, MostStructured};
pub use formatter::{FormatMethod, Section, StructuredAnswer};
pub use orchestrator::Orchestrator;
pub use session::{Answer, HistoryEntry, SessionStats, StudySession};
