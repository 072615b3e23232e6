pub mod loaders;
pub mod outcome;
pub mod summary;
pub mod work_item;

pub use loaders::{load_work_items, LoadReport, SkippedFile};
pub use outcome::{CallOutcome, ItemResult, ItemStatus, ReviewContent, Settlement, Terminal};
pub use summary::BatchSummary;
pub use work_item::{McqRecord, WorkItem};
