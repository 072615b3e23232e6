pub mod json_loader;

pub use json_loader::{load_work_item, load_work_items, LoadReport, SkippedFile};
