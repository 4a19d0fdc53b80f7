pub mod comparator;
pub mod content_type;
pub mod engine;
pub mod pager;
pub mod scanner;
pub mod transfer;

pub use comparator::{destination_key, FileComparator, SyncDecision, UploadReason};
pub use content_type::content_type_for;
pub use engine::{ErrorEntry, FileOutcome, SyncConfig, SyncEngine, SyncOutcome, SyncReport, UploadedEntry};
pub use scanner::{scan_destination, scan_source};
pub use transfer::TransferExecutor;
