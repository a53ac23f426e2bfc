pub mod ingest;
pub mod traits;

pub use ingest::{IngestClient, IngestError};
pub use traits::{Category, Submission, WatchIngest};
