pub mod client;
pub mod error;

pub use client::IngestClient;
pub use error::IngestError;
