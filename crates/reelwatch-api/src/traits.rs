//! Trait definitions for the watch-log ingestion backend.
//!
//! The detector only depends on [`WatchIngest`], so tests can swap the
//! HTTP client for an in-memory recorder.

use std::future::Future;

use serde::{Deserialize, Serialize};

/// A sink that records watched titles.
pub trait WatchIngest: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Submit one watched title. Returns the backend's JSON acknowledgement.
    fn submit(
        &self,
        submission: &Submission,
    ) -> impl Future<Output = Result<serde_json::Value, Self::Error>> + Send;
}

/// List a title is filed under on the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    /// Recently viewed.
    #[serde(rename = "viewed")]
    Viewed,
    /// Plan to watch. Accepted by the backend; the detector never files here.
    #[serde(rename = "2watch")]
    PlanToWatch,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Viewed => write!(f, "viewed"),
            Self::PlanToWatch => write!(f, "2watch"),
        }
    }
}

/// Request body sent to the ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Sent as `movieName`, the field the backend reads.
    #[serde(rename = "movieName")]
    pub title: String,
    pub category: Category,
}

impl Submission {
    /// A title the user has just watched.
    pub fn viewed(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            category: Category::Viewed,
        }
    }
}
