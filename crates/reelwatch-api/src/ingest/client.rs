use std::time::Duration;

use reqwest::Client;

use super::error::IngestError;
use crate::traits::{Submission, WatchIngest};

/// HTTP client for the tracker's submit endpoint.
#[derive(Debug, Clone)]
pub struct IngestClient {
    endpoint: String,
    http: Client,
}

impl IngestClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, IngestError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }

    /// Check the HTTP response for errors and return the body text on failure.
    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, IngestError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status, "Ingest endpoint error");
            Err(IngestError::Api {
                status,
                message: body,
            })
        }
    }
}

impl WatchIngest for IngestClient {
    type Error = IngestError;

    async fn submit(&self, submission: &Submission) -> Result<serde_json::Value, IngestError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            title = %submission.title,
            category = %submission.category,
            "Submitting title"
        );

        let resp = self
            .http
            .post(&self.endpoint)
            .json(submission)
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| IngestError::Parse(e.to_string()))
    }
}
