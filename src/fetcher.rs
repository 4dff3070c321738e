//! Inbox fetcher: list recent messages, then read their headers with bounded concurrency

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::MailProvider;
use crate::error::{Result, TriageError};
use crate::models::{Credential, EmailBatch, EmailRecord};

pub struct InboxFetcher {
    provider: Arc<dyn MailProvider>,
    label: String,
    max_concurrent: usize,
}

impl InboxFetcher {
    pub fn new(provider: Arc<dyn MailProvider>, label: impl Into<String>, max_concurrent: usize) -> Self {
        Self {
            provider,
            label: label.into(),
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Fetch up to `limit` of the most recent messages
    ///
    /// Failing to list the inbox is fatal. A failed metadata lookup only drops that
    /// message; its id is kept in [`EmailBatch::skipped_ids`]. Records come back in
    /// listing order regardless of which lookups finish first.
    pub async fn fetch(&self, credential: &Credential, limit: u32) -> Result<EmailBatch> {
        if limit == 0 {
            return Err(TriageError::ConfigError(
                "fetch limit must be at least 1".to_string(),
            ));
        }

        let mut ids = self
            .provider
            .list_message_ids(credential, &self.label, limit)
            .await
            .map_err(|e| match e {
                TriageError::FetchError(_) => e,
                other => TriageError::FetchError(other.to_string()),
            })?;
        ids.truncate(limit as usize);

        if ids.is_empty() {
            info!("No messages found with label {}", self.label);
            return Ok(EmailBatch::default());
        }

        info!(
            "Fetching metadata for {} messages with {} concurrent workers",
            ids.len(),
            self.max_concurrent
        );

        let provider = &self.provider;
        let results: Vec<(String, Result<EmailRecord>)> = stream::iter(ids)
            .map(|id| async move {
                debug!("Fetching message: {}", id);
                let result = provider
                    .get_message_headers(credential, &id)
                    .await
                    .map(|headers| EmailRecord::from_headers(&headers));
                (id, result)
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let mut records = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();

        for (id, result) in results {
            match result {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("Skipping message {}: {}", id, e);
                    skipped.push(id);
                }
            }
        }

        if !skipped.is_empty() {
            warn!("Failed to fetch {} messages", skipped.len());
        }
        info!("Successfully fetched {} messages", records.len());

        Ok(EmailBatch::new(records, skipped))
    }
}
