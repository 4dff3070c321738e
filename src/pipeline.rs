//! End-to-end triage run: credential, fetch, classify, save

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::auth::CredentialBroker;
use crate::classifier::PriorityClassifier;
use crate::client::GmailProvider;
use crate::config::{Config, ModelConfig};
use crate::error::Result;
use crate::fetcher::InboxFetcher;
use crate::gemini::GeminiModel;
use crate::models::{SummaryArtifact, SummaryOrigin};
use crate::store::ArtifactStore;

/// Step the pipeline is about to start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Authenticating,
    Fetching,
    Classifying,
    Saving,
}

impl RunPhase {
    pub fn description(&self) -> &'static str {
        match self {
            RunPhase::Authenticating => "Authenticating with Gmail API...",
            RunPhase::Fetching => "Fetching recent emails...",
            RunPhase::Classifying => "Generating AI summary...",
            RunPhase::Saving => "Saving summary...",
        }
    }
}

/// Invoked before each phase starts
pub type PhaseCallback = Arc<dyn Fn(RunPhase) + Send + Sync>;

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub summary: String,
    pub well_formed: bool,
    pub origin: SummaryOrigin,
    /// `None` when there was nothing to summarize
    pub artifact: Option<SummaryArtifact>,
    pub email_count: usize,
    pub skipped_count: usize,
    pub duration: Duration,
}

pub struct Pipeline {
    broker: CredentialBroker,
    fetcher: InboxFetcher,
    classifier: PriorityClassifier,
    store: ArtifactStore,
    model_config: ModelConfig,
    limit: u32,
    on_phase: Option<PhaseCallback>,
}

impl Pipeline {
    pub fn new(
        broker: CredentialBroker,
        fetcher: InboxFetcher,
        classifier: PriorityClassifier,
        store: ArtifactStore,
        model_config: ModelConfig,
        limit: u32,
    ) -> Self {
        Self {
            broker,
            fetcher,
            classifier,
            store,
            model_config,
            limit,
            on_phase: None,
        }
    }

    /// Pipeline wired to Gmail, Gemini and the configured summaries directory
    pub fn google(
        mut config: Config,
        credentials_path: impl Into<PathBuf>,
        token_cache_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        config.model.resolve_api_key();

        let provider = Arc::new(GmailProvider::new()?);
        let fetcher = InboxFetcher::new(
            provider,
            config.fetch.label.clone(),
            config.fetch.max_concurrent_requests,
        );
        let classifier = PriorityClassifier::new(Arc::new(GeminiModel::new(config.model.endpoint.clone())));

        Ok(Self::new(
            CredentialBroker::google(credentials_path, token_cache_path),
            fetcher,
            classifier,
            ArtifactStore::new(config.output.directory.clone()),
            config.model,
            config.fetch.max_results,
        ))
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_phase_callback(mut self, callback: PhaseCallback) -> Self {
        self.on_phase = Some(callback);
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run once. The first fatal error ends the run and is returned as is.
    pub async fn run(&self) -> Result<PipelineReport> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("run", run_id = %run_id);
        self.execute(run_id).instrument(span).await
    }

    async fn execute(&self, run_id: String) -> Result<PipelineReport> {
        let started_at = Utc::now();
        let timer = Instant::now();
        info!("Starting pipeline run");

        self.enter(RunPhase::Authenticating);
        let credential = self.broker.obtain().await?;

        self.enter(RunPhase::Fetching);
        let batch = self.fetcher.fetch(&credential, self.limit).await?;
        info!(
            "Fetched {} emails ({} skipped)",
            batch.len(),
            batch.skipped_ids().len()
        );

        self.enter(RunPhase::Classifying);
        let result = self.classifier.triage(&batch, &self.model_config).await?;

        let artifact = if batch.is_empty() {
            info!("No emails to summarize, nothing saved");
            None
        } else {
            self.enter(RunPhase::Saving);
            Some(self.store.save(&result.text).await?)
        };

        let duration = timer.elapsed();
        info!("Pipeline run finished in {:.1}s", duration.as_secs_f64());

        Ok(PipelineReport {
            run_id,
            started_at,
            summary: result.text,
            well_formed: result.well_formed,
            origin: result.origin,
            artifact,
            email_count: batch.len(),
            skipped_count: batch.skipped_ids().len(),
            duration,
        })
    }

    fn enter(&self, phase: RunPhase) {
        if let Some(callback) = &self.on_phase {
            callback(phase);
        }
    }
}
