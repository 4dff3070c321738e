//! Gmail Inbox Triage
//!
//! Reads the subject and sender of your most recent Gmail messages, asks a Gemini
//! model to sort them into High / Medium / Low priority, and keeps every summary as
//! a timestamped text file.
//!
//! # Overview
//!
//! - **Authentication**: OAuth2 with a cached, refreshable credential
//! - **Fetching**: Metadata-only lookups with bounded concurrency; unreadable messages are skipped
//! - **Classification**: One model call per run, with a fallback when the model returns nothing
//! - **Storage**: `summary_YYYY-MM-DD_HH-MM-SS.txt` files, listed newest first
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_triage::{config::Config, pipeline::Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!
//!     let pipeline = Pipeline::google(config, "credentials.json", ".gmail-triage/token.json")?;
//!     let report = pipeline.run().await?;
//!
//!     println!("{}", report.summary);
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - Credential lifecycle: cache, refresh, interactive authorization
//! - [`client`] - Gmail inbox provider
//! - [`fetcher`] - Inbox fetcher producing an [`EmailBatch`]
//! - [`gemini`] - Gemini generative model provider
//! - [`classifier`] - Priority classification, validation and fallback
//! - [`store`] - Summary artifact storage
//! - [`pipeline`] - Orchestration of a full run
//! - [`cli`] - Command-line interface and progress reporting
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`models`] - Core data structures

pub mod auth;
pub mod classifier;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod gemini;
pub mod models;
pub mod pipeline;
pub mod store;

// Re-export commonly used types for convenience
pub use error::{ClassificationErrorKind, PersistenceCause, Result, TriageError};

pub use models::{
    ArtifactDescriptor, ClassificationResult, Credential, CredentialState, EmailBatch, EmailRecord,
    MessageHeader, SummaryArtifact, SummaryOrigin,
};

pub use config::{Config, FetchConfig, ModelConfig, OutputConfig};

pub use auth::{Authorizer, CredentialBroker, CredentialCache, TokenRefresher};
pub use client::{GmailProvider, MailProvider};
pub use fetcher::InboxFetcher;
pub use gemini::{GeminiModel, GenerativeModel};
pub use classifier::PriorityClassifier;
pub use store::ArtifactStore;
pub use pipeline::{Pipeline, PipelineReport, RunPhase};
