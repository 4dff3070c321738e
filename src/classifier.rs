//! Priority classification of an email batch through a generative model

use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ModelConfig;
use crate::error::{ClassificationErrorKind, Result, TriageError};
use crate::gemini::GenerativeModel;
use crate::models::{ClassificationResult, EmailBatch, EmailRecord, SummaryOrigin};

/// Summary text returned for an empty batch
pub const EMPTY_BATCH_SUMMARY: &str = "No emails to summarize.";

/// First line of the summary synthesized when the model answers with nothing
pub const FALLBACK_HEADER: &str = "Email Summary (AI processing unavailable)";

/// Prepended to model output that is missing a priority section
pub const FORMAT_WARNING: &str = "[Note: AI response may not be properly formatted]\n\n";

/// Section labels a well-formed summary must contain
pub const PRIORITY_SECTIONS: [&str; 3] = ["High Priority", "Medium Priority", "Low Priority"];

const PROMPT_INSTRUCTIONS: &str = r#"Provide a summary with exactly three sections:
- High Priority: Urgent or important emails requiring immediate attention
- Medium Priority: Emails of moderate importance that should be addressed soon
- Low Priority: Informational emails or low urgency items

Format each email as a bullet point with the subject and sender.
Use this exact format:

High Priority:
• [Subject] - From: [Sender]

Medium Priority:
• [Subject] - From: [Sender]

Low Priority:
• [Subject] - From: [Sender]

If a priority category has no emails, write "None" under that section."#;

pub struct PriorityClassifier {
    model: Arc<dyn GenerativeModel>,
}

impl PriorityClassifier {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    /// Summary text for `batch`
    pub async fn classify(&self, batch: &EmailBatch, config: &ModelConfig) -> Result<String> {
        self.triage(batch, config).await.map(|result| result.text)
    }

    /// Classify `batch`, reporting whether the output was well formed and where it came from
    ///
    /// Configuration is checked before anything else, so a missing key fails even for
    /// an empty batch. The model is called at most once.
    pub async fn triage(&self, batch: &EmailBatch, config: &ModelConfig) -> Result<ClassificationResult> {
        let api_key = config.require_api_key()?;
        let model_name = config.require_model()?;

        if batch.is_empty() {
            debug!("Empty batch, skipping model call");
            return Ok(ClassificationResult {
                text: EMPTY_BATCH_SUMMARY.to_string(),
                well_formed: false,
                origin: SummaryOrigin::EmptyBatch,
            });
        }

        let prompt = build_prompt(batch.records());
        info!("Sending {} emails to {} for summarization", batch.len(), model_name);

        let response = tokio::time::timeout(
            config.timeout(),
            self.model.generate(api_key, model_name, &prompt),
        )
        .await
        .map_err(|_| TriageError::ClassificationError {
            kind: ClassificationErrorKind::Network,
            message: format!("Model request timed out after {}s", config.timeout_secs),
        })??;

        Ok(interpret_response(&response, batch.records()))
    }
}

/// Turn the raw model answer into the final summary
pub fn interpret_response(response: &str, records: &[EmailRecord]) -> ClassificationResult {
    let text = response.trim();

    if text.is_empty() {
        warn!("Model returned an empty response, using fallback summary");
        return ClassificationResult {
            text: fallback_summary(records),
            well_formed: false,
            origin: SummaryOrigin::Fallback,
        };
    }

    if has_all_sections(text) {
        info!("AI summary generated successfully");
        ClassificationResult {
            text: text.to_string(),
            well_formed: true,
            origin: SummaryOrigin::Model,
        }
    } else {
        warn!("Model response does not contain the expected priority sections");
        ClassificationResult {
            text: format!("{}{}", FORMAT_WARNING, text),
            well_formed: false,
            origin: SummaryOrigin::Model,
        }
    }
}

pub fn build_prompt(records: &[EmailRecord]) -> String {
    let emails = records
        .iter()
        .enumerate()
        .map(|(i, record)| format!("{}. Subject: {}\n   From: {}", i + 1, record.subject(), record.sender()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an email assistant. Analyze these {} emails and categorize them by priority.\n\n\
         Emails to analyze:\n{}\n\n{}",
        records.len(),
        emails,
        PROMPT_INSTRUCTIONS
    )
}

/// One bullet per record, no grouping
pub fn fallback_summary(records: &[EmailRecord]) -> String {
    let mut summary = format!("{}\n\n", FALLBACK_HEADER);
    for record in records {
        let _ = writeln!(summary, "• {} - From: {}", record.subject(), record.sender());
    }
    summary
}

pub fn has_all_sections(text: &str) -> bool {
    PRIORITY_SECTIONS.iter().all(|label| text.contains(label))
}
