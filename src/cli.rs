//! Command-line interface

use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::ArtifactDescriptor;
use crate::pipeline::{PhaseCallback, PipelineReport, RunPhase};

/// Width of the banner rules printed around a summary
const BANNER_WIDTH: usize = 60;

#[derive(Parser, Debug)]
#[command(name = "gmail-triage")]
#[command(version = "0.1.0")]
#[command(about = "Summarize your recent Gmail inbox into priority tiers with Gemini", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 credentials file
    #[arg(long, default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Path to token cache file
    #[arg(long, default_value = ".gmail-triage/token.json")]
    pub token_cache: PathBuf,

    /// Directory for saved summaries (overrides output.directory)
    #[arg(long)]
    pub summaries_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with Gmail API
    Auth {
        /// Force re-authentication even if token exists
        #[arg(long)]
        force: bool,
    },

    /// Fetch recent emails, summarize them and save the summary
    Run {
        /// Number of recent emails to summarize (overrides fetch.max_results)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=500))]
        limit: Option<u32>,
    },

    /// List saved summaries, newest first
    List,

    /// Print a saved summary
    Show {
        /// File name as printed by `list`, e.g. summary_2024-06-01_09-30-00.txt
        filename: String,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

/// Progress reporter using indicatif
pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::with_multi_progress(MultiProgress::new())
    }

    /// Share an existing `MultiProgress`, e.g. the one the log writer prints through
    pub fn with_multi_progress(multi: MultiProgress) -> Self {
        // Use {elapsed} for human-readable format (e.g., "1s", "234ms")
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        Self {
            multi,
            spinner_style,
        }
    }

    pub fn multi_progress(&self) -> &MultiProgress {
        &self.multi
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Finish a spinner and clear it from the multi-progress display
    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        let _ = self.multi.println(format!("  ✓ {}", msg));
    }

    /// Phase callback driving one spinner through the pipeline
    pub fn phase_callback(&self) -> (PhaseCallback, ProgressBar) {
        let spinner = self.add_spinner(RunPhase::Authenticating.description());
        let handle = spinner.clone();
        let callback: PhaseCallback = std::sync::Arc::new(move |phase: RunPhase| {
            handle.set_message(phase.description());
        });
        (callback, spinner)
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

pub fn banner() -> String {
    "=".repeat(BANNER_WIDTH)
}

/// Summary block printed after a run
pub fn render_report(report: &PipelineReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n", banner()));
    out.push_str(&format!("EMAIL SUMMARY ({} emails)\n", report.email_count));
    out.push_str(&format!("{}\n\n", banner()));
    out.push_str(report.summary.trim_end());
    out.push_str(&format!("\n\n{}\n", banner()));

    if report.skipped_count > 0 {
        out.push_str(&format!(
            "⚠ {} message(s) could not be read and were skipped\n",
            report.skipped_count
        ));
    }

    match &report.artifact {
        Some(artifact) => out.push_str(&format!("✓ Summary saved to: {}\n", artifact.path.display())),
        None => out.push_str("Nothing was saved.\n"),
    }
    out
}

/// Listing printed by the `list` command
pub fn render_artifact_list(artifacts: &[ArtifactDescriptor]) -> String {
    if artifacts.is_empty() {
        return "No saved summaries found.\n".to_string();
    }

    let mut out = format!("Saved summaries ({}):\n", artifacts.len());
    for artifact in artifacts {
        out.push_str(&format!("  {}  {}\n", artifact.identifier, artifact.filename));
    }
    out
}
