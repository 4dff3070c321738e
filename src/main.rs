use anyhow::Result;
use clap::Parser;
use gmail_triage::auth::CredentialBroker;
use gmail_triage::cli::{self, Cli, Commands, ProgressReporter};
use gmail_triage::client::GmailProvider;
use gmail_triage::config::Config;
use gmail_triage::error::TriageError;
use gmail_triage::pipeline::Pipeline;
use gmail_triage::store::ArtifactStore;
use indicatif::MultiProgress;
use std::io::Write;
use std::process;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// A writer that prints through MultiProgress so log lines land above the spinner
#[derive(Clone)]
struct MultiProgressWriter {
    multi: MultiProgress,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MultiProgressWriter {
    fn new(multi: MultiProgress) -> Self {
        Self {
            multi,
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Write for MultiProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "log buffer poisoned"))?;
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "log buffer poisoned"))?;
        if !buffer.is_empty() {
            let msg = String::from_utf8_lossy(&buffer);
            let msg = msg.trim_end_matches('\n');
            if !msg.is_empty() {
                let _ = self.multi.println(msg);
            }
            buffer.clear();
        }
        Ok(())
    }
}

impl Drop for MultiProgressWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[derive(Clone)]
struct MultiProgressMakeWriter {
    multi: MultiProgress,
}

impl<'a> MakeWriter<'a> for MultiProgressMakeWriter {
    type Writer = MultiProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MultiProgressWriter::new(self.multi.clone())
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("\n✗ Error: {}", e);
        if let Some(triage) = e.downcast_ref::<TriageError>() {
            for line in triage.hint() {
                eprintln!("  {}", line);
            }
        }
        eprintln!("\nFor help, run: gmail-triage --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // On non-Windows platforms use aws-lc-rs, on Windows use ring (no NASM/CMake required)
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    // Missing .env is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_triage=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gmail_triage=info,warn"))
    };

    let multi_progress = MultiProgress::new();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(MultiProgressMakeWriter {
            multi: multi_progress.clone(),
        })
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    match cli.command {
        Commands::Auth { force } => {
            let broker = CredentialBroker::google(&cli.credentials, &cli.token_cache);
            if force {
                broker.forget().await?;
            }

            let credential = broker.obtain().await?;
            println!("Successfully authenticated with Gmail API");
            println!("Token cached at: {:?}", cli.token_cache);

            let provider = GmailProvider::new()?;
            let email = provider.account_email(&credential).await?;
            println!("Connected to account: {}", email);

            Ok(())
        }

        Commands::Run { limit } => {
            let config = load_config(&cli).await?;
            let reporter = ProgressReporter::with_multi_progress(multi_progress.clone());
            let (on_phase, spinner) = reporter.phase_callback();

            let mut pipeline = Pipeline::google(config, &cli.credentials, &cli.token_cache)?
                .with_phase_callback(on_phase);
            if let Some(limit) = limit {
                pipeline = pipeline.with_limit(limit);
            }

            let report = match pipeline.run().await {
                Ok(report) => report,
                Err(e) => {
                    spinner.finish_and_clear();
                    return Err(e.into());
                }
            };

            reporter.finish_spinner(
                &spinner,
                &format!(
                    "Summarized {} emails in {:.1}s",
                    report.email_count,
                    report.duration.as_secs_f64()
                ),
            );
            print!("{}", cli::render_report(&report));

            Ok(())
        }

        Commands::List => {
            let store = ArtifactStore::new(summaries_dir(&cli).await?);
            let artifacts = store.list().await?;
            print!("{}", cli::render_artifact_list(&artifacts));
            Ok(())
        }

        Commands::Show { ref filename } => {
            let store = ArtifactStore::new(summaries_dir(&cli).await?);
            let artifact = store.read(filename).await?;
            println!("{}", cli::banner());
            println!("Summary {}", artifact.identifier);
            println!("{}\n", cli::banner());
            println!("{}", artifact.content.trim_end());
            Ok(())
        }

        Commands::InitConfig { ref output, force } => {
            tracing::info!("Generating example configuration file");

            if output.exists() && !force {
                return Err(TriageError::ConfigError(format!(
                    "Configuration file already exists at {:?}. Use --force to overwrite.",
                    output
                ))
                .into());
            }

            Config::create_example(output).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nKey settings to review:");
            println!("  - fetch.max_results: How many recent emails to summarize");
            println!("  - model.name: Gemini model used for the summary");
            println!("  - model.api_key_env: Environment variable holding the Gemini API key");
            println!("  - output.directory: Where summaries are saved");

            Ok(())
        }
    }
}

async fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(&cli.config).await?;
    if let Some(dir) = &cli.summaries_dir {
        config.output.directory = dir.clone();
    }
    Ok(config)
}

async fn summaries_dir(cli: &Cli) -> Result<std::path::PathBuf> {
    Ok(load_config(cli).await?.output.directory)
}
