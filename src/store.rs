//! Timestamped summary files on disk

use chrono::{Local, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::error::{PersistenceCause, Result, TriageError};
use crate::models::{ArtifactDescriptor, SummaryArtifact};

const FILE_PREFIX: &str = "summary_";
const FILE_SUFFIX: &str = ".txt";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Highest sequence suffix tried when several summaries are saved in one second
const MAX_SEQUENCE: u32 = 99;

static ARTIFACT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^summary_\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2}(_\d{2})?\.txt$").unwrap()
});

/// Directory of `summary_<timestamp>.txt` files
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    directory: PathBuf,
}

impl ArtifactStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Save `text` under the current local time
    pub async fn save(&self, text: &str) -> Result<SummaryArtifact> {
        self.save_at(text, Local::now().naive_local()).await
    }

    /// Save `text` under the given timestamp
    ///
    /// Never overwrites: if the name is taken, `_02`, `_03`, ... are appended so that
    /// descending filename order still matches save order.
    pub async fn save_at(&self, text: &str, timestamp: NaiveDateTime) -> Result<SummaryArtifact> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|source| TriageError::PersistenceError {
                cause: PersistenceCause::Directory,
                path: self.directory.clone(),
                source,
            })?;

        let base = timestamp.format(TIMESTAMP_FORMAT).to_string();

        for sequence in 1..=MAX_SEQUENCE {
            let identifier = if sequence == 1 {
                base.clone()
            } else {
                format!("{}_{:02}", base, sequence)
            };
            let path = self.directory.join(file_name(&identifier));

            let file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("{:?} already exists, trying next sequence", path);
                    continue;
                }
                Err(source) => return Err(write_error(path, source)),
            };

            write_or_discard(file, &path, text).await?;

            info!("Summary saved to {:?}", path);
            return Ok(SummaryArtifact {
                identifier,
                content: text.to_string(),
                path,
            });
        }

        Err(write_error(
            self.directory.join(file_name(&base)),
            std::io::Error::new(
                ErrorKind::AlreadyExists,
                format!("{} summaries already saved in this second", MAX_SEQUENCE),
            ),
        ))
    }

    /// Saved summaries, newest first. A missing directory is an empty store.
    pub async fn list(&self) -> Result<Vec<ArtifactDescriptor>> {
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut artifacts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(filename) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !ARTIFACT_NAME.is_match(&filename) {
                continue;
            }

            artifacts.push(ArtifactDescriptor {
                identifier: identifier_of(&filename).to_string(),
                path: entry.path(),
                filename,
            });
        }

        artifacts.sort_by(|a, b| b.filename.cmp(&a.filename));
        debug!("Found {} summaries in {:?}", artifacts.len(), self.directory);
        Ok(artifacts)
    }

    /// Read one saved summary by file name
    pub async fn read(&self, filename: &str) -> Result<SummaryArtifact> {
        if !ARTIFACT_NAME.is_match(filename) {
            return Err(TriageError::ArtifactNotFound(filename.to_string()));
        }

        let path = self.directory.join(filename);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TriageError::ArtifactNotFound(filename.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(SummaryArtifact {
            identifier: identifier_of(filename).to_string(),
            content,
            path,
        })
    }
}

fn file_name(identifier: &str) -> String {
    format!("{}{}{}", FILE_PREFIX, identifier, FILE_SUFFIX)
}

fn identifier_of(filename: &str) -> &str {
    filename
        .strip_prefix(FILE_PREFIX)
        .and_then(|rest| rest.strip_suffix(FILE_SUFFIX))
        .unwrap_or(filename)
}

async fn write_all<W: AsyncWrite + Unpin>(writer: &mut W, text: &str) -> std::io::Result<()> {
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await
}

/// Write `text`, removing the half-written file at `path` if that fails
async fn write_or_discard<W: AsyncWrite + Unpin>(mut writer: W, path: &Path, text: &str) -> Result<()> {
    let outcome = write_all(&mut writer, text).await;
    drop(writer);

    if let Err(source) = outcome {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("Failed to remove partial summary {:?}: {}", path, e);
        }
        return Err(write_error(path.to_path_buf(), source));
    }
    Ok(())
}

fn write_error(path: PathBuf, source: std::io::Error) -> TriageError {
    TriageError::PersistenceError {
        cause: PersistenceCause::Write,
        path,
        source,
    }
}
