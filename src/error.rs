use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Result with TriageError
pub type Result<T> = std::result::Result<T, TriageError>;

/// Error types for the inbox triage pipeline
///
/// The first five variants are the fatal kinds surfaced at the pipeline boundary.
/// The remaining variants describe provider-level failures; per-message ones are
/// absorbed by the fetcher, the rest are wrapped into one of the fatal kinds.
#[derive(Error, Debug)]
pub enum TriageError {
    /// No usable credential could be obtained
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Listing the inbox failed, so no records can be produced
    #[error("Failed to fetch inbox: {0}")]
    FetchError(String),

    /// A required key or setting is missing or invalid
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The generative model call failed
    #[error("Classification failed ({kind}): {message}")]
    ClassificationError {
        kind: ClassificationErrorKind,
        message: String,
    },

    /// Saving the summary artifact failed
    #[error("Failed to {cause} {path:?}: {source}")]
    PersistenceError {
        cause: PersistenceCause,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Requested artifact does not exist or is not an artifact name
    #[error("Summary not found: {0}")]
    ArtifactNotFound(String),

    /// Gmail API returned an error
    #[error("Gmail API error: {0}")]
    ApiError(String),

    /// Rate limit exceeded (429)
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Network-related error (connection issues, timeouts, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Resource not found (404)
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// Forbidden (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// Invalid message format or parsing error
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Sub-kind of a failed model call, used only to pick remediation text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationErrorKind {
    Auth,
    Quota,
    Network,
    Unknown,
}

static AUTH_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(api[ _-]?key|authenticat|unauthori[sz]ed|permission denied|invalid)").unwrap()
});

static QUOTA_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(quota|rate[ _-]?limit|resource[ _]exhausted|too many requests)").unwrap()
});

static NETWORK_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(network|connection|connect|timed? ?out|dns)").unwrap()
});

impl ClassificationErrorKind {
    /// Derive the kind from an HTTP status code, if it is conclusive
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            401 | 403 => Some(Self::Auth),
            429 => Some(Self::Quota),
            408 | 504 => Some(Self::Network),
            _ => None,
        }
    }

    /// Derive the kind from a Google RPC status name such as `RESOURCE_EXHAUSTED`
    pub fn from_rpc_status(status: &str) -> Option<Self> {
        match status {
            "UNAUTHENTICATED" | "PERMISSION_DENIED" => Some(Self::Auth),
            "RESOURCE_EXHAUSTED" => Some(Self::Quota),
            "DEADLINE_EXCEEDED" | "UNAVAILABLE" => Some(Self::Network),
            _ => None,
        }
    }

    /// Keyword match on an error description.
    ///
    /// Text matching is fragile; prefer `from_status` / `from_rpc_status` and only
    /// fall back to this when no structured signal is available.
    pub fn from_message(message: &str) -> Self {
        if AUTH_KEYWORDS.is_match(message) {
            Self::Auth
        } else if QUOTA_KEYWORDS.is_match(message) {
            Self::Quota
        } else if NETWORK_KEYWORDS.is_match(message) {
            Self::Network
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Quota => "quota",
            Self::Network => "network",
            Self::Unknown => "unknown",
        }
    }

    /// User-facing remediation text
    pub fn remediation(&self) -> &'static [&'static str] {
        match self {
            Self::Auth => &[
                "Verify that your Gemini API key is correct and active.",
                "Get a valid key from: https://aistudio.google.com/app/apikey",
            ],
            Self::Quota => &[
                "You have exceeded your Gemini API quota or rate limit.",
                "Wait and try again later, or check your quota at https://aistudio.google.com/app/apikey",
            ],
            Self::Network => &["Check your internet connection and try again."],
            Self::Unknown => &["An unexpected error occurred while generating the summary."],
        }
    }
}

impl fmt::Display for ClassificationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which step of saving an artifact failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceCause {
    Directory,
    Write,
}

impl fmt::Display for PersistenceCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceCause::Directory => f.write_str("create directory"),
            PersistenceCause::Write => f.write_str("write summary file"),
        }
    }
}

impl TriageError {
    /// Build a classification error, deriving the kind from the message text
    pub fn classification(message: impl Into<String>) -> Self {
        let message = message.into();
        TriageError::ClassificationError {
            kind: ClassificationErrorKind::from_message(&message),
            message,
        }
    }

    /// Remediation lines for the command-line front end
    pub fn hint(&self) -> Vec<&'static str> {
        match self {
            TriageError::AuthError(_) => vec![
                "Make sure credentials.json is valid (Google Cloud Console > APIs & Services > Credentials,",
                "OAuth client of type Desktop app) or set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET.",
                "Try running: gmail-triage auth --force",
            ],
            TriageError::FetchError(_) => vec![
                "Possible causes: network connection issues, invalid or expired credentials,",
                "or an exceeded Gmail API quota.",
            ],
            TriageError::ConfigError(_) => vec![
                "Check your configuration file and .env for errors.",
                "GEMINI_API_KEY must be set; run: gmail-triage init-config --force for defaults",
            ],
            TriageError::ClassificationError { kind, .. } => kind.remediation().to_vec(),
            TriageError::PersistenceError { .. } => vec![
                "Possible causes: insufficient permissions, invalid path, or a full disk.",
            ],
            _ => vec![],
        }
    }
}

impl From<google_gmail1::Error> for TriageError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                let status_code = status.as_u16();
                let message = format!(
                    "HTTP {}: {}",
                    status_code,
                    status.canonical_reason().unwrap_or("Unknown")
                );

                match status_code {
                    429 => TriageError::RateLimitExceeded(message),
                    404 => TriageError::MessageNotFound("Resource not found".to_string()),
                    401 | 403 => TriageError::Forbidden(message),
                    500..=599 => TriageError::ServerError {
                        status: status_code,
                        message,
                    },
                    _ => TriageError::ApiError(message),
                }
            }
            google_gmail1::Error::BadRequest(ref err) => {
                TriageError::ApiError(format!("Bad request: {}", err))
            }
            google_gmail1::Error::HttpError(ref err) => {
                TriageError::NetworkError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => TriageError::NetworkError(err.to_string()),
            _ => TriageError::ApiError(error.to_string()),
        }
    }
}
