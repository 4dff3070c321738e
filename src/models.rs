use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Subject used when the header is missing or empty
pub const DEFAULT_SUBJECT: &str = "No Subject";

/// Sender used when the header is missing or empty
pub const DEFAULT_SENDER: &str = "Unknown Sender";

/// Google's OAuth2 token endpoint
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are treated as expired
const EXPIRY_SKEW_SECS: i64 = 60;

/// OAuth client the credential was issued to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// Access credential for the inbox provider
///
/// Serializes to the same shape as Google's authorized-user `token.json`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "token")]
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub client: ClientIdentity,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Usability of a credential at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Usable immediately
    Valid,
    /// Expired, but carries a refresh token
    Refreshable,
    /// Neither valid nor refreshable; equivalent to absent
    Unusable,
}

impl Credential {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now + Duration::seconds(EXPIRY_SKEW_SECS) >= expiry,
            None => false,
        }
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> CredentialState {
        let has_refresh = self
            .refresh_token
            .as_deref()
            .is_some_and(|token| !token.is_empty());

        if !self.access_token.is_empty() && !self.is_expired_at(now) {
            CredentialState::Valid
        } else if has_refresh {
            CredentialState::Refreshable
        } else {
            CredentialState::Unusable
        }
    }

    pub fn state(&self) -> CredentialState {
        self.state_at(Utc::now())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[redacted]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[redacted]"),
            )
            .field("expiry", &self.expiry)
            .field("client_id", &self.client.client_id)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// A raw header as returned by the inbox provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

impl MessageHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Normalized metadata of one message: only subject and sender are read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailRecord {
    subject: String,
    sender: String,
}

impl EmailRecord {
    /// Build a record, substituting defaults for empty values
    pub fn new(subject: impl Into<String>, sender: impl Into<String>) -> Self {
        let subject = subject.into();
        let sender = sender.into();
        Self {
            subject: if subject.is_empty() {
                DEFAULT_SUBJECT.to_string()
            } else {
                subject
            },
            sender: if sender.is_empty() {
                DEFAULT_SENDER.to_string()
            } else {
                sender
            },
        }
    }

    /// Extract `Subject` and `From` (case-insensitive); the last occurrence wins
    pub fn from_headers(headers: &[MessageHeader]) -> Self {
        let mut subject = String::new();
        let mut sender = String::new();

        for header in headers {
            match header.name.to_lowercase().as_str() {
                "subject" => subject = header.value.clone(),
                "from" => sender = header.value.clone(),
                _ => {}
            }
        }

        Self::new(subject, sender)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }
}

/// Records produced by one fetch, in inbox listing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailBatch {
    records: Vec<EmailRecord>,
    skipped_ids: Vec<String>,
}

impl EmailBatch {
    pub fn new(records: Vec<EmailRecord>, skipped_ids: Vec<String>) -> Self {
        Self {
            records,
            skipped_ids,
        }
    }

    pub fn records(&self) -> &[EmailRecord] {
        &self.records
    }

    /// Ids of messages whose metadata lookup failed
    pub fn skipped_ids(&self) -> &[String] {
        &self.skipped_ids
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<EmailRecord>> for EmailBatch {
    fn from(records: Vec<EmailRecord>) -> Self {
        Self::new(records, Vec::new())
    }
}

/// Where the summary text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryOrigin {
    /// Text returned by the model, possibly with a format warning
    Model,
    /// Model returned nothing; synthesized from the batch
    Fallback,
    /// Nothing to classify
    EmptyBatch,
}

/// Output of the priority classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub text: String,
    /// True when all three priority section labels are present
    pub well_formed: bool,
    pub origin: SummaryOrigin,
}

/// A persisted summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryArtifact {
    pub identifier: String,
    pub content: String,
    pub path: PathBuf,
}

/// Listing entry for a persisted summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDescriptor {
    pub filename: String,
    pub identifier: String,
    pub path: PathBuf,
}
