//! Gmail API access for the inbox fetcher

use async_trait::async_trait;
use google_gmail1::api::Message;
use google_gmail1::{common, hyper_rustls, hyper_util, Gmail};
use tracing::debug;

use crate::auth::READONLY_SCOPES;
use crate::error::{Result, TriageError};
use crate::models::{Credential, MessageHeader};

/// Headers requested in metadata lookups; bodies and attachments are never fetched
pub const METADATA_HEADERS: &[&str] = &["Subject", "From"];

/// Type alias for the TLS connector used by the Gmail hub
pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub = Gmail<HttpsConnector>;

/// Pooled HTTP client shared by every hub the provider builds
pub type HttpClient = common::Client<HttpsConnector>;

/// Inbox provider operations consumed by the fetcher
///
/// The credential is borrowed for the duration of each call and never stored.
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// List up to `max_results` most recent message ids carrying `label`
    async fn list_message_ids(
        &self,
        credential: &Credential,
        label: &str,
        max_results: u32,
    ) -> Result<Vec<String>>;

    /// Fetch the metadata headers of one message
    async fn get_message_headers(
        &self,
        credential: &Credential,
        id: &str,
    ) -> Result<Vec<MessageHeader>>;
}

/// Production provider backed by `google-gmail1`
pub struct GmailProvider {
    client: HttpClient,
    base_url: Option<String>,
}

impl GmailProvider {
    pub fn new() -> Result<Self> {
        // Use HTTP/1 for compatibility (HTTP/2 is default but HTTP/1 works better with google-gmail1)
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| TriageError::NetworkError(format!("Failed to load TLS roots: {}", e)))?
            .https_or_http()
            .enable_http1()
            .build();

        let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
            .build(connector);

        Ok(Self::with_client(client))
    }

    /// Provider reusing an existing connection pool
    pub fn with_client(client: HttpClient) -> Self {
        Self {
            client,
            base_url: None,
        }
    }

    /// Point the hub at another Gmail endpoint (must end with `/`)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Hub authorized with the credential's access token; connections come from the shared pool
    fn hub(&self, credential: &Credential) -> GmailHub {
        let mut hub = Gmail::new(self.client.clone(), credential.access_token.clone());
        if let Some(base_url) = &self.base_url {
            hub.base_url(base_url.clone());
            hub.root_url(base_url.clone());
        }
        hub
    }

    /// Email address of the authorized account
    pub async fn account_email(&self, credential: &Credential) -> Result<String> {
        let hub = self.hub(credential);
        let (_, profile) = hub
            .users()
            .get_profile("me")
            .add_scope(READONLY_SCOPES[0])
            .doit()
            .await?;

        Ok(profile.email_address.unwrap_or_default())
    }
}

#[async_trait]
impl MailProvider for GmailProvider {
    async fn list_message_ids(
        &self,
        credential: &Credential,
        label: &str,
        max_results: u32,
    ) -> Result<Vec<String>> {
        let hub = self.hub(credential);
        let (_, response) = hub
            .users()
            .messages_list("me")
            .add_label_ids(label)
            .max_results(max_results)
            .add_scope(READONLY_SCOPES[0])
            .doit()
            .await?;

        let ids: Vec<String> = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg_ref| msg_ref.id)
            .collect();

        debug!("Listed {} message ids with label {}", ids.len(), label);
        Ok(ids)
    }

    async fn get_message_headers(
        &self,
        credential: &Credential,
        id: &str,
    ) -> Result<Vec<MessageHeader>> {
        let hub = self.hub(credential);
        let mut call = hub
            .users()
            .messages_get("me", id)
            .format("metadata");

        for header in METADATA_HEADERS {
            call = call.add_metadata_headers(header);
        }

        let (_, message) = call.add_scope(READONLY_SCOPES[0]).doit().await?;
        extract_headers(message)
    }
}

/// Pull name/value pairs out of a Gmail message payload
pub fn extract_headers(message: Message) -> Result<Vec<MessageHeader>> {
    let headers = message
        .payload
        .and_then(|payload| payload.headers)
        .ok_or_else(|| TriageError::InvalidMessageFormat("Missing headers".to_string()))?;

    Ok(headers
        .into_iter()
        .filter_map(|header| match (header.name, header.value) {
            (Some(name), value) => Some(MessageHeader::new(name, value.unwrap_or_default())),
            (None, _) => None,
        })
        .collect())
}
