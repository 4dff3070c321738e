//! Common test utilities and fixtures

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use gmail_triage::auth::{Authorizer, TokenRefresher};
use gmail_triage::client::MailProvider;
use gmail_triage::error::Result;
use gmail_triage::gemini::GenerativeModel;
use gmail_triage::models::{ClientIdentity, Credential, MessageHeader, GOOGLE_TOKEN_URI};
use mockall::mock;

/// Fixed clock used by credential lifecycle tests
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Create a credential issued to a test client
pub fn create_credential(access_token: &str, expiry: Option<DateTime<Utc>>, refresh_token: Option<&str>) -> Credential {
    Credential {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.map(str::to_string),
        expiry,
        client: ClientIdentity {
            client_id: "test-client.apps.googleusercontent.com".to_string(),
            client_secret: "test-secret".to_string(),
            token_uri: GOOGLE_TOKEN_URI.to_string(),
        },
        scopes: vec!["https://www.googleapis.com/auth/gmail.readonly".to_string()],
    }
}

/// Credential valid for another hour at [`test_now`]
pub fn valid_credential() -> Credential {
    create_credential("valid-token", Some(test_now() + Duration::hours(1)), Some("1//refresh"))
}

/// Credential that expired ten minutes before [`test_now`] but can be refreshed
pub fn expired_credential() -> Credential {
    create_credential("stale-token", Some(test_now() - Duration::minutes(10)), Some("1//refresh"))
}

/// Headers as Gmail returns them for a metadata lookup
pub fn create_headers(subject: &str, from: &str) -> Vec<MessageHeader> {
    vec![
        MessageHeader::new("Subject", subject),
        MessageHeader::new("From", from),
    ]
}

/// Model answer containing all three sections
pub fn well_formed_summary(high: &[(&str, &str)], low: &[(&str, &str)]) -> String {
    let bullets = |items: &[(&str, &str)]| {
        if items.is_empty() {
            "None".to_string()
        } else {
            items
                .iter()
                .map(|(subject, sender)| format!("• {} - From: {}", subject, sender))
                .collect::<Vec<_>>()
                .join("\n")
        }
    };

    format!(
        "High Priority:\n{}\n\nMedium Priority:\nNone\n\nLow Priority:\n{}",
        bullets(high),
        bullets(low)
    )
}

// Mock implementation of MailProvider for testing
mock! {
    pub MailProvider {}

    #[async_trait::async_trait]
    impl MailProvider for MailProvider {
        async fn list_message_ids(&self, credential: &Credential, label: &str, max_results: u32) -> Result<Vec<String>>;
        async fn get_message_headers(&self, credential: &Credential, id: &str) -> Result<Vec<MessageHeader>>;
    }
}

mock! {
    pub GenerativeModel {}

    #[async_trait::async_trait]
    impl GenerativeModel for GenerativeModel {
        async fn generate(&self, api_key: &str, model: &str, prompt: &str) -> Result<String>;
    }
}

mock! {
    pub TokenRefresher {}

    #[async_trait::async_trait]
    impl TokenRefresher for TokenRefresher {
        async fn refresh(&self, credential: &Credential) -> Result<Credential>;
    }
}

mock! {
    pub Authorizer {}

    #[async_trait::async_trait]
    impl Authorizer for Authorizer {
        async fn authorize(&self) -> Result<Credential>;
    }
}
