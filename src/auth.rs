//! Credential lifecycle for the Gmail API: load, refresh, authorize, persist

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use yup_oauth2::authorized_user::AuthorizedUserSecret;
use yup_oauth2::storage::{TokenInfo, TokenStorage, TokenStorageError};
use yup_oauth2::ApplicationSecret;

use crate::error::{Result, TriageError};
use crate::models::{ClientIdentity, Credential, CredentialState, GOOGLE_TOKEN_URI};

/// Read-only access; messages are only listed and their headers read
pub const READONLY_SCOPES: &[&str] = &["https://www.googleapis.com/auth/gmail.readonly"];

/// Exchanges a refresh token for a new access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, credential: &Credential) -> Result<Credential>;
}

/// Interactive authorization producing a fresh credential
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self) -> Result<Credential>;
}

/// JSON file holding the last issued credential
#[derive(Debug, Clone)]
pub struct CredentialCache {
    path: PathBuf,
}

impl CredentialCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached credential. Any failure is treated as an empty cache.
    pub async fn load(&self) -> Option<Credential> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No credential cache at {:?}", self.path);
                return None;
            }
            Err(e) => {
                warn!("Could not read credential cache {:?}: {}", self.path, e);
                return None;
            }
        };

        match serde_json::from_str::<Credential>(&content) {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!("Ignoring corrupt credential cache {:?}: {}", self.path, e);
                None
            }
        }
    }

    pub async fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(credential)?;
        tokio::fs::write(&self.path, json).await?;
        secure_token_file(&self.path).await?;
        debug!("Saved credential to {:?}", self.path);
        Ok(())
    }

    /// Delete the cache file; a missing file is not an error
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("Removed credential cache {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Owns the credential lifecycle
///
/// `obtain` never fails because of the cache or a refresh; only the interactive
/// authorization can end the lifecycle with `AuthError`.
pub struct CredentialBroker {
    cache: CredentialCache,
    refresher: Box<dyn TokenRefresher>,
    authorizer: Box<dyn Authorizer>,
}

impl CredentialBroker {
    pub fn new(
        cache: CredentialCache,
        refresher: Box<dyn TokenRefresher>,
        authorizer: Box<dyn Authorizer>,
    ) -> Self {
        Self {
            cache,
            refresher,
            authorizer,
        }
    }

    /// Broker backed by Google's OAuth2 endpoints
    pub fn google(credentials_path: impl Into<PathBuf>, token_cache_path: impl Into<PathBuf>) -> Self {
        Self::new(
            CredentialCache::new(token_cache_path),
            Box::new(OAuthRefresher::new(READONLY_SCOPES)),
            Box::new(InstalledFlowAuthorizer::new(credentials_path, READONLY_SCOPES)),
        )
    }

    pub fn cache(&self) -> &CredentialCache {
        &self.cache
    }

    pub async fn obtain(&self) -> Result<Credential> {
        self.obtain_at(Utc::now()).await
    }

    /// Run the lifecycle as of `now`
    pub async fn obtain_at(&self, now: DateTime<Utc>) -> Result<Credential> {
        let mut usable = None;

        if let Some(cached) = self.cache.load().await {
            match cached.state_at(now) {
                CredentialState::Valid => {
                    debug!("Using cached credential");
                    return Ok(cached);
                }
                CredentialState::Refreshable => {
                    info!("Refreshing expired token...");
                    match self.refresher.refresh(&cached).await {
                        Ok(refreshed) => usable = Some(refreshed),
                        Err(e) => warn!("Token refresh failed, re-authenticating: {}", e),
                    }
                }
                CredentialState::Unusable => {
                    debug!("Cached credential is expired and cannot be refreshed");
                }
            }
        }

        let credential = match usable {
            Some(credential) => credential,
            None => {
                info!("Starting OAuth authorization flow...");
                let credential = self.authorizer.authorize().await?;
                info!("Authorization successful");
                credential
            }
        };

        if let Err(e) = self.cache.save(&credential).await {
            warn!(
                "Could not save credential to {:?}: {}",
                self.cache.path(),
                e
            );
        }

        Ok(credential)
    }

    /// Drop the cached credential so the next `obtain` re-authorizes
    pub async fn forget(&self) -> Result<()> {
        self.cache.clear().await
    }
}

fn scope_refs(scopes: &[String]) -> Vec<&str> {
    scopes.iter().map(String::as_str).collect()
}

/// Expiry of an issued token as a chrono timestamp
fn token_expiry(token: &yup_oauth2::AccessToken) -> Option<DateTime<Utc>> {
    token
        .expiration_time()
        .and_then(|at| DateTime::from_timestamp(at.unix_timestamp(), at.nanosecond()))
}

/// Refresh-token grant via yup-oauth2's authorized-user flow
pub struct OAuthRefresher {
    scopes: Vec<String>,
}

impl OAuthRefresher {
    pub fn new(scopes: &[&str]) -> Self {
        Self {
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl TokenRefresher for OAuthRefresher {
    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .clone()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| TriageError::AuthError("Credential has no refresh token".to_string()))?;

        let secret = AuthorizedUserSecret {
            client_id: credential.client.client_id.clone(),
            client_secret: credential.client.client_secret.clone(),
            refresh_token,
            key_type: "authorized_user".to_string(),
        };

        let auth = yup_oauth2::AuthorizedUserAuthenticator::builder(secret)
            .build()
            .await
            .map_err(|e| TriageError::AuthError(format!("Failed to build refresher: {}", e)))?;

        let scopes = if credential.scopes.is_empty() {
            self.scopes.clone()
        } else {
            credential.scopes.clone()
        };

        let token = auth
            .token(&scope_refs(&scopes))
            .await
            .map_err(|e| TriageError::AuthError(format!("Failed to refresh token: {}", e)))?;

        let access_token = token
            .token()
            .ok_or_else(|| TriageError::AuthError("Refresh returned no access token".to_string()))?
            .to_string();

        Ok(Credential {
            access_token,
            expiry: token_expiry(&token),
            scopes,
            ..credential.clone()
        })
    }
}

/// In-memory token storage that keeps whatever the flow issued,
/// so the refresh token can be read back after authorization.
#[derive(Clone, Default)]
struct CapturedToken(Arc<Mutex<Option<TokenInfo>>>);

impl CapturedToken {
    fn take(&self) -> Option<TokenInfo> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

#[async_trait]
impl TokenStorage for CapturedToken {
    async fn set(
        &self,
        _scopes: &[&str],
        token: TokenInfo,
    ) -> std::result::Result<(), TokenStorageError> {
        let mut slot = self
            .0
            .lock()
            .map_err(|_| TokenStorageError::Other("token storage poisoned".into()))?;
        *slot = Some(token);
        Ok(())
    }

    async fn get(&self, _scopes: &[&str]) -> Option<TokenInfo> {
        self.0.lock().ok().and_then(|slot| slot.clone())
    }
}

/// Desktop-app OAuth2 flow: opens the consent page and listens on a local redirect
pub struct InstalledFlowAuthorizer {
    credentials_path: PathBuf,
    scopes: Vec<String>,
}

impl InstalledFlowAuthorizer {
    pub fn new(credentials_path: impl Into<PathBuf>, scopes: &[&str]) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl Authorizer for InstalledFlowAuthorizer {
    async fn authorize(&self) -> Result<Credential> {
        let secret = load_application_secret(&self.credentials_path).await?;
        let captured = CapturedToken::default();

        let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
            secret.clone(),
            yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        )
        .with_storage(Box::new(captured.clone()))
        .build()
        .await
        .map_err(|e| TriageError::AuthError(format!("Failed to build authenticator: {}", e)))?;

        let token = auth
            .token(&scope_refs(&self.scopes))
            .await
            .map_err(|e| TriageError::AuthError(format!("Failed to obtain token: {}", e)))?;

        let access_token = token
            .token()
            .ok_or_else(|| TriageError::AuthError("Authorization returned no access token".to_string()))?
            .to_string();

        let refresh_token = captured.take().and_then(|info| info.refresh_token);
        if refresh_token.is_none() {
            warn!("Authorization did not return a refresh token; you will be asked again when it expires");
        }

        Ok(Credential {
            access_token,
            refresh_token,
            expiry: token_expiry(&token),
            client: identity_from_secret(&secret),
            scopes: self.scopes.clone(),
        })
    }
}

fn identity_from_secret(secret: &ApplicationSecret) -> ClientIdentity {
    ClientIdentity {
        client_id: secret.client_id.clone(),
        client_secret: secret.client_secret.clone(),
        token_uri: if secret.token_uri.is_empty() {
            GOOGLE_TOKEN_URI.to_string()
        } else {
            secret.token_uri.clone()
        },
    }
}

/// Load the application identity: the credentials file when present, else the environment
pub async fn load_application_secret(credentials_path: &Path) -> Result<ApplicationSecret> {
    if credentials_path.exists() {
        return yup_oauth2::read_application_secret(credentials_path)
            .await
            .map_err(|e| {
                TriageError::AuthError(format!(
                    "Failed to read credentials {:?}: {}",
                    credentials_path, e
                ))
            });
    }

    load_credentials_from_env().map_err(|_| {
        TriageError::AuthError(format!(
            "No application identity: {:?} not found and GOOGLE_CLIENT_ID / GOOGLE_CLIENT_SECRET are not set",
            credentials_path
        ))
    })
}

/// Load OAuth2 client identity from environment variables
///
/// # Environment Variables
/// - `GOOGLE_CLIENT_ID`: OAuth2 client ID
/// - `GOOGLE_CLIENT_SECRET`: OAuth2 client secret
/// - `GOOGLE_REDIRECT_URI`: Redirect URI (optional, defaults to http://localhost:8080)
pub fn load_credentials_from_env() -> Result<ApplicationSecret> {
    let client_id = env::var("GOOGLE_CLIENT_ID")
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| TriageError::ConfigError("GOOGLE_CLIENT_ID not set".to_string()))?;
    let client_secret = env::var("GOOGLE_CLIENT_SECRET")
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| TriageError::ConfigError("GOOGLE_CLIENT_SECRET not set".to_string()))?;
    let redirect_uri = env::var("GOOGLE_REDIRECT_URI")
        .unwrap_or_else(|_| "http://localhost:8080".to_string());

    Ok(ApplicationSecret {
        client_id,
        client_secret,
        auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
        token_uri: GOOGLE_TOKEN_URI.to_string(),
        redirect_uris: vec![redirect_uri],
        ..Default::default()
    })
}

/// Restrict the token file to its owner (0600)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

// Windows relies on the user profile ACLs
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}
