//! Gmail notification delivery.
//!
//! Backed by the Gmail REST API with a stored OAuth2 refresh token. The
//! one-time consent flow lives behind the `auth` subcommand; after that the
//! refresh token in the token store keeps runs non-interactive.

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::Config;

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/auth";
const SEND_ENDPOINT: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";
const GMAIL_SCOPE: &str = "https://www.googleapis.com/auth/gmail.send";
const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Refresh this many seconds before the stored expiry to avoid racing it.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Gmail API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("failed to read token store: {0}")]
    TokenRead(#[from] std::io::Error),
    #[error("failed to parse token store: {0}")]
    TokenParse(#[from] serde_json::Error),
    #[error("not authorised: run `campana auth` first")]
    NotAuthorized,
    #[error("token response did not include a refresh token")]
    NoRefreshToken,
    #[error("missing OAuth client credentials ([oauth] client_id/client_secret or GMAIL_CLIENT_ID/GMAIL_CLIENT_SECRET)")]
    MissingCredentials,
}

/// Capability for delivering the consolidated notification.
#[async_trait]
pub trait Notify: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Persisted OAuth2 token set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    /// Expired, or close enough to expiry that a refresh is due.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) <= now
    }
}

/// Reads and writes the token file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the stored token set; a missing file means `auth` was never run.
    pub fn load(&self) -> Result<StoredToken, MailError> {
        if !self.path.exists() {
            return Err(MailError::NotAuthorized);
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, token: &StoredToken) -> Result<(), MailError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(token)?)?;
        Ok(())
    }
}

/// Wire shape of Google's token endpoint responses
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

/// Gmail-backed notifier.
pub struct GmailNotifier {
    client: Client,
    client_id: String,
    client_secret: String,
    to: String,
    store: TokenStore,
}

impl GmailNotifier {
    pub fn new(client_id: String, client_secret: String, to: String, token_path: PathBuf) -> Self {
        Self {
            client: Client::new(),
            client_id,
            client_secret,
            to,
            store: TokenStore::new(token_path),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, MailError> {
        let client_id = config
            .oauth
            .client_id
            .clone()
            .ok_or(MailError::MissingCredentials)?;
        let client_secret = config
            .oauth
            .client_secret
            .clone()
            .ok_or(MailError::MissingCredentials)?;

        Ok(Self::new(
            client_id,
            client_secret,
            config.mail.to.clone(),
            config.token_path(),
        ))
    }

    /// URL the user must visit to grant the gmail.send scope.
    pub fn consent_url(&self) -> String {
        let url = reqwest::Url::parse_with_params(
            AUTH_ENDPOINT,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", REDIRECT_URI),
                ("response_type", "code"),
                ("scope", GMAIL_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .unwrap();
        url.to_string()
    }

    /// Exchange a pasted authorization code and persist the resulting tokens.
    pub async fn authorize(&self, code: &str) -> Result<(), MailError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", REDIRECT_URI),
        ];

        let response = self.client.post(TOKEN_ENDPOINT).form(&params).send().await?;
        let response = check_status(response).await?;
        let token: TokenResponse = response.json().await?;

        let refresh_token = token.refresh_token.ok_or(MailError::NoRefreshToken)?;
        self.store.save(&StoredToken {
            access_token: token.access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })?;

        Ok(())
    }

    /// A valid access token, refreshed through the stored refresh token when
    /// the persisted one has expired.
    async fn access_token(&self) -> Result<String, MailError> {
        let token = self.store.load()?;
        if !token.needs_refresh(Utc::now()) {
            return Ok(token.access_token);
        }

        let refreshed = self.refresh(&token.refresh_token).await?;
        self.store.save(&refreshed)?;
        Ok(refreshed.access_token)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<StoredToken, MailError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self.client.post(TOKEN_ENDPOINT).form(&params).send().await?;
        let response = check_status(response).await?;
        let token: TokenResponse = response.json().await?;

        // Google omits the refresh token on refresh grants; keep the old one.
        Ok(StoredToken {
            access_token: token.access_token,
            refresh_token: token
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }
}

#[async_trait]
impl Notify for GmailNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<(), MailError> {
        let access_token = self.access_token().await?;
        let raw = URL_SAFE.encode(build_mime(&self.to, subject, body));

        let response = self
            .client
            .post(SEND_ENDPOINT)
            .bearer_auth(access_token)
            .json(&json!({ "raw": raw }))
            .send()
            .await?;
        check_status(response).await?;

        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, MailError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(MailError::Api {
        status: status.as_u16(),
        message,
    })
}

/// RFC 2822 message with the subject in a UTF-8 encoded word, which the Gmail
/// API expects for non-ASCII headers.
fn build_mime(to: &str, subject: &str, body: &str) -> String {
    let encoded_subject = STANDARD.encode(subject.as_bytes());
    format!(
        "To: {to}\r\n\
         Subject: =?utf-8?B?{encoded_subject}?=\r\n\
         Content-Type: text/plain; charset=\"UTF-8\"\r\n\
         Content-Transfer-Encoding: 8bit\r\n\
         \r\n\
         {body}"
    )
}
