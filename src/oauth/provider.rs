// Provider seam: each linkable platform implements the authorization-code
// grant and one authenticated data read behind `OAuthProvider`.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use crate::config::{OAuthConfig, ProviderConfig, SyncConfig};
use crate::oauth::facebook::FacebookProvider;
use crate::oauth::instagram::InstagramProvider;
use crate::oauth::platform::Platform;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider answered with status {0}")]
    Status(u16),

    #[error("{0} is not configured")]
    NotConfigured(Platform),

    #[error("{0} has no OAuth provider")]
    Unsupported(Platform),

    #[error("invalid provider URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Token endpoint payload. Only `access_token` is required.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
}

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

impl TokenGrant {
    /// Absolute expiry measured from `now`. Lifetimes chrono cannot
    /// represent are an invalid response, not a panic.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ProviderError> {
        let secs = self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        chrono::Duration::try_seconds(secs)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                ProviderError::InvalidResponse(format!("expires_in out of range: {}", secs))
            })
    }
}

/// Client credentials resolved from `[oauth.<platform>]`.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
}

impl Credentials {
    /// `None` unless id, secret and redirect URI are all present.
    pub fn from_config(config: &ProviderConfig) -> Option<Self> {
        Some(Self {
            client_id: config.client_id.clone()?,
            client_secret: config.client_secret.clone()?,
            redirect_uri: config.redirect_uri.clone()?,
        })
    }
}

/// Authorize, token and data endpoints of one provider.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub authorize: String,
    pub token: String,
    pub api: String,
}

impl Endpoints {
    /// Start from `defaults`, replacing whatever the config overrides.
    pub fn resolve(defaults: Endpoints, config: &ProviderConfig) -> Self {
        Self {
            authorize: config.authorize_url.clone().unwrap_or(defaults.authorize),
            token: config.token_url.clone().unwrap_or(defaults.token),
            api: config
                .api_url
                .clone()
                .unwrap_or(defaults.api)
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn platform(&self) -> Platform;

    /// Consent URL carrying `state` as the anti-forgery token.
    fn authorize_url(&self, state: &str) -> Result<String, ProviderError>;

    /// Trade an authorization code for an access token. Any non-200 answer
    /// is an error.
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError>;

    /// One authenticated read of the platform's data endpoint.
    /// `Ok(None)` when the platform answers with anything but 200.
    async fn fetch_data(&self, token: &str) -> Result<Option<serde_json::Value>, ProviderError>;
}

pub type DynProvider = Arc<dyn OAuthProvider>;

/// Platform -> provider lookup shared through `AppState`.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Platform, DynProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for every platform with complete credentials.
    pub fn from_config(oauth: &OAuthConfig, sync: &SyncConfig) -> Result<Self, ProviderError> {
        let client = http_client(sync)?;
        let mut registry = Self::new();

        match Credentials::from_config(&oauth.instagram) {
            Some(credentials) => {
                registry = registry.with_provider(Arc::new(InstagramProvider::new(
                    client.clone(),
                    credentials,
                    &oauth.instagram,
                )));
            }
            None => tracing::info!("Instagram linking disabled: credentials not configured"),
        }

        match Credentials::from_config(&oauth.facebook) {
            Some(credentials) => {
                registry = registry.with_provider(Arc::new(FacebookProvider::new(
                    client,
                    credentials,
                    &oauth.facebook,
                )));
            }
            None => tracing::info!("Facebook linking disabled: credentials not configured"),
        }

        Ok(registry)
    }

    pub fn with_provider(mut self, provider: DynProvider) -> Self {
        self.providers.insert(provider.platform(), provider);
        self
    }

    pub fn get(&self, platform: Platform) -> Result<DynProvider, ProviderError> {
        if let Some(provider) = self.providers.get(&platform) {
            return Ok(provider.clone());
        }
        match platform {
            Platform::Instagram | Platform::Facebook => Err(ProviderError::NotConfigured(platform)),
            other => Err(ProviderError::Unsupported(other)),
        }
    }
}

/// Shared HTTP client with the configured request timeout.
pub fn http_client(sync: &SyncConfig) -> Result<reqwest::Client, ProviderError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(sync.timeout_secs))
        .user_agent(concat!("slid/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Decode a 200 response as `T`, mapping other statuses to `Status`.
pub(crate) async fn expect_ok<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(ProviderError::Status(status.as_u16()));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// Body of a 200 data response, `None` for any other status.
pub(crate) async fn ok_json_or_none(
    response: reqwest::Response,
) -> Result<Option<serde_json::Value>, ProviderError> {
    let status = response.status();
    if status != reqwest::StatusCode::OK {
        tracing::debug!("data endpoint answered {}", status);
        return Ok(None);
    }
    let value = response
        .json()
        .await
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> ProviderConfig {
        ProviderConfig {
            client_id: Some("id".into()),
            client_secret: Some(SecretString::from("secret")),
            redirect_uri: Some("http://localhost/cb".into()),
            ..Default::default()
        }
    }

    #[test]
    fn credentials_need_every_field() {
        assert!(Credentials::from_config(&configured()).is_some());
        let mut partial = configured();
        partial.client_secret = None;
        assert!(Credentials::from_config(&partial).is_none());
    }

    #[test]
    fn endpoint_overrides_win() {
        let defaults = Endpoints {
            authorize: "https://a".into(),
            token: "https://t".into(),
            api: "https://api".into(),
        };
        let mut config = configured();
        config.api_url = Some("http://127.0.0.1:9000/".into());
        let endpoints = Endpoints::resolve(defaults, &config);
        assert_eq!(endpoints.authorize, "https://a");
        assert_eq!(endpoints.api, "http://127.0.0.1:9000");
    }

    #[test]
    fn registry_only_holds_configured_providers() {
        let oauth = OAuthConfig {
            instagram: configured(),
            facebook: ProviderConfig::default(),
        };
        let registry = ProviderRegistry::from_config(&oauth, &SyncConfig::default()).unwrap();

        assert_eq!(
            registry.get(Platform::Instagram).unwrap().platform(),
            Platform::Instagram
        );
        assert!(matches!(
            registry.get(Platform::Facebook),
            Err(ProviderError::NotConfigured(Platform::Facebook))
        ));
        assert!(matches!(
            registry.get(Platform::Tiktok),
            Err(ProviderError::Unsupported(Platform::Tiktok))
        ));
    }

    #[test]
    fn token_grant_tolerates_missing_fields() {
        let grant: TokenGrant =
            serde_json::from_str(r#"{"access_token":"abc","user_id":17841400}"#).unwrap();
        assert_eq!(grant.access_token, "abc");
        assert!(grant.token_type.is_none());
        assert!(grant.expires_in.is_none());
        assert!(grant.user_id.is_some());
    }

    #[test]
    fn oversized_lifetime_is_an_invalid_response() {
        let now = Utc::now();
        for expires_in in [10_000_000_000_000, i64::MAX, i64::MIN] {
            let grant = TokenGrant {
                access_token: "t".into(),
                token_type: None,
                expires_in: Some(expires_in),
                user_id: None,
            };
            assert!(matches!(
                grant.expires_at(now),
                Err(ProviderError::InvalidResponse(_))
            ));
        }

        let grant: TokenGrant =
            serde_json::from_str(r#"{"access_token":"t","expires_in":60}"#).unwrap();
        assert_eq!((grant.expires_at(now).unwrap() - now).num_seconds(), 60);
    }
}
