//! Instagram Basic Display: form-POST token exchange, media listing as data.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;

use crate::config::ProviderConfig;
use crate::oauth::platform::Platform;
use crate::oauth::provider::{
    expect_ok, ok_json_or_none, Credentials, Endpoints, OAuthProvider, ProviderError, TokenGrant,
};

const SCOPES: &str = "user_profile,user_media";
const MEDIA_FIELDS: &str = "id,caption,media_type,media_url,thumbnail_url,username,timestamp";

fn default_endpoints() -> Endpoints {
    Endpoints {
        authorize: "https://api.instagram.com/oauth/authorize".to_string(),
        token: "https://api.instagram.com/oauth/access_token".to_string(),
        api: "https://graph.instagram.com".to_string(),
    }
}

pub struct InstagramProvider {
    client: Client,
    credentials: Credentials,
    endpoints: Endpoints,
}

impl InstagramProvider {
    pub fn new(client: Client, credentials: Credentials, config: &ProviderConfig) -> Self {
        Self {
            client,
            credentials,
            endpoints: Endpoints::resolve(default_endpoints(), config),
        }
    }
}

#[async_trait]
impl OAuthProvider for InstagramProvider {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn authorize_url(&self, state: &str) -> Result<String, ProviderError> {
        let url = url::Url::parse_with_params(
            &self.endpoints.authorize,
            &[
                ("client_id", self.credentials.client_id.as_str()),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
                ("scope", SCOPES),
                ("response_type", "code"),
                ("state", state),
            ],
        )?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError> {
        let response = self
            .client
            .post(&self.endpoints.token)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                (
                    "client_secret",
                    self.credentials.client_secret.expose_secret(),
                ),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
                ("code", code),
            ])
            .send()
            .await?;
        expect_ok(response).await
    }

    async fn fetch_data(&self, token: &str) -> Result<Option<serde_json::Value>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/me/media", self.endpoints.api))
            .query(&[("fields", MEDIA_FIELDS), ("access_token", token)])
            .send()
            .await?;
        ok_json_or_none(response).await
    }
}
