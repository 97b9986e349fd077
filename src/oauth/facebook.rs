//! Facebook Login: query-string token exchange, Graph `me` node as data.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;

use crate::config::ProviderConfig;
use crate::oauth::platform::Platform;
use crate::oauth::provider::{
    expect_ok, ok_json_or_none, Credentials, Endpoints, OAuthProvider, ProviderError, TokenGrant,
};

const SCOPES: &str = "email,public_profile,user_posts";
const PROFILE_FIELDS: &str = "name,email,birthday,photos,posts,likes,events,hometown,friends";
const GRAPH_VERSION: &str = "v12.0";

fn default_endpoints() -> Endpoints {
    Endpoints {
        authorize: format!("https://www.facebook.com/{}/dialog/oauth", GRAPH_VERSION),
        token: format!("https://graph.facebook.com/{}/oauth/access_token", GRAPH_VERSION),
        api: "https://graph.facebook.com".to_string(),
    }
}

pub struct FacebookProvider {
    client: Client,
    credentials: Credentials,
    endpoints: Endpoints,
}

impl FacebookProvider {
    pub fn new(client: Client, credentials: Credentials, config: &ProviderConfig) -> Self {
        Self {
            client,
            credentials,
            endpoints: Endpoints::resolve(default_endpoints(), config),
        }
    }
}

#[async_trait]
impl OAuthProvider for FacebookProvider {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    fn authorize_url(&self, state: &str) -> Result<String, ProviderError> {
        let url = url::Url::parse_with_params(
            &self.endpoints.authorize,
            &[
                ("client_id", self.credentials.client_id.as_str()),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
                ("scope", SCOPES),
                ("state", state),
            ],
        )?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError> {
        let response = self
            .client
            .get(&self.endpoints.token)
            .query(&[
                ("client_id", self.credentials.client_id.as_str()),
                (
                    "client_secret",
                    self.credentials.client_secret.expose_secret(),
                ),
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
            .get(format!("{}/{}/me", self.endpoints.api, GRAPH_VERSION))
            .query(&[("fields", PROFILE_FIELDS), ("access_token", token)])
            .send()
            .await?;
        ok_json_or_none(response).await
    }
}
