// Authorization-code linking: issue state, verify it on callback, exchange
// the code and upsert the account.
use chrono::Utc;

use crate::error::AppResult;
use crate::notice::Notice;
use crate::oauth::accounts;
use crate::oauth::platform::Platform;
use crate::oauth::provider::ProviderError;
use crate::oauth::state_store::states_match;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Token exchanged and account stored.
    Linked,
    /// Missing code, or `state` absent, expired or mismatched. Nothing stored.
    Rejected,
    /// Provider unavailable or exchange failed. Nothing stored.
    Failed(String),
}

impl CallbackOutcome {
    pub fn notice(&self, platform: Platform) -> Notice {
        match self {
            Self::Linked => Notice::success(format!(
                "{} account connected successfully",
                platform.display_name()
            )),
            Self::Rejected => Notice::error("Invalid authorization request"),
            Self::Failed(reason) => Notice::error(format!(
                "Failed to connect {} account: {}",
                platform.display_name(),
                reason
            )),
        }
    }
}

/// Issue a fresh anti-forgery token for `session` and build the consent URL.
pub async fn authorize(
    state: &AppState,
    session: &str,
    platform: Platform,
) -> Result<String, ProviderError> {
    let provider = state.providers.get(platform)?;
    let token = state.oauth_states.lock().await.issue(session, platform);
    provider.authorize_url(&token)
}

/// Handle the provider callback for `user_id`. The stored token is consumed
/// whatever the outcome.
pub async fn complete(
    state: &AppState,
    user_id: &str,
    session: &str,
    platform: Platform,
    code: Option<&str>,
    received_state: Option<&str>,
) -> AppResult<CallbackOutcome> {
    let stored = state.oauth_states.lock().await.take(session, platform);

    let code = match (code, received_state, stored) {
        (Some(code), Some(received), Some(stored))
            if !code.is_empty() && states_match(received, &stored) =>
        {
            code
        }
        _ => {
            tracing::warn!(platform = %platform, user_id, "rejected OAuth callback");
            return Ok(CallbackOutcome::Rejected);
        }
    };

    let provider = match state.providers.get(platform) {
        Ok(provider) => provider,
        Err(e) => return Ok(CallbackOutcome::Failed(e.to_string())),
    };

    let exchanged = provider
        .exchange_code(code)
        .await
        .and_then(|grant| grant.expires_at(Utc::now()).map(|_| grant));
    let grant = match exchanged {
        Ok(grant) => grant,
        Err(e) => {
            tracing::warn!(platform = %platform, user_id, "token exchange failed: {}", e);
            return Ok(CallbackOutcome::Failed(e.to_string()));
        }
    };

    let conn = state.db.get()?;
    accounts::upsert_grant(&conn, user_id, platform, &grant)?;
    tracing::info!(platform = %platform, user_id, "linked account");

    Ok(CallbackOutcome::Linked)
}
