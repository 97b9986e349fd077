use std::collections::HashMap;
use std::time::{Duration, Instant};

use subtle::ConstantTimeEq;

use crate::oauth::platform::Platform;

const STATE_TTL_SECS: u64 = 300; // 5 minutes

#[derive(Debug, Clone)]
struct PendingState {
    token: String,
    expires_at: Instant,
}

/// Anti-forgery tokens for in-flight OAuth authorizations, keyed by
/// (session, platform). Each token is consumed by its first callback.
pub struct OAuthStateStore {
    pending: HashMap<(String, Platform), PendingState>,
}

impl OAuthStateStore {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }

    /// Issue a fresh token, replacing any earlier one for the same key.
    pub fn issue(&mut self, session: &str, platform: Platform) -> String {
        self.clear_stale();
        let token = generate_state_token();
        self.pending.insert(
            (session.to_string(), platform),
            PendingState {
                token: token.clone(),
                expires_at: Instant::now() + Duration::from_secs(STATE_TTL_SECS),
            },
        );
        token
    }

    /// Remove and return the pending token, if it has not expired.
    pub fn take(&mut self, session: &str, platform: Platform) -> Option<String> {
        self.clear_stale();
        let pending = self.pending.remove(&(session.to_string(), platform))?;
        if Instant::now() >= pending.expires_at {
            None
        } else {
            Some(pending.token)
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn clear_stale(&mut self) {
        let now = Instant::now();
        self.pending.retain(|_, pending| now < pending.expires_at);
    }
}

impl Default for OAuthStateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Constant-time comparison of a callback `state` against the stored token.
pub fn states_match(received: &str, stored: &str) -> bool {
    received.as_bytes().ct_eq(stored.as_bytes()).into()
}

fn generate_state_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_64_hex_chars() {
        let mut store = OAuthStateStore::new();
        let token = store.issue("session-1", Platform::Instagram);
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn token_is_single_use() {
        let mut store = OAuthStateStore::new();
        let token = store.issue("session-1", Platform::Instagram);

        assert_eq!(store.take("session-1", Platform::Instagram), Some(token));
        assert_eq!(store.take("session-1", Platform::Instagram), None);
    }

    #[test]
    fn tokens_are_scoped_by_session_and_platform() {
        let mut store = OAuthStateStore::new();
        store.issue("session-1", Platform::Instagram);

        assert_eq!(store.take("session-2", Platform::Instagram), None);
        assert_eq!(store.take("session-1", Platform::Facebook), None);
        assert!(store.take("session-1", Platform::Instagram).is_some());
    }

    #[test]
    fn reissuing_replaces_the_previous_token() {
        let mut store = OAuthStateStore::new();
        let first = store.issue("s", Platform::Facebook);
        let second = store.issue("s", Platform::Facebook);
        assert_ne!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.take("s", Platform::Facebook), Some(second));
    }

    #[test]
    fn expired_tokens_are_dropped() {
        let mut store = OAuthStateStore::new();
        store.issue("s", Platform::Instagram);

        for pending in store.pending.values_mut() {
            pending.expires_at = Instant::now() - Duration::from_secs(1);
        }

        assert_eq!(store.take("s", Platform::Instagram), None);
        assert!(store.is_empty());
    }

    #[test]
    fn state_comparison() {
        assert!(states_match("abc", "abc"));
        assert!(!states_match("abc", "abd"));
        assert!(!states_match("abc", "abcd"));
        assert!(!states_match("", "abc"));
    }
}
