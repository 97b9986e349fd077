//! Third-party account linking.
//!
//! `linker` drives the authorization-code flow against the providers in
//! `ProviderRegistry`; `accounts` persists the resulting LinkedAccount rows.
//! Cached provider data is refreshed separately by `crate::sync`.

pub mod accounts;
pub mod facebook;
pub mod instagram;
pub mod linker;
pub mod platform;
pub mod provider;
pub mod state_store;

pub use linker::CallbackOutcome;
pub use platform::Platform;
pub use provider::{DynProvider, OAuthProvider, ProviderError, ProviderRegistry, TokenGrant};
pub use state_store::OAuthStateStore;
