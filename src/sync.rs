//! Refresh of cached LinkedAccount data.
//!
//! A profile view refreshes the target's accounts before rendering unless
//! `[sync].on_profile_view` is off. The cache can also be refreshed on
//! demand (`POST /sync`) or by the optional background scheduler. Each account gets
//! one authenticated read: a 200 overwrites the blob and stamps `last_sync`,
//! anything else leaves the cache as it was.

use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::db::models::LinkedAccount;
use crate::error::AppResult;
use crate::oauth::accounts;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Refreshed,
    Unchanged,
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub refreshed: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

impl SyncReport {
    fn record(&mut self, status: SyncStatus) {
        match status {
            SyncStatus::Refreshed => self.refreshed += 1,
            SyncStatus::Unchanged => self.unchanged += 1,
            SyncStatus::Skipped => self.skipped += 1,
        }
    }
}

/// Refresh one account. Platforms without a provider, and accounts without
/// a token, are skipped. Transport errors are logged and leave the cache alone.
pub async fn refresh_account(state: &AppState, account: &LinkedAccount) -> AppResult<SyncStatus> {
    let Some(token) = account.token.as_deref() else {
        return Ok(SyncStatus::Skipped);
    };
    let provider = match state.providers.get(account.platform) {
        Ok(provider) => provider,
        Err(e) => {
            debug!(platform = %account.platform, "skipping sync: {}", e);
            return Ok(SyncStatus::Skipped);
        }
    };

    match provider.fetch_data(token).await {
        Ok(Some(data)) => {
            let conn = state.db.get()?;
            accounts::store_sync_data(&conn, &account.id, &data)?;
            Ok(SyncStatus::Refreshed)
        }
        Ok(None) => Ok(SyncStatus::Unchanged),
        Err(e) => {
            warn!(
                platform = %account.platform,
                user_id = %account.user_id,
                "sync fetch failed: {}",
                e
            );
            Ok(SyncStatus::Unchanged)
        }
    }
}

async fn refresh_serially(state: &AppState, linked: Vec<LinkedAccount>) -> AppResult<SyncReport> {
    let mut report = SyncReport::default();
    for account in &linked {
        report.record(refresh_account(state, account).await?);
    }
    Ok(report)
}

/// Refresh every linked account of `user_id`, one platform at a time.
pub async fn refresh_user(state: &AppState, user_id: &str) -> AppResult<SyncReport> {
    let linked = {
        let conn = state.db.get()?;
        accounts::linked_accounts(&conn, user_id)?
    };
    refresh_serially(state, linked).await
}

/// Refresh every linked account in the system.
pub async fn refresh_all(state: &AppState) -> AppResult<SyncReport> {
    let linked = {
        let conn = state.db.get()?;
        accounts::all_linked(&conn)?
    };
    refresh_serially(state, linked).await
}

/// Run `refresh_all` every `period` until the runtime shuts down.
pub fn spawn_scheduler(state: AppState, period: Duration) -> JoinHandle<()> {
    info!("Starting linked-account sync every {:?}", period);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; wait a full period before the first pass.
        interval.tick().await;

        loop {
            interval.tick().await;
            match refresh_all(&state).await {
                Ok(report) => info!(
                    refreshed = report.refreshed,
                    unchanged = report.unchanged,
                    skipped = report.skipped,
                    "linked-account sync finished"
                ),
                Err(e) => error!("linked-account sync failed: {}", e),
            }
        }
    })
}
