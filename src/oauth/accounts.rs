// LinkedAccount store: one row per (user, platform), unlinked by flag.
use chrono::Utc;
use rusqlite::{params, Connection, Row};

use crate::db::models::LinkedAccount;
use crate::oauth::platform::Platform;
use crate::oauth::provider::TokenGrant;

const DEFAULT_TOKEN_TYPE: &str = "bearer";

const ACCOUNT_SELECT: &str = "SELECT id, user_id, platform, token, token_type, expires_at, \
     data, last_sync, is_linked FROM linked_accounts";

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<LinkedAccount> {
    let data: Option<String> = row.get(6)?;
    Ok(LinkedAccount {
        id: row.get(0)?,
        user_id: row.get(1)?,
        platform: row.get(2)?,
        token: row.get(3)?,
        token_type: row.get(4)?,
        expires_at: row.get(5)?,
        // A blob that no longer parses is treated as not cached.
        data: data.and_then(|raw| serde_json::from_str(&raw).ok()),
        last_sync: row.get(7)?,
        is_linked: row.get(8)?,
    })
}

/// Create the account or overwrite token, type, expiry and linked flag.
/// Cached data and last-sync time are kept across relinks.
pub fn upsert_grant(
    conn: &Connection,
    user_id: &str,
    platform: Platform,
    grant: &TokenGrant,
) -> rusqlite::Result<()> {
    // Out-of-range lifetimes are refused at exchange; store no expiry here.
    let expires_at = grant.expires_at(Utc::now()).ok().map(|at| at.to_rfc3339());
    let token_type = grant.token_type.as_deref().unwrap_or(DEFAULT_TOKEN_TYPE);

    conn.execute(
        "INSERT INTO linked_accounts (id, user_id, platform, token, token_type, expires_at, is_linked) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1) \
         ON CONFLICT(user_id, platform) DO UPDATE SET \
             token = excluded.token, \
             token_type = excluded.token_type, \
             expires_at = excluded.expires_at, \
             is_linked = 1",
        params![
            uuid::Uuid::now_v7().to_string(),
            user_id,
            platform,
            grant.access_token,
            token_type,
            expires_at
        ],
    )?;
    Ok(())
}

/// Linked accounts of `user_id`, in platform order.
pub fn linked_accounts(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<LinkedAccount>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE user_id = ?1 AND is_linked = 1 ORDER BY platform",
        ACCOUNT_SELECT
    ))?;
    let accounts = stmt
        .query_map(params![user_id], account_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(accounts)
}

/// Every account of `user_id`, linked or not.
pub fn all_accounts(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<LinkedAccount>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE user_id = ?1 ORDER BY platform",
        ACCOUNT_SELECT
    ))?;
    let accounts = stmt
        .query_map(params![user_id], account_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(accounts)
}

/// Every linked account in the system, for the background refresh.
pub fn all_linked(conn: &Connection) -> rusqlite::Result<Vec<LinkedAccount>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE is_linked = 1 ORDER BY user_id, platform",
        ACCOUNT_SELECT
    ))?;
    let accounts = stmt
        .query_map([], account_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(accounts)
}

/// Flip the linked flag. Returns false when no account exists.
pub fn set_linked(
    conn: &Connection,
    user_id: &str,
    platform: Platform,
    linked: bool,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE linked_accounts SET is_linked = ?1 WHERE user_id = ?2 AND platform = ?3",
        params![linked, user_id, platform],
    )?;
    Ok(changed > 0)
}

pub fn mark_all_linked(conn: &Connection, user_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE linked_accounts SET is_linked = 1 WHERE user_id = ?1",
        params![user_id],
    )
}

pub fn has_linked(conn: &Connection, user_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM linked_accounts WHERE user_id = ?1 AND is_linked = 1",
        params![user_id],
        |row| row.get(0),
    )
}

/// Overwrite the cached blob and stamp the sync time.
pub fn store_sync_data(
    conn: &Connection,
    account_id: &str,
    data: &serde_json::Value,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE linked_accounts SET data = ?1, last_sync = ?2 WHERE id = ?3",
        params![data.to_string(), Utc::now().to_rfc3339(), account_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn seed_user(conn: &Connection) {
        conn.execute(
            "INSERT INTO users (id, username, password_hash) VALUES ('u1', 'alice', 'x')",
            [],
        )
        .unwrap();
    }

    fn grant(token: &str) -> TokenGrant {
        TokenGrant {
            access_token: token.into(),
            token_type: None,
            expires_in: None,
            user_id: None,
        }
    }

    fn row_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM linked_accounts", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn repeated_grants_upsert_one_row() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        seed_user(&conn);

        upsert_grant(&conn, "u1", Platform::Instagram, &grant("first")).unwrap();
        upsert_grant(&conn, "u1", Platform::Instagram, &grant("second")).unwrap();

        assert_eq!(row_count(&conn), 1);
        let accounts = linked_accounts(&conn, "u1").unwrap();
        assert_eq!(accounts[0].token.as_deref(), Some("second"));
    }

    #[test]
    fn grant_defaults_type_and_expiry() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        seed_user(&conn);

        upsert_grant(&conn, "u1", Platform::Facebook, &grant("t")).unwrap();
        let account = &linked_accounts(&conn, "u1").unwrap()[0];
        assert_eq!(account.token_type.as_deref(), Some("bearer"));

        let expires = chrono::DateTime::parse_from_rfc3339(account.expires_at.as_deref().unwrap())
            .unwrap()
            .with_timezone(&Utc);
        let remaining = (expires - Utc::now()).num_seconds();
        assert!((3500..=3600).contains(&remaining));
    }

    #[test]
    fn unrepresentable_expiry_is_stored_as_unknown() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        seed_user(&conn);

        for expires_in in [10_000_000_000_000, i64::MAX] {
            let grant = TokenGrant {
                expires_in: Some(expires_in),
                ..grant("t")
            };
            upsert_grant(&conn, "u1", Platform::Instagram, &grant).unwrap();
        }
        let account = &linked_accounts(&conn, "u1").unwrap()[0];
        assert_eq!(account.token.as_deref(), Some("t"));
        assert!(account.expires_at.is_none());
    }

    #[test]
    fn unlink_then_relink_restores_flag_and_keeps_data() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        seed_user(&conn);

        upsert_grant(&conn, "u1", Platform::Instagram, &grant("t")).unwrap();
        let id = linked_accounts(&conn, "u1").unwrap()[0].id.clone();
        store_sync_data(&conn, &id, &serde_json::json!({"data": [1, 2]})).unwrap();

        assert!(set_linked(&conn, "u1", Platform::Instagram, false).unwrap());
        assert!(!has_linked(&conn, "u1").unwrap());
        assert_eq!(all_accounts(&conn, "u1").unwrap().len(), 1);

        upsert_grant(&conn, "u1", Platform::Instagram, &grant("t2")).unwrap();
        let account = &linked_accounts(&conn, "u1").unwrap()[0];
        assert!(account.is_linked);
        assert_eq!(account.data, Some(serde_json::json!({"data": [1, 2]})));
        assert!(account.last_sync.is_some());
    }

    #[test]
    fn unlinking_missing_account_reports_false() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        seed_user(&conn);

        assert!(!set_linked(&conn, "u1", Platform::Youtube, false).unwrap());
    }

    #[test]
    fn mark_all_linked_relinks_everything() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        seed_user(&conn);

        upsert_grant(&conn, "u1", Platform::Instagram, &grant("a")).unwrap();
        upsert_grant(&conn, "u1", Platform::Facebook, &grant("b")).unwrap();
        set_linked(&conn, "u1", Platform::Instagram, false).unwrap();
        set_linked(&conn, "u1", Platform::Facebook, false).unwrap();

        assert_eq!(mark_all_linked(&conn, "u1").unwrap(), 2);
        assert_eq!(linked_accounts(&conn, "u1").unwrap().len(), 2);
        assert_eq!(all_linked(&conn).unwrap().len(), 2);
    }
}
