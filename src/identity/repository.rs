// Identity store: accounts, profiles and terms acceptance.
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::Profile;
use crate::identity::domain::{completeness_score, generate_user_code, Username};

const PROFILE_SELECT: &str = "SELECT u.id, u.username, u.email, p.full_name, p.bio, \
     p.picture_path, p.qr_code_path, p.user_code, p.verified, p.profile_score, p.created_at \
     FROM users u JOIN profiles p ON p.user_id = u.id";

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        user_id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        full_name: row.get(3)?,
        bio: row.get(4)?,
        picture_path: row.get(5)?,
        qr_code_path: row.get(6)?,
        user_code: row.get(7)?,
        verified: row.get(8)?,
        profile_score: row.get(9)?,
        created_at: row.get(10)?,
    })
}

pub struct NewIdentity<'a> {
    pub username: &'a Username,
    pub email: Option<&'a str>,
    pub password_hash: &'a str,
    pub user_code: &'a str,
    pub qr_code_path: Option<&'a str>,
}

/// Profile edits. `None` leaves a field untouched; an empty string clears it.
#[derive(Debug, Default, Clone)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub picture_path: Option<String>,
}

pub fn username_taken(conn: &Connection, username: &Username) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1",
        params![username.as_str()],
        |row| row.get(0),
    )
}

/// Draw user codes until one is not in use.
pub fn unique_user_code(conn: &Connection) -> rusqlite::Result<String> {
    loop {
        let code = generate_user_code();
        let taken: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM profiles WHERE user_code = ?1",
            params![code],
            |row| row.get(0),
        )?;
        if !taken {
            return Ok(code);
        }
    }
}

/// Insert the account and its profile together. Returns the new user id.
pub fn create_identity(conn: &Connection, new: &NewIdentity<'_>) -> rusqlite::Result<String> {
    let id = uuid::Uuid::now_v7().to_string();
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO users (id, username, email, password_hash) VALUES (?1, ?2, ?3, ?4)",
        params![id, new.username.as_str(), new.email, new.password_hash],
    )?;
    tx.execute(
        "INSERT INTO profiles (user_id, qr_code_path, user_code) VALUES (?1, ?2, ?3)",
        params![id, new.qr_code_path, new.user_code],
    )?;
    refresh_score(&tx, &id)?;

    tx.commit()?;
    Ok(id)
}

/// `(user_id, password_hash)` for sign-in.
pub fn credentials(
    conn: &Connection,
    username: &Username,
) -> rusqlite::Result<Option<(String, String)>> {
    conn.query_row(
        "SELECT id, password_hash FROM users WHERE username = ?1",
        params![username.as_str()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

pub fn record_login(conn: &Connection, user_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET last_login = datetime('now') WHERE id = ?1",
        params![user_id],
    )?;
    Ok(())
}

pub fn find_profile(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<Profile>> {
    conn.query_row(
        &format!("{} WHERE u.id = ?1", PROFILE_SELECT),
        params![user_id],
        profile_from_row,
    )
    .optional()
}

pub fn find_profile_by_username(
    conn: &Connection,
    username: &str,
) -> rusqlite::Result<Option<Profile>> {
    conn.query_row(
        &format!("{} WHERE u.username = ?1", PROFILE_SELECT),
        params![username.trim().to_lowercase()],
        profile_from_row,
    )
    .optional()
}

/// Apply edits and recompute the completeness score.
pub fn update_profile(
    conn: &Connection,
    user_id: &str,
    update: &ProfileUpdate,
) -> rusqlite::Result<Option<Profile>> {
    let normalize = |value: &Option<String>| {
        value
            .as_deref()
            .map(|s| s.trim().to_string())
            .map(|s| if s.is_empty() { None } else { Some(s) })
    };

    let tx = conn.unchecked_transaction()?;
    if let Some(full_name) = normalize(&update.full_name) {
        tx.execute(
            "UPDATE profiles SET full_name = ?1 WHERE user_id = ?2",
            params![full_name, user_id],
        )?;
    }
    if let Some(bio) = normalize(&update.bio) {
        tx.execute(
            "UPDATE profiles SET bio = ?1 WHERE user_id = ?2",
            params![bio, user_id],
        )?;
    }
    if let Some(ref picture) = update.picture_path {
        tx.execute(
            "UPDATE profiles SET picture_path = ?1 WHERE user_id = ?2",
            params![picture, user_id],
        )?;
    }
    refresh_score(&tx, user_id)?;
    tx.commit()?;

    find_profile(conn, user_id)
}

pub fn set_verified(conn: &Connection, user_id: &str, verified: bool) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE profiles SET verified = ?1 WHERE user_id = ?2",
        params![verified, user_id],
    )?;
    refresh_score(conn, user_id)?;
    Ok(())
}

fn refresh_score(conn: &Connection, user_id: &str) -> rusqlite::Result<()> {
    if let Some(profile) = find_profile(conn, user_id)? {
        conn.execute(
            "UPDATE profiles SET profile_score = ?1 WHERE user_id = ?2",
            params![completeness_score(&profile), user_id],
        )?;
    }
    Ok(())
}

/// Record acceptance once; repeated calls keep the first timestamp.
pub fn accept_terms(conn: &Connection, user_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO terms_acceptances (user_id, accepted) VALUES (?1, 1)",
        params![user_id],
    )?;
    Ok(())
}

pub fn has_accepted_terms(conn: &Connection, user_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM terms_acceptances WHERE user_id = ?1 AND accepted = 1",
        params![user_id],
        |row| row.get(0),
    )
}

/// Every profile except `exclude_user_id`, optionally narrowed by a
/// case-insensitive substring over username, full name, email and user code.
pub fn search_members(
    conn: &Connection,
    exclude_user_id: &str,
    query: Option<&str>,
) -> rusqlite::Result<Vec<Profile>> {
    let pattern = query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{}%", escape_like(q)));

    let sql = format!(
        "{} WHERE u.id != ?1 AND (?2 IS NULL \
           OR u.username LIKE ?2 ESCAPE '\\' \
           OR p.full_name LIKE ?2 ESCAPE '\\' \
           OR u.email LIKE ?2 ESCAPE '\\' \
           OR p.user_code LIKE ?2 ESCAPE '\\') \
         ORDER BY u.username",
        PROFILE_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let members = stmt
        .query_map(params![exclude_user_id, pattern], profile_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(members)
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn register(conn: &Connection, name: &str, email: Option<&str>) -> String {
        let username = Username::parse(name).unwrap();
        let code = unique_user_code(conn).unwrap();
        create_identity(
            conn,
            &NewIdentity {
                username: &username,
                email,
                password_hash: "hash",
                user_code: &code,
                qr_code_path: Some("qrcodes/x_qr.svg"),
            },
        )
        .unwrap()
    }

    #[test]
    fn created_identity_has_profile_with_qr_score() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let id = register(&conn, "Alice", None);

        let profile = find_profile_by_username(&conn, "ALICE").unwrap().unwrap();
        assert_eq!(profile.user_id, id);
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.user_code.as_ref().map(String::len), Some(16));
        assert_eq!(profile.profile_score, 20);
        assert!(username_taken(&conn, &Username::parse("alice").unwrap()).unwrap());
    }

    #[test]
    fn profile_update_recomputes_score() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let id = register(&conn, "alice", None);

        let profile = update_profile(
            &conn,
            &id,
            &ProfileUpdate {
                full_name: Some("Alice Liddell".into()),
                bio: Some("Down the rabbit hole".into()),
                picture_path: None,
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Alice Liddell"));
        assert_eq!(profile.profile_score, 60);

        set_verified(&conn, &id, true).unwrap();
        let profile = update_profile(
            &conn,
            &id,
            &ProfileUpdate {
                bio: Some("  ".into()),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(profile.bio, None);
        assert_eq!(profile.full_name.as_deref(), Some("Alice Liddell"));
        assert_eq!(profile.profile_score, 60);
    }

    #[test]
    fn terms_acceptance_is_idempotent() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let id = register(&conn, "alice", None);

        assert!(!has_accepted_terms(&conn, &id).unwrap());
        accept_terms(&conn, &id).unwrap();
        accept_terms(&conn, &id).unwrap();
        assert!(has_accepted_terms(&conn, &id).unwrap());

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM terms_acceptances", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn member_search_excludes_caller_and_matches_fields() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let alice = register(&conn, "alice", Some("alice@example.com"));
        let bob = register(&conn, "bob", Some("bob@wonder.land"));
        register(&conn, "carol", None);
        update_profile(
            &conn,
            &bob,
            &ProfileUpdate {
                full_name: Some("Robert Tables".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let all = search_members(&conn, &alice, None).unwrap();
        let names: Vec<_> = all.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "carol"]);

        let by_name = search_members(&conn, &alice, Some("TABLES")).unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].username, "bob");

        let by_email = search_members(&conn, &alice, Some("wonder.land")).unwrap();
        assert_eq!(by_email.len(), 1);

        assert!(search_members(&conn, &alice, Some("alice")).unwrap().is_empty());
        assert!(search_members(&conn, &alice, Some("%")).unwrap().is_empty());
    }

    #[test]
    fn credentials_lookup_uses_normalized_name() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let id = register(&conn, "alice", None);

        let found = credentials(&conn, &Username::parse("ALICE").unwrap()).unwrap();
        assert_eq!(found, Some((id, "hash".to_string())));
        assert!(credentials(&conn, &Username::parse("nobody").unwrap())
            .unwrap()
            .is_none());
    }
}
