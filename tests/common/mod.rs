#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

use slid::auth::session;
use slid::config::Config;
use slid::db;
use slid::identity::repository::{self as identity, NewIdentity};
use slid::identity::Username;
use slid::oauth::ProviderRegistry;
use slid::state::AppState;

pub const PASSWORD: &str = "battery staple";
const BOUNDARY: &str = "slid-test-boundary";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    _tmp: TempDir,
}

pub fn test_config(tmp: &TempDir) -> Config {
    let mut config = Config::default();
    config.database.path = Some(tmp.path().join("slid.db"));
    config.storage.path = Some(tmp.path().join("media"));
    config.server.public_url = Some("https://slid.test".to_string());
    config
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Build with a config tweak applied; providers come from the config.
    pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let tmp = TempDir::new().unwrap();
        let mut config = test_config(&tmp);
        tweak(&mut config);
        let pool = db::create_pool(&config.db_path()).unwrap();
        db::run_migrations(&pool).unwrap();
        let state = AppState::new(pool, config).unwrap();
        Self::from_state(state, tmp)
    }

    pub fn with_providers(providers: ProviderRegistry) -> Self {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);
        let pool = db::create_pool(&config.db_path()).unwrap();
        db::run_migrations(&pool).unwrap();
        let state = AppState::with_providers(pool, config, providers);
        Self::from_state(state, tmp)
    }

    fn from_state(state: AppState, tmp: TempDir) -> Self {
        Self {
            app: slid::routes::app(state.clone()),
            state,
            _tmp: tmp,
        }
    }

    /// Insert an identity directly (cheap bcrypt cost) and open a session.
    /// Returns `(user_id, session cookie header value)`.
    pub fn seed_user(&self, name: &str) -> (String, String) {
        let conn = self.state.db.get().unwrap();
        let username = Username::parse(name).unwrap();
        let hash = bcrypt::hash(PASSWORD, 4).unwrap();
        let code = identity::unique_user_code(&conn).unwrap();
        let user_id = identity::create_identity(
            &conn,
            &NewIdentity {
                username: &username,
                email: Some(&format!("{}@example.com", name)),
                password_hash: &hash,
                user_code: &code,
                qr_code_path: None,
            },
        )
        .unwrap();
        let token = session::create_session(&conn, &user_id, 1).unwrap();
        (user_id, format!("slid_session={}", token))
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        self.send(build(Method::GET, uri, cookie, None, Body::empty()))
            .await
    }

    pub async fn post_form(
        &self,
        uri: &str,
        cookie: Option<&str>,
        fields: &[(&str, &str)],
    ) -> Response<Body> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.send(build(
            Method::POST,
            uri,
            cookie,
            Some("application/x-www-form-urlencoded".to_string()),
            Body::from(body),
        ))
        .await
    }

    /// Multipart POST. `files` entries are `(field, file name, bytes)`.
    pub async fn post_multipart(
        &self,
        uri: &str,
        cookie: Option<&str>,
        fields: &[(&str, &str)],
        files: &[(&str, &str, &[u8])],
    ) -> Response<Body> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        for (name, file_name, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, name, file_name
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        self.send(build(
            Method::POST,
            uri,
            cookie,
            Some(format!("multipart/form-data; boundary={}", BOUNDARY)),
            Body::from(body),
        ))
        .await
    }

    pub fn count(&self, sql: &str) -> i64 {
        let conn = self.state.db.get().unwrap();
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }
}

fn build(
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    content_type: Option<String>,
    body: Body,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(body).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    response.headers()[header::LOCATION].to_str().unwrap()
}

fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookie| {
            let (pair, _) = cookie.split_once(';').unwrap_or((cookie, ""));
            let (key, value) = pair.split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}

/// `slid_session=<token>` from a response, ready to send back.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    set_cookie(response, "slid_session")
        .filter(|token| !token.is_empty())
        .map(|token| format!("slid_session={}", token))
}

/// `(level, message)` of the flash notice a response sets.
pub fn flash(response: &Response<Body>) -> Option<(String, String)> {
    let raw = set_cookie(response, "slid_flash")?;
    let mut level = None;
    let mut message = None;
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        match key.as_ref() {
            "level" => level = Some(value.into_owned()),
            "message" => message = Some(value.into_owned()),
            _ => {}
        }
    }
    Some((level?, message?))
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
