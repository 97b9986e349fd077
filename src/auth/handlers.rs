use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::json;

use crate::audit::{self, AuditAction};
use crate::auth::password::{self, MIN_PASSWORD_LEN};
use crate::auth::session;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::identity::domain::{parse_email, IdentityError, Username};
use crate::identity::qr;
use crate::identity::repository::{self as identity, NewIdentity};
use crate::notice::{redirect_with, Flash, Notice};
use crate::oauth::accounts;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct SignInForm {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SignUpForm {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
    pub password_confirmation: String,
}

// -- Helpers --

/// Where a freshly signed-in user goes next.
fn landing_path(conn: &rusqlite::Connection, user_id: &str, username: &str) -> AppResult<String> {
    if !identity::has_accepted_terms(conn, user_id)? {
        return Ok("/termsAndconditions".to_string());
    }
    if !accounts::has_linked(conn, user_id)? {
        return Ok("/completeProfile".to_string());
    }
    Ok(format!("/{}", username))
}

fn redirect_with_session(state: &AppState, token: &str, location: &str) -> Response {
    let auth = &state.config.auth;
    let cookie = session::session_cookie(
        &auth.cookie_name,
        token,
        auth.session_hours,
        auth.secure_cookies,
    );
    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Redirect::to(location),
    )
        .into_response()
}

// -- Handlers --

/// GET /: signed-in users land on their profile, everyone else on sign-in.
pub async fn index(maybe_user: MaybeUser) -> Redirect {
    match maybe_user.0 {
        Some(user) => Redirect::to(&user.profile_path()),
        None => Redirect::to("/signIn"),
    }
}

/// GET /signIn
pub async fn sign_in_page(maybe_user: MaybeUser, flash: Flash) -> Response {
    let body = Json(json!({
        "authenticated": maybe_user.0.is_some(),
        "notice": flash.0,
    }));
    flash.respond(body)
}

/// POST /signIn
pub async fn sign_in(
    State(state): State<AppState>,
    Form(form): Form<SignInForm>,
) -> AppResult<Response> {
    let invalid = || redirect_with("/signIn", Notice::error("Invalid username or password"));

    let Ok(username) = Username::parse(&form.username) else {
        return Ok(invalid());
    };

    let conn = state.db.get()?;
    let Some((user_id, hash)) = identity::credentials(&conn, &username)? else {
        tracing::warn!(username = %username, "sign-in for unknown user");
        return Ok(invalid());
    };
    if !password::verify_password(&form.password, &hash) {
        tracing::warn!(username = %username, "sign-in with wrong password");
        return Ok(invalid());
    }

    let token = session::create_session(&conn, &user_id, state.config.auth.session_hours)?;
    identity::record_login(&conn, &user_id)?;
    audit::record(&conn, &user_id, AuditAction::Login, None);
    tracing::info!(username = %username, "signed in");

    let landing = landing_path(&conn, &user_id, username.as_str())?;
    Ok(redirect_with_session(&state, &token, &landing))
}

/// GET /signUp
pub async fn sign_up_page(flash: Flash) -> Response {
    let body = Json(json!({
        "min_password_length": MIN_PASSWORD_LEN,
        "notice": flash.0,
    }));
    flash.respond(body)
}

/// POST /signUp: create the identity, its profile and QR badge, then sign in.
pub async fn sign_up(
    State(state): State<AppState>,
    Form(form): Form<SignUpForm>,
) -> AppResult<Response> {
    let rejected = |message: String| Ok(redirect_with("/signUp", Notice::error(message)));

    let username = match Username::parse(&form.username) {
        Ok(username) => username,
        Err(e) => return rejected(e.to_string()),
    };
    let email = match parse_email(form.email.as_deref()) {
        Ok(email) => email,
        Err(e) => return rejected(e.to_string()),
    };
    if let Err(e) = password::validate_new_password(&form.password, &form.password_confirmation) {
        return rejected(format!("password: {}", e));
    }

    {
        let conn = state.db.get()?;
        if identity::username_taken(&conn, &username)? {
            return rejected(IdentityError::UsernameTaken.to_string());
        }
    }

    let password_hash = password::hash_password(&form.password)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let profile_url = format!("{}/{}", state.config.public_url(), username);
    let svg = qr::badge_svg(&profile_url)
        .map_err(|e| AppError::Internal(format!("QR generation failed: {}", e)))?;
    let qr_code_path = state.media.save_qr_badge(username.as_str(), &svg).await?;

    let conn = state.db.get()?;
    let user_code = identity::unique_user_code(&conn)?;
    let user_id = identity::create_identity(
        &conn,
        &NewIdentity {
            username: &username,
            email: email.as_deref(),
            password_hash: &password_hash,
            user_code: &user_code,
            qr_code_path: Some(&qr_code_path),
        },
    )?;
    let token = session::create_session(&conn, &user_id, state.config.auth.session_hours)?;
    identity::record_login(&conn, &user_id)?;
    tracing::info!(username = %username, "registered");

    Ok(redirect_with_session(&state, &token, "/termsAndconditions"))
}

/// GET|POST /signOut
pub async fn sign_out(State(state): State<AppState>, maybe_user: MaybeUser) -> AppResult<Response> {
    if let Some(user) = maybe_user.0 {
        let conn = state.db.get()?;
        session::delete_session(&conn, &user.session)?;
        tracing::info!(username = %user.username, "signed out");
    }

    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            session::clear_session_cookie(&state.config.auth.cookie_name),
        )]),
        Redirect::to("/signIn"),
    )
        .into_response())
}

/// GET /termsAndconditions
pub async fn terms_page(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let accepted = identity::has_accepted_terms(&conn, &user.id)?;
    Ok(Json(json!({ "accepted": accepted })))
}

/// POST /termsAndconditions
pub async fn accept_terms(State(state): State<AppState>, user: CurrentUser) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    identity::accept_terms(&conn, &user.id)?;
    Ok(Redirect::to("/completeProfile"))
}

/// GET /completeProfile: the caller's linked accounts.
pub async fn complete_profile_page(
    State(state): State<AppState>,
    user: CurrentUser,
    flash: Flash,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let linked = accounts::linked_accounts(&conn, &user.id)?;
    let body = Json(json!({
        "linked_accounts": linked,
        "notice": flash.0,
    }));
    Ok(flash.respond(body))
}

/// POST /completeProfile: relink every account the caller owns.
pub async fn complete_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    accounts::mark_all_linked(&conn, &user.id)?;
    Ok(Redirect::to(&user.profile_path()))
}

/// POST /report-csp-violation: log the report and acknowledge it.
pub async fn report_csp_violation(body: Bytes) -> AppResult<StatusCode> {
    let report: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid CSP report: {}", e)))?;
    tracing::warn!(report = %report, "CSP violation");
    Ok(StatusCode::NO_CONTENT)
}
