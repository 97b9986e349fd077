use axum::routing::{get, post};
use axum::Router;

use crate::auth::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::index))
        .route("/signIn", get(handlers::sign_in_page).post(handlers::sign_in))
        .route("/signUp", get(handlers::sign_up_page).post(handlers::sign_up))
        .route("/signOut", get(handlers::sign_out).post(handlers::sign_out))
        .route(
            "/termsAndconditions",
            get(handlers::terms_page).post(handlers::accept_terms),
        )
        .route(
            "/completeProfile",
            get(handlers::complete_profile_page).post(handlers::complete_profile),
        )
        .route("/report-csp-violation", post(handlers::report_csp_violation))
}
