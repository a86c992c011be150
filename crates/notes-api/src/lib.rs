pub mod auth;
pub mod config;
pub mod dev;
pub mod error;
pub mod google;
pub mod mail;
pub mod middleware;
pub mod notes;
pub mod otp;
pub mod token;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    middleware::from_fn_with_state,
    routing::{get, post},
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use notes_db::Database;

use crate::dev::DispatchLog;
use crate::google::IdentityVerifier;
use crate::middleware::require_auth;
use crate::otp::OtpService;
use crate::token::TokenIssuer;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub otp: OtpService,
    pub tokens: TokenIssuer,
    pub identity: Arc<dyn IdentityVerifier>,
    /// Present only when developer endpoints are enabled.
    pub dispatch_log: Option<Arc<DispatchLog>>,
}

/// Assemble the full HTTP surface. Developer routes are mounted only when the
/// state carries a dispatch log.
pub fn router(state: AppState, frontend_url: &str) -> anyhow::Result<Router> {
    let public_routes = Router::new()
        .route("/", get(health))
        .route("/api/auth/send-otp", post(auth::send_otp))
        .route("/api/auth/verify-otp", post(auth::verify_otp))
        .route("/api/auth/google", post(auth::google_login));

    let protected_routes = Router::new()
        .route("/api/auth/profile", get(auth::profile))
        .route("/api/notes", get(notes::list_notes).post(notes::create_note))
        .route("/api/notes/{id}", get(notes::get_note).delete(notes::delete_note))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let mut app = Router::new().merge(public_routes).merge(protected_routes);

    if state.dispatch_log.is_some() {
        tracing::warn!("Developer endpoints enabled");
        app = app
            .route("/api/dev/last-email-url", get(dev::last_email_url))
            .route("/api/test/email", post(dev::test_email));
    }

    let cors = CorsLayer::new()
        .allow_origin(frontend_url.parse::<HeaderValue>()?)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Ok(app
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "message": "API is running" }))
}
