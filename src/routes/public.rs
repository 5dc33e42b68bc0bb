use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any client.
/// Only two exist: the health probe and the login endpoint itself — everything
/// else in this service sits behind the access gate.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        // Returns "ok" immediately to verify the service is running and responsive.
        .route("/health", get(|| async { "ok" }))
        // POST /login
        // The credential path of the authentication gate: verifies the email/secret
        // pair, establishes a session, and issues a bearer token. A failed attempt
        // is terminal; the client decides whether to retry with new input.
        .route("/login", post(handlers::login))
}
