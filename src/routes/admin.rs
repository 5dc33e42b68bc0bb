use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Defines the routes exclusively accessible to principals with the admin
/// role. The authentication layer above guarantees a live principal; the
/// role requirement itself is declared and enforced in each handler via the
/// access gate, so a non-admin principal reaching these routes receives a
/// structured 403 RoleMismatch rather than a silent 404.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/stats
        // Dashboard counters (identities, courses, invoices, pending leave)
        // plus the live session count from the session store.
        .route("/stats", get(handlers::get_admin_stats))
        // GET /admin/identities
        // Lists all identities with their roles and explicit permission
        // grants. Secret hashes never cross the model boundary.
        .route("/identities", get(handlers::list_identities))
}
