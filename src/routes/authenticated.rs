use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Defines the routes accessible to any principal with a live session. The
/// `Principal` extractor middleware layered above this module guarantees every
/// handler receives a validated principal; each handler then declares its own
/// Authorization Requirement (role / permission / all-of / any-of) and calls
/// the access gate before touching the repository.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Principal & Session ---
        // GET /me
        // The resolved principal: identity, role, explicit permissions.
        .route("/me", get(handlers::get_me))
        // GET /session
        // Remaining session lifetime, recomputed from absolute timestamps.
        .route("/session", get(handlers::get_session))
        // POST /session/heartbeat
        // Explicit activity signal; resets the idle clock (last-write-wins).
        .route("/session/heartbeat", post(handlers::session_heartbeat))
        // POST /logout
        // Ends the session; the bearer token stops working immediately.
        .route("/logout", post(handlers::logout))
        // --- Academic ---
        // GET /courses — requires `view_courses`.
        .route("/courses", get(handlers::list_courses))
        // POST /courses/{id}/grades — requires `grade_students`.
        .route("/courses/{id}/grades", post(handlers::record_grade))
        // --- Finance ---
        // GET /finance/invoices — requires any of `view_invoices` / `manage_invoices`.
        // POST /finance/invoices — requires `manage_invoices`.
        .route(
            "/finance/invoices",
            get(handlers::list_invoices).post(handlers::create_invoice),
        )
        // POST /finance/invoices/{id}/approve — requires all of
        // `manage_invoices` + `approve_payments`.
        .route(
            "/finance/invoices/{id}/approve",
            post(handlers::approve_invoice),
        )
        // --- HR ---
        // GET /hr/leave — requires `view_employees`.
        .route("/hr/leave", get(handlers::list_pending_leave))
        // POST /hr/leave/{id}/approve — requires the `hr_manager` role AND
        // the `approve_leave` permission.
        .route("/hr/leave/{id}/approve", post(handlers::approve_leave))
        // POST /hr/attendance/check-in|check-out — require `record_attendance`.
        .route("/hr/attendance/check-in", post(handlers::check_in))
        .route("/hr/attendance/check-out", post(handlers::check_out))
}
