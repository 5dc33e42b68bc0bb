use crate::{
    AppState,
    auth::{self, Principal},
    error::{AccessError, ApiError},
    models::{
        AttendanceEvent, Course, CreateInvoiceRequest, DashboardStats, GradeEntry,
        IdentitySummary, Invoice, LeaveRequest, LoginRequest, LoginResponse, RecordGradeRequest,
        SessionStatus, UserProfile,
    },
    rbac::{Requirement, Role, perm},
    session::SessionView,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

fn session_status(view: SessionView) -> SessionStatus {
    SessionStatus {
        started_at: view.started_at,
        last_activity: view.last_activity,
        remaining_secs: view.remaining.num_seconds(),
        expires_at: view.last_activity + view.remaining,
    }
}

// --- Auth & Session Handlers ---

/// login
///
/// [Public Route] The credential path of the authentication gate. On success a
/// session is established and the response carries everything the client
/// stores to restore it: token, identity, role, permissions, session expiry.
///
/// *Security*: unknown email and wrong password produce the identical 401
/// body, and the unknown-email path performs an equivalent hashing run so the
/// two cases are not separable by timing.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AccessError> {
    let (principal, token) = auth::authenticate_credentials(
        &state.repo,
        &state.sessions,
        &state.config,
        &payload.email,
        &payload.password,
    )
    .await?;

    // The session was just begun; its view defines the advertised expiry.
    let view = state
        .sessions
        .get(principal.id)
        .ok_or(AccessError::Internal)?;
    let identity = state
        .repo
        .find_identity_by_id(principal.id)
        .await
        .ok_or(AccessError::Internal)?;

    Ok(Json(LoginResponse {
        token,
        identity_id: principal.id,
        role: principal.role,
        permissions: identity.permissions,
        session_expires_at: view.last_activity + view.remaining,
    }))
}

/// get_me
///
/// [Authenticated Route] The resolved principal as the UI sees it: identity,
/// role, and explicit permission grants.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(principal: Principal, State(state): State<AppState>) -> Json<UserProfile> {
    let permissions = state
        .repo
        .find_identity_by_id(principal.id)
        .await
        .map(|i| i.permissions)
        .unwrap_or_default();
    Json(UserProfile {
        id: principal.id,
        role: principal.role,
        permissions,
    })
}

/// get_session
///
/// [Authenticated Route] Remaining session lifetime, recomputed from absolute
/// timestamps on every call so client countdowns can resync without drift.
#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "Session status", body = SessionStatus),
        (status = 401, description = "No live session")
    )
)]
pub async fn get_session(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<Json<SessionStatus>, AccessError> {
    let view = state
        .sessions
        .get(principal.id)
        .ok_or(AccessError::Unauthenticated)?;
    Ok(Json(session_status(view)))
}

/// session_heartbeat
///
/// [Authenticated Route] Explicit activity signal: touches the session
/// (last-write-wins) and returns the refreshed status. Immediately after a
/// heartbeat the remaining lifetime equals the full timeout.
#[utoipa::path(
    post,
    path = "/session/heartbeat",
    responses(
        (status = 200, description = "Session refreshed", body = SessionStatus),
        (status = 401, description = "Session expired")
    )
)]
pub async fn session_heartbeat(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<Json<SessionStatus>, AccessError> {
    // Touch refuses to revive an expired session; the principal must log in
    // again.
    if !state.sessions.touch(principal.id) {
        return Err(AccessError::Unauthenticated);
    }
    let view = state
        .sessions
        .get(principal.id)
        .ok_or(AccessError::Unauthenticated)?;
    Ok(Json(session_status(view)))
}

/// logout
///
/// [Authenticated Route] Ends the session. The bearer token becomes useless
/// even within its own lifetime, because every request re-checks the session.
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 204, description = "Session ended"))
)]
pub async fn logout(principal: Principal, State(state): State<AppState>) -> StatusCode {
    state.sessions.end(principal.id);
    tracing::info!(principal = %principal.id, "logout");
    StatusCode::NO_CONTENT
}

// --- Academic Handlers ---

/// list_courses
///
/// [Authenticated Route] Course catalog. Requires the `view_courses`
/// permission (held by students, instructors, and staff by default).
#[utoipa::path(
    get,
    path = "/courses",
    responses(
        (status = 200, description = "Courses", body = [Course]),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn list_courses(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<Json<Vec<Course>>, ApiError> {
    state
        .gate
        .authorize(Some(&principal), &Requirement::permission(perm::VIEW_COURSES))
        .require()?;
    Ok(Json(state.repo.list_courses().await))
}

/// record_grade
///
/// [Authenticated Route] Records a grade for a student on a course. Requires
/// the `grade_students` permission; the grading principal is stamped on the
/// entry.
#[utoipa::path(
    post,
    path = "/courses/{id}/grades",
    params(("id" = Uuid, Path, description = "Course ID")),
    request_body = RecordGradeRequest,
    responses(
        (status = 201, description = "Grade recorded", body = GradeEntry),
        (status = 403, description = "Missing permission"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn record_grade(
    principal: Principal,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<RecordGradeRequest>,
) -> Result<(StatusCode, Json<GradeEntry>), ApiError> {
    state
        .gate
        .authorize(
            Some(&principal),
            &Requirement::permission(perm::GRADE_STUDENTS),
        )
        .require()?;
    let entry = state
        .repo
        .record_grade(course_id, payload, principal.id)
        .await
        .ok_or(ApiError::NotFound)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

// --- Finance Handlers ---

/// list_invoices
///
/// [Authenticated Route] Invoice listing. An any-of requirement: either
/// `view_invoices` or `manage_invoices` suffices.
#[utoipa::path(
    get,
    path = "/finance/invoices",
    responses(
        (status = 200, description = "Invoices", body = [Invoice]),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn list_invoices(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<Json<Vec<Invoice>>, ApiError> {
    state
        .gate
        .authorize(
            Some(&principal),
            &Requirement::any_of([perm::VIEW_INVOICES, perm::MANAGE_INVOICES]),
        )
        .require()?;
    Ok(Json(state.repo.list_invoices().await))
}

/// create_invoice
///
/// [Authenticated Route] Creates a draft invoice. Requires `manage_invoices`.
#[utoipa::path(
    post,
    path = "/finance/invoices",
    request_body = CreateInvoiceRequest,
    responses(
        (status = 201, description = "Invoice created", body = Invoice),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn create_invoice(
    principal: Principal,
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), ApiError> {
    state
        .gate
        .authorize(
            Some(&principal),
            &Requirement::permission(perm::MANAGE_INVOICES),
        )
        .require()?;
    let invoice = state
        .repo
        .create_invoice(payload)
        .await
        .ok_or(ApiError::Access(AccessError::Internal))?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// approve_invoice
///
/// [Authenticated Route] Approves a draft invoice. An all-of requirement:
/// both `manage_invoices` and `approve_payments` must be held.
#[utoipa::path(
    post,
    path = "/finance/invoices/{id}/approve",
    params(("id" = Uuid, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Approved", body = Invoice),
        (status = 403, description = "Missing permission"),
        (status = 404, description = "Not found or not draft")
    )
)]
pub async fn approve_invoice(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, ApiError> {
    state
        .gate
        .authorize(
            Some(&principal),
            &Requirement::all_of([perm::MANAGE_INVOICES, perm::APPROVE_PAYMENTS]),
        )
        .require()?;
    let invoice = state
        .repo
        .approve_invoice(id, principal.id)
        .await
        .ok_or(ApiError::NotFound)?;
    Ok(Json(invoice))
}

// --- HR Handlers ---

/// list_pending_leave
///
/// [Authenticated Route] Pending leave queue. Requires `view_employees`.
#[utoipa::path(
    get,
    path = "/hr/leave",
    responses(
        (status = 200, description = "Pending leave requests", body = [LeaveRequest]),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn list_pending_leave(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<Json<Vec<LeaveRequest>>, ApiError> {
    state
        .gate
        .authorize(
            Some(&principal),
            &Requirement::permission(perm::VIEW_EMPLOYEES),
        )
        .require()?;
    Ok(Json(state.repo.list_pending_leave().await))
}

/// approve_leave
///
/// [Authenticated Route] Approves a pending leave request. A role AND
/// permission combination: the principal must hold the `hr_manager` role
/// *and* the `approve_leave` permission. The role check is evaluated first,
/// so an accountant with a stray `approve_leave` grant is denied with
/// RoleMismatch, not MissingPermission.
#[utoipa::path(
    post,
    path = "/hr/leave/{id}/approve",
    params(("id" = Uuid, Path, description = "Leave request ID")),
    responses(
        (status = 200, description = "Approved", body = LeaveRequest),
        (status = 403, description = "Wrong role or missing permission"),
        (status = 404, description = "Not found or already decided")
    )
)]
pub async fn approve_leave(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LeaveRequest>, ApiError> {
    state
        .gate
        .authorize(
            Some(&principal),
            &Requirement::role(Role::HrManager).and_permission(perm::APPROVE_LEAVE),
        )
        .require()?;
    let request = state
        .repo
        .set_leave_status(id, "approved", principal.id)
        .await
        .ok_or(ApiError::NotFound)?;
    Ok(Json(request))
}

/// check_in
///
/// [Authenticated Route] Attendance check-in for the requesting principal.
/// Requires `record_attendance`.
#[utoipa::path(
    post,
    path = "/hr/attendance/check-in",
    responses(
        (status = 201, description = "Checked in", body = AttendanceEvent),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn check_in(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<AttendanceEvent>), ApiError> {
    record_attendance(principal, state, "check_in").await
}

/// check_out
///
/// [Authenticated Route] Attendance check-out, same guard as check-in.
#[utoipa::path(
    post,
    path = "/hr/attendance/check-out",
    responses(
        (status = 201, description = "Checked out", body = AttendanceEvent),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn check_out(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<AttendanceEvent>), ApiError> {
    record_attendance(principal, state, "check_out").await
}

async fn record_attendance(
    principal: Principal,
    state: AppState,
    kind: &str,
) -> Result<(StatusCode, Json<AttendanceEvent>), ApiError> {
    state
        .gate
        .authorize(
            Some(&principal),
            &Requirement::permission(perm::RECORD_ATTENDANCE),
        )
        .require()?;
    let event = state
        .repo
        .record_attendance(principal.id, kind)
        .await
        .ok_or(ApiError::Access(AccessError::Internal))?;
    Ok((StatusCode::CREATED, Json(event)))
}

// --- Admin Handlers ---

/// get_admin_stats
///
/// [Admin Route] Dashboard counters. Requires the `admin` role; the
/// permission side is implied by the admin wildcard but the declared
/// requirement is the role itself.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses(
        (status = 200, description = "Stats", body = DashboardStats),
        (status = 403, description = "Wrong role")
    )
)]
pub async fn get_admin_stats(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, ApiError> {
    state
        .gate
        .authorize(Some(&principal), &Requirement::role(Role::Admin))
        .require()?;
    let mut stats = state.repo.get_stats().await;
    stats.active_sessions = state.sessions.active_count();
    Ok(Json(stats))
}

/// list_identities
///
/// [Admin Route] Identity listing, with secret hashes stripped at the model
/// boundary. Requires the `admin` role.
#[utoipa::path(
    get,
    path = "/admin/identities",
    responses(
        (status = 200, description = "Identities", body = [IdentitySummary]),
        (status = 403, description = "Wrong role")
    )
)]
pub async fn list_identities(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<Json<Vec<IdentitySummary>>, ApiError> {
    state
        .gate
        .authorize(Some(&principal), &Requirement::role(Role::Admin))
        .require()?;
    let identities = state
        .repo
        .list_identities()
        .await
        .into_iter()
        .map(IdentitySummary::from)
        .collect();
    Ok(Json(identities))
}
