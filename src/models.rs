use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::rbac::Role;

// --- Identity Schemas ---

/// StoredIdentity
///
/// The canonical identity record from the `identities` table, as consumed by
/// the authentication gate. Holds the role string, the argon2 PHC secret hash,
/// and the explicit permission grants. Internal only — the secret hash never
/// leaves the persistence boundary, so this struct has no API schema.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct StoredIdentity {
    pub id: Uuid,
    // Exact-match, case-sensitive lookup key.
    pub email: String,
    // Role as stored; parsed into the closed enumeration at principal
    // construction, where unknown values are rejected.
    pub role: String,
    // Salted one-way hash (argon2id PHC string). Never compared directly.
    pub secret_hash: String,
    // Explicit permission identifiers; may include the wildcard. Extends the
    // role's registry defaults, never narrows them.
    pub permissions: Vec<String>,
}

/// IdentitySummary
///
/// Output schema for the administrative identity listing. Deliberately omits
/// the secret hash.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct IdentitySummary {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub permissions: Vec<String>,
}

impl From<StoredIdentity> for IdentitySummary {
    fn from(identity: StoredIdentity) -> Self {
        Self {
            id: identity.id,
            // Unknown stored roles have no representable summary; they are
            // rejected upstream, so this conversion only sees valid rows.
            role: identity.role.parse().unwrap_or(Role::Student),
            email: identity.email,
            permissions: identity.permissions,
        }
    }
}

// --- Auth & Session Payloads ---

/// LoginRequest
///
/// Input payload for POST /login. The password is verified against the stored
/// hash and never persisted or logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// LoginResponse
///
/// Everything the client stores to restore a session at startup: the bearer
/// token plus `{identity, role, permissions, session expiry}`. A client that
/// finds `now >= session_expires_at` in storage discards the token instead of
/// presenting it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub identity_id: Uuid,
    pub role: Role,
    pub permissions: Vec<String>,
    #[ts(type = "string")]
    pub session_expires_at: DateTime<Utc>,
}

/// UserProfile
///
/// Output schema for GET /me: the authenticated principal as the UI sees it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub role: Role,
    pub permissions: Vec<String>,
}

/// SessionStatus
///
/// Output schema for GET /session. Remaining lifetime is recomputed from the
/// stored timestamps on every call, so a client-side countdown can resync
/// without drift.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionStatus {
    #[ts(type = "string")]
    pub started_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub last_activity: DateTime<Utc>,
    pub remaining_secs: i64,
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
}

// --- Academic Schemas ---

/// Course record from the `courses` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Course {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub credits: i32,
}

/// GradeEntry
///
/// A recorded grade, tagged with the grading principal for accountability.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct GradeEntry {
    pub id: Uuid,
    pub course_id: Uuid,
    pub student_id: Uuid,
    pub grade: String,
    pub graded_by: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Input payload for POST /courses/{id}/grades.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RecordGradeRequest {
    pub student_id: Uuid,
    pub grade: String,
}

// --- Finance Schemas ---

/// Invoice record from the `invoices` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Invoice {
    pub id: Uuid,
    pub number: String,
    pub customer: String,
    pub amount_cents: i64,
    /// 'draft' until approved.
    pub status: String,
    pub approved_by: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Input payload for POST /finance/invoices.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateInvoiceRequest {
    pub number: String,
    pub customer: String,
    pub amount_cents: i64,
}

// --- HR Schemas ---

/// LeaveRequest record from the `leave_requests` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct LeaveRequest {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub reason: String,
    /// 'pending' | 'approved' | 'rejected'
    pub status: String,
    pub decided_by: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// AttendanceEvent
///
/// A single check-in or check-out, stamped server-side.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct AttendanceEvent {
    pub id: Uuid,
    pub employee_id: Uuid,
    /// 'check_in' | 'check_out'
    pub kind: String,
    #[ts(type = "string")]
    pub recorded_at: DateTime<Utc>,
}

// --- Dashboard Schemas ---

/// DashboardStats
///
/// Output schema for GET /admin/stats. The persistence counts come from the
/// repository; `active_sessions` is read from the session store by the
/// handler.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DashboardStats {
    pub total_identities: i64,
    pub total_courses: i64,
    pub total_invoices: i64,
    pub pending_leave_requests: i64,
    pub active_sessions: i64,
}
