use crate::models::{
    AttendanceEvent, Course, CreateInvoiceRequest, DashboardStats, GradeEntry, Invoice,
    LeaveRequest, RecordGradeRequest, StoredIdentity,
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// The abstract contract for all persistence operations, keeping handlers and
/// the access gate independent of the concrete store (Postgres, mocks).
///
/// Identity access is read-only by design: the authentication gate resolves
/// identities but never writes them; identity creation and update belong to an
/// administrative flow outside this service.
///
/// **Send + Sync + async_trait** make the trait object (`Arc<dyn Repository>`)
/// safely shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity (gate collaborator) ---
    /// Exact, case-sensitive email match.
    async fn find_identity_by_email(&self, email: &str) -> Option<StoredIdentity>;
    async fn find_identity_by_id(&self, id: Uuid) -> Option<StoredIdentity>;
    /// Admin listing. Secret hashes are stripped before leaving the API layer.
    async fn list_identities(&self) -> Vec<StoredIdentity>;

    // --- Academic ---
    async fn list_courses(&self) -> Vec<Course>;
    /// Records a grade against an existing course. Returns None when the
    /// course does not exist.
    async fn record_grade(
        &self,
        course_id: Uuid,
        req: RecordGradeRequest,
        graded_by: Uuid,
    ) -> Option<GradeEntry>;

    // --- Finance ---
    async fn list_invoices(&self) -> Vec<Invoice>;
    async fn create_invoice(&self, req: CreateInvoiceRequest) -> Option<Invoice>;
    /// Approves a draft invoice. Returns None if the invoice is missing or not
    /// in 'draft' status (idempotent approval is not supported; a second
    /// approval affects 0 rows).
    async fn approve_invoice(&self, id: Uuid, approved_by: Uuid) -> Option<Invoice>;

    // --- HR ---
    async fn list_pending_leave(&self) -> Vec<LeaveRequest>;
    /// Decides a pending leave request. Returns None if the request is missing
    /// or already decided.
    async fn set_leave_status(
        &self,
        id: Uuid,
        status: &str,
        decided_by: Uuid,
    ) -> Option<LeaveRequest>;
    async fn record_attendance(&self, employee_id: Uuid, kind: &str) -> Option<AttendanceEvent>;

    // --- Dashboard ---
    /// Persistence-side counters. `active_sessions` is zero here; the handler
    /// fills it from the session store.
    async fn get_stats(&self) -> DashboardStats;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the
/// PostgreSQL database. Queries use the runtime-checked `query_as` form so the
/// crate builds without a live database connection.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// find_identity_by_email
    ///
    /// Exact-match lookup used by the credential path. Deliberately no ILIKE:
    /// email comparison is case-sensitive per the gate contract.
    async fn find_identity_by_email(&self, email: &str) -> Option<StoredIdentity> {
        sqlx::query_as::<_, StoredIdentity>(
            "SELECT id, email, role, secret_hash, permissions FROM identities WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("find_identity_by_email error: {:?}", e);
            None
        })
    }

    async fn find_identity_by_id(&self, id: Uuid) -> Option<StoredIdentity> {
        sqlx::query_as::<_, StoredIdentity>(
            "SELECT id, email, role, secret_hash, permissions FROM identities WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("find_identity_by_id error: {:?}", e);
            None
        })
    }

    async fn list_identities(&self) -> Vec<StoredIdentity> {
        sqlx::query_as::<_, StoredIdentity>(
            "SELECT id, email, role, secret_hash, permissions FROM identities ORDER BY email ASC",
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_identities error: {:?}", e);
            vec![]
        })
    }

    async fn list_courses(&self) -> Vec<Course> {
        sqlx::query_as::<_, Course>("SELECT id, code, title, credits FROM courses ORDER BY code ASC")
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_courses error: {:?}", e);
                vec![]
            })
    }

    /// record_grade
    ///
    /// Insert guarded by course existence; the grading principal is stamped on
    /// the row for accountability.
    async fn record_grade(
        &self,
        course_id: Uuid,
        req: RecordGradeRequest,
        graded_by: Uuid,
    ) -> Option<GradeEntry> {
        sqlx::query_as::<_, GradeEntry>(
            r#"
            INSERT INTO grades (id, course_id, student_id, grade, graded_by, created_at)
            SELECT $1, c.id, $3, $4, $5, NOW() FROM courses c WHERE c.id = $2
            RETURNING id, course_id, student_id, grade, graded_by, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(req.student_id)
        .bind(req.grade)
        .bind(graded_by)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("record_grade error: {:?}", e);
            None
        })
    }

    async fn list_invoices(&self) -> Vec<Invoice> {
        sqlx::query_as::<_, Invoice>(
            "SELECT id, number, customer, amount_cents, status, approved_by, created_at FROM invoices ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_invoices error: {:?}", e);
            vec![]
        })
    }

    /// create_invoice
    ///
    /// New invoices always start in 'draft'; approval is a separate,
    /// separately-guarded operation.
    async fn create_invoice(&self, req: CreateInvoiceRequest) -> Option<Invoice> {
        sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (id, number, customer, amount_cents, status, approved_by, created_at)
            VALUES ($1, $2, $3, $4, 'draft', NULL, NOW())
            RETURNING id, number, customer, amount_cents, status, approved_by, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.number)
        .bind(req.customer)
        .bind(req.amount_cents)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("create_invoice error: {:?}", e);
            None
        })
    }

    async fn approve_invoice(&self, id: Uuid, approved_by: Uuid) -> Option<Invoice> {
        sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET status = 'approved', approved_by = $2
            WHERE id = $1 AND status = 'draft'
            RETURNING id, number, customer, amount_cents, status, approved_by, created_at
            "#,
        )
        .bind(id)
        .bind(approved_by)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("approve_invoice error: {:?}", e);
            None
        })
    }

    async fn list_pending_leave(&self) -> Vec<LeaveRequest> {
        sqlx::query_as::<_, LeaveRequest>(
            "SELECT id, employee_id, reason, status, decided_by, created_at FROM leave_requests WHERE status = 'pending' ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_pending_leave error: {:?}", e);
            vec![]
        })
    }

    async fn set_leave_status(
        &self,
        id: Uuid,
        status: &str,
        decided_by: Uuid,
    ) -> Option<LeaveRequest> {
        sqlx::query_as::<_, LeaveRequest>(
            r#"
            UPDATE leave_requests SET status = $2, decided_by = $3
            WHERE id = $1 AND status = 'pending'
            RETURNING id, employee_id, reason, status, decided_by, created_at
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(decided_by)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("set_leave_status error: {:?}", e);
            None
        })
    }

    async fn record_attendance(&self, employee_id: Uuid, kind: &str) -> Option<AttendanceEvent> {
        sqlx::query_as::<_, AttendanceEvent>(
            r#"
            INSERT INTO attendance_events (id, employee_id, kind, recorded_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, employee_id, kind, recorded_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(employee_id)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("record_attendance error: {:?}", e);
            None
        })
    }

    /// get_stats
    ///
    /// Compiles the persistence counters for the administrative dashboard.
    async fn get_stats(&self) -> DashboardStats {
        let total_identities = count(&self.pool, "SELECT COUNT(*) FROM identities").await;
        let total_courses = count(&self.pool, "SELECT COUNT(*) FROM courses").await;
        let total_invoices = count(&self.pool, "SELECT COUNT(*) FROM invoices").await;
        let pending_leave_requests = count(
            &self.pool,
            "SELECT COUNT(*) FROM leave_requests WHERE status = 'pending'",
        )
        .await;
        DashboardStats {
            total_identities,
            total_courses,
            total_invoices,
            pending_leave_requests,
            // Filled from the session store at the handler layer.
            active_sessions: 0,
        }
    }
}

async fn count(pool: &PgPool, sql: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .fetch_one(pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("count query error: {:?}", e);
            0
        })
}
