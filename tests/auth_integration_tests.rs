use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{Method, Request, Uri, header, request::Parts},
};
use chrono::{Duration, Utc};
use erp_portal::{
    AppState,
    auth::{self, Claims, Principal},
    config::{AppConfig, Env},
    error::AccessError,
    models::{
        AttendanceEvent, Course, CreateInvoiceRequest, DashboardStats, GradeEntry, Invoice,
        LeaveRequest, RecordGradeRequest, StoredIdentity,
    },
    rbac::{AccessGate, Role, RoleRegistry, perm},
    repository::Repository,
    session::{SessionState, SessionStore},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::sync::Arc;
use uuid::Uuid;

// --- Mock Repository for Auth Logic ---

#[derive(Default)]
struct MockAuthRepo {
    identity: Option<StoredIdentity>,
}

#[async_trait]
impl Repository for MockAuthRepo {
    async fn find_identity_by_email(&self, email: &str) -> Option<StoredIdentity> {
        // Exact, case-sensitive match, like the real query.
        self.identity.clone().filter(|i| i.email == email)
    }
    async fn find_identity_by_id(&self, id: Uuid) -> Option<StoredIdentity> {
        self.identity.clone().filter(|i| i.id == id)
    }
    async fn list_identities(&self) -> Vec<StoredIdentity> {
        self.identity.clone().into_iter().collect()
    }
    async fn list_courses(&self) -> Vec<Course> {
        vec![]
    }
    async fn record_grade(
        &self,
        _course_id: Uuid,
        _req: RecordGradeRequest,
        _graded_by: Uuid,
    ) -> Option<GradeEntry> {
        None
    }
    async fn list_invoices(&self) -> Vec<Invoice> {
        vec![]
    }
    async fn create_invoice(&self, _req: CreateInvoiceRequest) -> Option<Invoice> {
        None
    }
    async fn approve_invoice(&self, _id: Uuid, _approved_by: Uuid) -> Option<Invoice> {
        None
    }
    async fn list_pending_leave(&self) -> Vec<LeaveRequest> {
        vec![]
    }
    async fn set_leave_status(
        &self,
        _id: Uuid,
        _status: &str,
        _decided_by: Uuid,
    ) -> Option<LeaveRequest> {
        None
    }
    async fn record_attendance(&self, _employee_id: Uuid, _kind: &str) -> Option<AttendanceEvent> {
        None
    }
    async fn get_stats(&self) -> DashboardStats {
        DashboardStats::default()
    }
}

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const TEST_USER_ID: Uuid = Uuid::from_u128(1);

fn test_identity(id: Uuid, role: &str, permissions: &[&str]) -> StoredIdentity {
    StoredIdentity {
        id,
        email: "test@example.com".to_string(),
        role: role.to_string(),
        secret_hash: String::new(),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
    }
}

fn create_token(user_id: Uuid, role: Role, exp_offset: i64) -> String {
    create_token_with_secret(user_id, role, exp_offset, TEST_JWT_SECRET)
}

fn create_token_with_secret(user_id: Uuid, role: Role, exp_offset: i64, secret: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        role,
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

fn create_app_state(env: Env, repo: MockAuthRepo) -> AppState {
    let mut config = AppConfig::default();
    config.env = env;
    config.jwt_secret = TEST_JWT_SECRET.to_string();

    let sessions: SessionState = Arc::new(SessionStore::new(config.session_timeout_secs));
    let gate = AccessGate::new(Arc::new(RoleRegistry::with_defaults()), sessions.clone());

    AppState {
        repo: Arc::new(repo),
        sessions,
        gate,
        config,
    }
}

/// Helper to get the mutable Parts struct from a generated Request
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn bearer_parts(token: &str) -> Parts {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    parts
}

// --- Token Path Tests ---

#[tokio::test]
async fn valid_token_with_live_session_resolves_principal() {
    let repo = MockAuthRepo {
        identity: Some(test_identity(
            TEST_USER_ID,
            "instructor",
            &[perm::VIEW_REPORTS],
        )),
    };
    let state = create_app_state(Env::Production, repo);
    // Sessions are begun at login; simulate that here.
    state.sessions.begin(TEST_USER_ID);

    let token = create_token(TEST_USER_ID, Role::Instructor, 3600);
    let mut parts = bearer_parts(&token);

    let principal = Principal::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(principal.id, TEST_USER_ID);
    assert_eq!(principal.role, Role::Instructor);
    assert!(principal.permissions.contains(perm::VIEW_REPORTS));
}

#[tokio::test]
async fn missing_header_is_rejected() {
    let state = create_app_state(Env::Production, MockAuthRepo::default());
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let result = Principal::from_request_parts(&mut parts, &state).await;
    assert_eq!(result.unwrap_err(), AccessError::Unauthenticated);
}

#[tokio::test]
async fn malformed_token_is_rejected() {
    let repo = MockAuthRepo {
        identity: Some(test_identity(TEST_USER_ID, "student", &[])),
    };
    let state = create_app_state(Env::Production, repo);
    state.sessions.begin(TEST_USER_ID);

    let mut parts = bearer_parts("not-a-jwt-at-all");
    let result = Principal::from_request_parts(&mut parts, &state).await;
    assert_eq!(result.unwrap_err(), AccessError::Unauthenticated);
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let repo = MockAuthRepo {
        identity: Some(test_identity(TEST_USER_ID, "student", &[])),
    };
    let state = create_app_state(Env::Production, repo);
    state.sessions.begin(TEST_USER_ID);

    // Far enough in the past to clear jsonwebtoken's default leeway.
    let token = create_token(TEST_USER_ID, Role::Student, -3600);
    let mut parts = bearer_parts(&token);
    let result = Principal::from_request_parts(&mut parts, &state).await;
    assert_eq!(result.unwrap_err(), AccessError::Unauthenticated);
}

#[tokio::test]
async fn token_signed_with_wrong_secret_is_rejected() {
    let repo = MockAuthRepo {
        identity: Some(test_identity(TEST_USER_ID, "student", &[])),
    };
    let state = create_app_state(Env::Production, repo);
    state.sessions.begin(TEST_USER_ID);

    let token = create_token_with_secret(TEST_USER_ID, Role::Student, 3600, "some-other-secret");
    let mut parts = bearer_parts(&token);
    let result = Principal::from_request_parts(&mut parts, &state).await;
    assert_eq!(result.unwrap_err(), AccessError::Unauthenticated);
}

#[tokio::test]
async fn valid_token_for_deleted_identity_is_rejected() {
    // Repo returns no identity: the user was removed after the token issued.
    let state = create_app_state(Env::Production, MockAuthRepo::default());
    state.sessions.begin(TEST_USER_ID);

    let token = create_token(TEST_USER_ID, Role::Student, 3600);
    let mut parts = bearer_parts(&token);
    let result = Principal::from_request_parts(&mut parts, &state).await;
    assert_eq!(result.unwrap_err(), AccessError::Unauthenticated);
}

#[tokio::test]
async fn valid_token_without_a_session_is_rejected() {
    // No session was ever begun (or logout ended it): a live token alone is
    // not enough.
    let repo = MockAuthRepo {
        identity: Some(test_identity(TEST_USER_ID, "student", &[])),
    };
    let state = create_app_state(Env::Production, repo);

    let token = create_token(TEST_USER_ID, Role::Student, 3600);
    let mut parts = bearer_parts(&token);
    let result = Principal::from_request_parts(&mut parts, &state).await;
    assert_eq!(result.unwrap_err(), AccessError::Unauthenticated);
}

#[tokio::test]
async fn idle_expired_session_outranks_a_live_token() {
    let repo = MockAuthRepo {
        identity: Some(test_identity(TEST_USER_ID, "admin", &[])),
    };
    let state = create_app_state(Env::Production, repo);
    let timeout = state.config.session_timeout_secs;
    state
        .sessions
        .begin_at(TEST_USER_ID, Utc::now() - Duration::seconds(timeout + 1));

    let token = create_token(TEST_USER_ID, Role::Admin, 3600);
    let mut parts = bearer_parts(&token);
    let result = Principal::from_request_parts(&mut parts, &state).await;
    assert_eq!(result.unwrap_err(), AccessError::Unauthenticated);
}

#[tokio::test]
async fn successful_extraction_touches_the_session() {
    let repo = MockAuthRepo {
        identity: Some(test_identity(TEST_USER_ID, "student", &[])),
    };
    let state = create_app_state(Env::Production, repo);
    let timeout = state.config.session_timeout_secs;
    // Half-spent session.
    state
        .sessions
        .begin_at(TEST_USER_ID, Utc::now() - Duration::seconds(timeout / 2));

    let token = create_token(TEST_USER_ID, Role::Student, 3600);
    let mut parts = bearer_parts(&token);
    Principal::from_request_parts(&mut parts, &state).await.unwrap();

    // The request itself was an activity signal.
    let remaining = state.sessions.remaining(TEST_USER_ID).unwrap();
    assert!(remaining > Duration::seconds(timeout - 5));
}

#[tokio::test]
async fn identity_with_unknown_role_fails_closed() {
    let repo = MockAuthRepo {
        identity: Some(test_identity(TEST_USER_ID, "superuser", &[])),
    };
    let state = create_app_state(Env::Production, repo);
    state.sessions.begin(TEST_USER_ID);

    let token = create_token(TEST_USER_ID, Role::Student, 3600);
    let mut parts = bearer_parts(&token);
    let result = Principal::from_request_parts(&mut parts, &state).await;
    assert_eq!(result.unwrap_err(), AccessError::Configuration);
}

// --- Local Bypass Tests ---

#[tokio::test]
async fn local_bypass_resolves_principal_and_begins_session() {
    let id = Uuid::new_v4();
    let repo = MockAuthRepo {
        identity: Some(test_identity(id, "admin", &[])),
    };
    let state = create_app_state(Env::Local, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&id.to_string()).unwrap(),
    );

    let principal = Principal::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(principal.id, id);
    assert_eq!(principal.role, Role::Admin);
    assert!(!state.sessions.is_expired(id));
}

#[tokio::test]
async fn local_bypass_disabled_in_production() {
    let id = Uuid::new_v4();
    let repo = MockAuthRepo {
        identity: Some(test_identity(id, "admin", &[])),
    };
    let state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&id.to_string()).unwrap(),
    );

    let result = Principal::from_request_parts(&mut parts, &state).await;
    assert_eq!(result.unwrap_err(), AccessError::Unauthenticated);
}

// --- Credential Path Tests ---

fn identity_with_password(id: Uuid, email: &str, role: &str, password: &str) -> StoredIdentity {
    StoredIdentity {
        id,
        email: email.to_string(),
        role: role.to_string(),
        secret_hash: auth::hash_secret(password).unwrap(),
        permissions: vec![],
    }
}

#[tokio::test]
async fn credential_login_succeeds_and_begins_session() {
    let id = Uuid::new_v4();
    let repo = MockAuthRepo {
        identity: Some(identity_with_password(id, "alice@campus.edu", "accountant", "hunter2xyz")),
    };
    let state = create_app_state(Env::Production, repo);

    let (principal, token) = auth::authenticate_credentials(
        &state.repo,
        &state.sessions,
        &state.config,
        "alice@campus.edu",
        "hunter2xyz",
    )
    .await
    .unwrap();

    assert_eq!(principal.id, id);
    assert_eq!(principal.role, Role::Accountant);
    assert!(!state.sessions.is_expired(id));

    // The issued token must verify against the same secret.
    let claims = auth::decode_token(&state.config.jwt_secret, &token).unwrap();
    assert_eq!(claims.sub, id);
    assert_eq!(claims.role, Role::Accountant);
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_indistinguishable() {
    let id = Uuid::new_v4();
    let repo = MockAuthRepo {
        identity: Some(identity_with_password(id, "alice@campus.edu", "accountant", "hunter2xyz")),
    };
    let state = create_app_state(Env::Production, repo);

    let wrong_password = auth::authenticate_credentials(
        &state.repo,
        &state.sessions,
        &state.config,
        "alice@campus.edu",
        "wrong-password",
    )
    .await
    .unwrap_err();

    let unknown_email = auth::authenticate_credentials(
        &state.repo,
        &state.sessions,
        &state.config,
        "nobody@campus.edu",
        "hunter2xyz",
    )
    .await
    .unwrap_err();

    // Same error value for both, so responses cannot be used to probe emails.
    assert_eq!(wrong_password, AccessError::InvalidCredentials);
    assert_eq!(unknown_email, AccessError::InvalidCredentials);

    // No session was established by either failure.
    assert!(state.sessions.is_expired(id));
}

#[tokio::test]
async fn email_lookup_is_case_sensitive() {
    let id = Uuid::new_v4();
    let repo = MockAuthRepo {
        identity: Some(identity_with_password(id, "Alice@campus.edu", "staff", "hunter2xyz")),
    };
    let state = create_app_state(Env::Production, repo);

    let result = auth::authenticate_credentials(
        &state.repo,
        &state.sessions,
        &state.config,
        "alice@campus.edu",
        "hunter2xyz",
    )
    .await;
    assert_eq!(result.unwrap_err(), AccessError::InvalidCredentials);
}

#[tokio::test]
async fn hash_secret_round_trips_and_salts() {
    let first = auth::hash_secret("correct horse battery staple").unwrap();
    let second = auth::hash_secret("correct horse battery staple").unwrap();
    // OS-random salt: equal inputs never produce equal PHC strings.
    assert_ne!(first, second);
    assert!(first.starts_with("$argon2"));
}
