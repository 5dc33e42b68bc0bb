use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::auth::Principal;
use crate::session::SessionStore;

/// Permission Vocabulary
///
/// The canonical, fine-grained capability identifiers used across the ERP.
/// Permissions are plain strings on the wire (and in the `identities.permissions`
/// column); this module pins the spelling so handlers and the registry never
/// drift apart.
pub mod perm {
    /// Sentinel meaning "all permissions granted". Used by the admin role's
    /// registry entry and absorbed by any permission set it is inserted into.
    pub const WILDCARD: &str = "*";

    // Academic
    pub const VIEW_COURSES: &str = "view_courses";
    pub const MANAGE_COURSES: &str = "manage_courses";
    pub const GRADE_STUDENTS: &str = "grade_students";
    pub const SUBMIT_ASSIGNMENTS: &str = "submit_assignments";
    pub const VIEW_GRADES: &str = "view_grades";

    // Finance
    pub const VIEW_INVOICES: &str = "view_invoices";
    pub const MANAGE_INVOICES: &str = "manage_invoices";
    pub const APPROVE_PAYMENTS: &str = "approve_payments";

    // HR
    pub const VIEW_EMPLOYEES: &str = "view_employees";
    pub const MANAGE_EMPLOYEES: &str = "manage_employees";
    pub const APPROVE_LEAVE: &str = "approve_leave";
    pub const REQUEST_LEAVE: &str = "request_leave";
    pub const RECORD_ATTENDANCE: &str = "record_attendance";

    // Marketing / reporting
    pub const MANAGE_CAMPAIGNS: &str = "manage_campaigns";
    pub const VIEW_REPORTS: &str = "view_reports";
}

/// Role
///
/// The closed enumeration of principal categories. A principal always carries
/// exactly one role; the role determines its *default* permission set via the
/// RoleRegistry, which explicit per-identity permissions may extend but never
/// narrow.
///
/// The enumeration is deliberately closed: unknown role strings are rejected at
/// the type boundary (`FromStr` / serde) rather than compared at check time,
/// pushing fail-closed behavior to construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    Admin,
    Student,
    Instructor,
    Staff,
    HrManager,
    Accountant,
    MarketingOfficer,
}

/// Error returned when a role string is outside the closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    /// The wire/database spelling of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Staff => "staff",
            Role::HrManager => "hr_manager",
            Role::Accountant => "accountant",
            Role::MarketingOfficer => "marketing_officer",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            "staff" => Ok(Role::Staff),
            "hr_manager" => Ok(Role::HrManager),
            "accountant" => Ok(Role::Accountant),
            "marketing_officer" => Ok(Role::MarketingOfficer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PermissionSet
///
/// A validated set of permission identifiers with wildcard awareness. Inserting
/// `perm::WILDCARD` marks the set as all-granting; `contains` honors the mark.
/// The wildcard is absorbing: once present it cannot be narrowed away by
/// further inserts or unions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    all: bool,
    perms: HashSet<String>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from any iterator of identifiers, routing the wildcard
    /// sentinel to the all-granting mark.
    pub fn of<I, S>(perms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::new();
        for p in perms {
            set.insert(p);
        }
        set
    }

    /// The all-granting set.
    pub fn wildcard() -> Self {
        Self {
            all: true,
            perms: HashSet::new(),
        }
    }

    pub fn insert(&mut self, p: impl Into<String>) {
        let p = p.into();
        if p == perm::WILDCARD {
            self.all = true;
        } else {
            self.perms.insert(p);
        }
    }

    /// True when the set carries the wildcard mark.
    pub fn grants_all(&self) -> bool {
        self.all
    }

    pub fn contains(&self, p: &str) -> bool {
        self.all || self.perms.contains(p)
    }

    pub fn is_empty(&self) -> bool {
        !self.all && self.perms.is_empty()
    }

    /// Set union. The wildcard absorbs everything.
    pub fn union(&self, other: &Self) -> Self {
        if self.all || other.all {
            return Self::wildcard();
        }
        Self {
            all: false,
            perms: self.perms.union(&other.perms).cloned().collect(),
        }
    }
}

/// RoleRegistry
///
/// The process-wide mapping from role to default permission set. Constructed
/// once at startup, wrapped in an `Arc`, and read-only thereafter: no runtime
/// mutation API is reachable from request handling, so concurrent readers never
/// race with writers.
///
/// Lookups are fail-closed: a role with no registry entry resolves to the empty
/// permission set, never the wildcard, and never an error.
pub struct RoleRegistry {
    grants: HashMap<Role, PermissionSet>,
    // Returned by reference for roles absent from `grants`.
    empty: PermissionSet,
}

impl RoleRegistry {
    /// An empty registry. Useful for tests exercising fail-closed lookups;
    /// production code uses `with_defaults`.
    pub fn empty() -> Self {
        Self {
            grants: HashMap::new(),
            empty: PermissionSet::new(),
        }
    }

    /// with_defaults
    ///
    /// The standard ERP role table. Admin carries the wildcard; every other
    /// role gets the narrow set its dashboards actually use.
    pub fn with_defaults() -> Self {
        use perm::*;
        let mut registry = Self::empty();
        registry.grant(Role::Admin, PermissionSet::wildcard());
        registry.grant(
            Role::Student,
            PermissionSet::of([VIEW_COURSES, VIEW_GRADES, SUBMIT_ASSIGNMENTS]),
        );
        registry.grant(
            Role::Instructor,
            PermissionSet::of([VIEW_COURSES, MANAGE_COURSES, GRADE_STUDENTS, VIEW_GRADES]),
        );
        registry.grant(
            Role::Staff,
            PermissionSet::of([VIEW_COURSES, REQUEST_LEAVE, RECORD_ATTENDANCE]),
        );
        registry.grant(
            Role::HrManager,
            PermissionSet::of([
                VIEW_EMPLOYEES,
                MANAGE_EMPLOYEES,
                APPROVE_LEAVE,
                REQUEST_LEAVE,
                VIEW_REPORTS,
            ]),
        );
        registry.grant(
            Role::Accountant,
            PermissionSet::of([VIEW_INVOICES, MANAGE_INVOICES, APPROVE_PAYMENTS, VIEW_REPORTS]),
        );
        registry.grant(
            Role::MarketingOfficer,
            PermissionSet::of([MANAGE_CAMPAIGNS, VIEW_REPORTS]),
        );
        registry
    }

    /// Insert or replace a role's default grant. Only reachable during
    /// registry construction, before the registry is shared.
    pub fn grant(&mut self, role: Role, perms: PermissionSet) {
        self.grants.insert(role, perms);
    }

    /// permissions_for
    ///
    /// Deterministic, stable lookup of a role's default permissions. Roles
    /// missing from the registry resolve to the empty set (fail-closed).
    pub fn permissions_for(&self, role: Role) -> &PermissionSet {
        self.grants.get(&role).unwrap_or(&self.empty)
    }
}

/// Requirement
///
/// The declared access condition attached to a protected endpoint. Each field
/// is independently optional; the present fields combine via AND. An empty
/// requirement means "authenticated only, no further restriction".
///
/// Evaluation order is part of the contract (see `AccessGate::authorize`):
/// session, then role, then single permission, then all-of, then any-of.
#[derive(Debug, Clone, Default)]
pub struct Requirement {
    /// The principal's role must equal this exactly.
    pub role: Option<Role>,
    /// This permission must be held.
    pub permission: Option<String>,
    /// Every listed permission must be held.
    pub all_of: Vec<String>,
    /// At least one listed permission must be held.
    pub any_of: Vec<String>,
}

impl Requirement {
    /// Authenticated-only: any principal with a live session passes.
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Self::default()
        }
    }

    pub fn permission(p: impl Into<String>) -> Self {
        Self {
            permission: Some(p.into()),
            ..Self::default()
        }
    }

    pub fn all_of<I, S>(perms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            all_of: perms.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn any_of<I, S>(perms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            any_of: perms.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// AND in a single-permission condition (combinable with any constructor).
    pub fn and_permission(mut self, p: impl Into<String>) -> Self {
        self.permission = Some(p.into());
        self
    }

    /// AND in a role condition.
    pub fn and_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        self.role.is_none()
            && self.permission.is_none()
            && self.all_of.is_empty()
            && self.any_of.is_empty()
    }
}

/// DenyReason
///
/// The structured cause carried by every Deny. Enough detail to drive an HTTP
/// status and a UI fallback, without enumerating any permission the principal
/// holds beyond the one requirement evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No principal, or the principal's session has expired.
    Unauthenticated,
    /// The principal's role is not the required role.
    RoleMismatch,
    /// The effective permission set does not satisfy the requirement.
    MissingPermission,
}

/// Decision
///
/// The explicit result of an authorization check. Denials are ordinary values
/// the caller branches on, never exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// AccessGate
///
/// The authorization gate. Holds read-only handles to the role registry and the
/// session store; it never mutates either (session activity updates happen in
/// the authentication path, not here).
///
/// `authorize` is a synchronous, non-blocking computation over an
/// already-resolved principal, safe to run concurrently across unrelated
/// requests.
#[derive(Clone)]
pub struct AccessGate {
    registry: Arc<RoleRegistry>,
    sessions: Arc<SessionStore>,
}

impl AccessGate {
    pub fn new(registry: Arc<RoleRegistry>, sessions: Arc<SessionStore>) -> Self {
        Self { registry, sessions }
    }

    pub fn registry(&self) -> &RoleRegistry {
        &self.registry
    }

    /// authorize
    ///
    /// Evaluates a requirement against a principal as a short-circuiting
    /// conjunction, in a fixed order that is part of the contract:
    ///
    /// 1. absent principal, or expired/ended session → Deny(Unauthenticated)
    /// 2. required role mismatch → Deny(RoleMismatch) — the role check is
    ///    ordered before every permission check, so a role mismatch is
    ///    reported even when permissions would otherwise suffice
    /// 3. effective permissions = registry defaults for the role ∪ the
    ///    principal's explicit permissions (wildcard absorbs everything)
    /// 4. single required permission missing → Deny(MissingPermission)
    /// 5. any all-of element missing → Deny(MissingPermission)
    /// 6. no any-of element present → Deny(MissingPermission)
    /// 7. otherwise → Allow
    pub fn authorize(&self, principal: Option<&Principal>, requirement: &Requirement) -> Decision {
        let Some(principal) = principal else {
            return Decision::Deny(DenyReason::Unauthenticated);
        };
        if self.sessions.is_expired(principal.id) {
            return Decision::Deny(DenyReason::Unauthenticated);
        }

        if let Some(required) = requirement.role {
            if principal.role != required {
                return Decision::Deny(DenyReason::RoleMismatch);
            }
        }

        // Membership is checked against both sources rather than materializing
        // the union set on every request.
        let defaults = self.registry.permissions_for(principal.role);
        let holds = |p: &str| defaults.contains(p) || principal.permissions.contains(p);

        if let Some(p) = &requirement.permission {
            if !holds(p) {
                return Decision::Deny(DenyReason::MissingPermission);
            }
        }
        if !requirement.all_of.is_empty() && !requirement.all_of.iter().all(|p| holds(p)) {
            return Decision::Deny(DenyReason::MissingPermission);
        }
        if !requirement.any_of.is_empty() && !requirement.any_of.iter().any(|p| holds(p)) {
            return Decision::Deny(DenyReason::MissingPermission);
        }

        Decision::Allow
    }
}
