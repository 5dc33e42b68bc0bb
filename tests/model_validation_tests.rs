use erp_portal::models::{IdentitySummary, StoredIdentity};
use erp_portal::rbac::{PermissionSet, Requirement, Role, perm};
use uuid::Uuid;

// --- Role Parsing & Serialization ---

#[test]
fn every_role_round_trips_through_its_wire_spelling() {
    let roles = [
        Role::Admin,
        Role::Student,
        Role::Instructor,
        Role::Staff,
        Role::HrManager,
        Role::Accountant,
        Role::MarketingOfficer,
    ];
    for role in roles {
        assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
    }
}

#[test]
fn unknown_role_strings_are_rejected_at_the_type_boundary() {
    let err = "superuser".parse::<Role>().unwrap_err();
    assert_eq!(err.to_string(), "unknown role: superuser");
    // Case matters: the wire spelling is lowercase snake_case.
    assert!("Admin".parse::<Role>().is_err());
    assert!("".parse::<Role>().is_err());
}

#[test]
fn role_serde_uses_snake_case() {
    assert_eq!(serde_json::to_string(&Role::HrManager).unwrap(), "\"hr_manager\"");
    let role: Role = serde_json::from_str("\"marketing_officer\"").unwrap();
    assert_eq!(role, Role::MarketingOfficer);
    // Unknown values fail deserialization instead of defaulting.
    assert!(serde_json::from_str::<Role>("\"root\"").is_err());
}

// --- PermissionSet ---

#[test]
fn wildcard_insert_marks_the_set_all_granting() {
    let mut set = PermissionSet::new();
    assert!(set.is_empty());
    set.insert(perm::WILDCARD);
    assert!(set.grants_all());
    assert!(set.contains("anything"));
    assert!(!set.is_empty());
}

#[test]
fn wildcard_absorbs_in_unions() {
    let narrow = PermissionSet::of([perm::VIEW_COURSES]);
    let all = PermissionSet::wildcard();
    assert!(narrow.union(&all).grants_all());
    assert!(all.union(&narrow).grants_all());

    let other = PermissionSet::of([perm::VIEW_GRADES]);
    let merged = narrow.union(&other);
    assert!(merged.contains(perm::VIEW_COURSES));
    assert!(merged.contains(perm::VIEW_GRADES));
    assert!(!merged.grants_all());
}

#[test]
fn of_builder_routes_the_sentinel() {
    let set = PermissionSet::of([perm::VIEW_COURSES, perm::WILDCARD]);
    assert!(set.grants_all());
    assert!(set.contains("never_mentioned"));
}

// --- Requirement Builders ---

#[test]
fn authenticated_requirement_is_unrestricted() {
    assert!(Requirement::authenticated().is_unrestricted());
    assert!(!Requirement::role(Role::Admin).is_unrestricted());
    assert!(!Requirement::permission(perm::VIEW_COURSES).is_unrestricted());
    assert!(!Requirement::all_of([perm::VIEW_COURSES]).is_unrestricted());
    assert!(!Requirement::any_of([perm::VIEW_COURSES]).is_unrestricted());
}

#[test]
fn builders_compose_role_and_permission() {
    let requirement = Requirement::role(Role::HrManager).and_permission(perm::APPROVE_LEAVE);
    assert_eq!(requirement.role, Some(Role::HrManager));
    assert_eq!(requirement.permission.as_deref(), Some(perm::APPROVE_LEAVE));

    let reversed = Requirement::permission(perm::APPROVE_LEAVE).and_role(Role::HrManager);
    assert_eq!(reversed.role, Some(Role::HrManager));
    assert_eq!(reversed.permission.as_deref(), Some(perm::APPROVE_LEAVE));
}

// --- Identity Summary ---

#[test]
fn identity_summary_drops_the_secret_hash() {
    let stored = StoredIdentity {
        id: Uuid::from_u128(1),
        email: "root@campus.edu".to_string(),
        role: "admin".to_string(),
        secret_hash: "$argon2id$v=19$m=19456,t=2,p=1$abc$def".to_string(),
        permissions: vec![perm::VIEW_REPORTS.to_string()],
    };
    let summary = IdentitySummary::from(stored);

    assert_eq!(summary.role, Role::Admin);
    assert_eq!(summary.email, "root@campus.edu");
    assert_eq!(summary.permissions, vec![perm::VIEW_REPORTS.to_string()]);

    let json = serde_json::to_value(&summary).unwrap();
    assert!(json.get("secret_hash").is_none());
}
