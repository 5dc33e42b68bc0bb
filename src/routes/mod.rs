/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules,
/// enforcing a Defense-in-Depth strategy. Access control is applied explicitly
/// at the module level (via Axum layers) and again per-handler (via the
/// declared Requirement), preventing accidental exposure of protected
/// endpoints.

/// Routes accessible to all clients: health probe and the credential path of
/// the authentication gate.
pub mod public;

/// Routes protected by the `Principal` extractor middleware.
/// Requires a validated, non-expired session.
pub mod authenticated;

/// Routes restricted exclusively to principals with the admin role.
pub mod admin;
