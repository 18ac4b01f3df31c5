//! Staging directory identifiers

use uuid::Uuid;

/// Source of collision-resistant staging directory names.
///
/// Every value returned must satisfy [`is_identifier`].
pub trait IdentifierSource: Send + Sync {
    /// Produce a fresh identifier
    fn next_id(&self) -> String;
}

/// Random (v4) UUID identifiers
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidSource;

impl IdentifierSource for UuidSource {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Whether `name` matches the identifier pattern `[A-Za-z0-9-]+`.
///
/// The reclaimer only ever touches directories passing this check.
pub fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
