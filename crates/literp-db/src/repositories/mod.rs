//! Repository implementations
//!
//! This module contains concrete implementations of the repository traits
//! defined in literp-core, using sqlx for PostgreSQL access.

pub mod booking_repo;
pub mod equipment_repo;
pub mod invoice_repo;

pub use booking_repo::PgBookingRepository;
pub use equipment_repo::PgEquipmentRepository;
pub use invoice_repo::PgInvoiceRepository;

/// SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Whether a sqlx error is a unique-constraint violation
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

/// Parse a stored status string, falling back to the type's default
pub(crate) fn parse_or_default<T: Default>(raw: &str, parse: fn(&str) -> Option<T>) -> T {
    match parse(raw) {
        Some(v) => v,
        None => {
            tracing::warn!("Unknown stored value '{}', using default", raw);
            T::default()
        }
    }
}
