//! LitERP Database Layer
//!
//! This crate provides PostgreSQL access and repository implementations
//! for the LitERP system. It includes:
//!
//! - Connection pool management with sqlx
//! - Repository implementations for equipment, bookings and invoices
//! - Row-locking transactions for booking conflict checks and payments
//!
//! The schema is managed outside this crate; no migrations are shipped.

pub mod pool;
pub mod repositories;

pub use pool::create_pool;
pub use repositories::*;

// Re-export commonly used types
pub use literp_core::{AppError, AppResult};
pub use sqlx::{PgPool, Postgres, Transaction};
