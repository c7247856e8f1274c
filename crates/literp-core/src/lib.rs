//! LitERP Core Library
//!
//! This crate provides the foundational types, calculators, and error handling
//! for the LitERP system. It includes:
//!
//! - Domain models (Equipment, Booking, Invoice, Expense, Budget, etc.)
//! - Booking conflict detection over half-open time windows
//! - Invoice totals and payment ledger arithmetic with exact decimals
//! - Status transition tables with explicit side effects
//! - Common traits for repositories
//! - Unified error handling and application configuration
//!
//! Nothing in this crate performs I/O.

pub mod config;
pub mod conflict;
pub mod error;
pub mod finance;
pub mod logging;
pub mod models;
pub mod traits;
pub mod transitions;

pub use config::AppConfig;
pub use conflict::{BookingWindow, ConflictChecker};
pub use error::AppError;
pub use finance::{InvoiceTotals, LineItem, PaymentLedgerState};

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
