//! Business logic services for LitERP
//!
//! Services orchestrate the domain rules in `literp-core` over the
//! repository traits, so they run unchanged against PostgreSQL or an
//! in-memory store in tests.
//!
//! # Services
//!
//! - `BookingService` - Equipment, bookings and maintenance
//! - `InvoiceService` - Invoices, totals and payments

pub mod booking_service;
pub mod invoice_service;

pub use booking_service::BookingService;
pub use invoice_service::InvoiceService;

use literp_core::AppConfig;
use literp_db::{PgBookingRepository, PgEquipmentRepository, PgInvoiceRepository, PgPool};
use std::sync::Arc;

/// Booking service backed by PostgreSQL
pub type PgBookingService = BookingService<PgEquipmentRepository, PgBookingRepository>;

/// Invoice service backed by PostgreSQL
pub type PgInvoiceService = InvoiceService<PgInvoiceRepository>;

/// All services wired to one connection pool
pub struct Services {
    pub bookings: Arc<PgBookingService>,
    pub invoices: Arc<PgInvoiceService>,
}

impl Services {
    pub fn new(pool: PgPool, config: &AppConfig) -> Self {
        let bookings = BookingService::new(
            Arc::new(PgEquipmentRepository::new(pool.clone())),
            Arc::new(PgBookingRepository::new(pool.clone())),
            &config.booking,
        );
        let invoices = InvoiceService::new(
            Arc::new(PgInvoiceRepository::new(pool)),
            config.finance.clone(),
        );

        Self {
            bookings: Arc::new(bookings),
            invoices: Arc::new(invoices),
        }
    }
}
