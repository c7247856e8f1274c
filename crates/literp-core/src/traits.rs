//! Common traits for repositories
//!
//! Defines the persistence seams the services are written against. The
//! PostgreSQL implementations live in `literp-db`.

use crate::conflict::{BookingWindow, ConflictChecker};
use crate::models::{
    BookingChange, BookingStatus, BookingUpdate, Equipment, EquipmentBooking, EquipmentCategory,
    EquipmentStatus, Invoice, InvoiceChange, InvoiceItem, InvoiceStatus, InvoiceUpdate,
    MaintenanceRecord, MaintenanceSchedule, NewBooking, NewEquipment, NewMaintenanceRecord,
    NewPayment, PaymentRecord, PreparedInvoice,
};
use crate::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Equipment listing filter
#[derive(Debug, Clone, Default)]
pub struct EquipmentFilter {
    pub category: Option<EquipmentCategory>,
    pub status: Option<EquipmentStatus>,
    /// Include soft-deleted equipment
    pub include_inactive: bool,
}

/// Booking listing filter
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub equipment_id: Option<i32>,
    pub project_id: Option<i32>,
    pub status: Option<BookingStatus>,
}

/// Invoice listing filter
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<i32>,
    pub project_id: Option<i32>,
}

/// Equipment repository
#[async_trait]
pub trait EquipmentRepository: Send + Sync {
    /// Find equipment by ID
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Equipment>>;

    /// Find equipment by asset tag
    async fn find_by_code(&self, code: &str) -> AppResult<Option<Equipment>>;

    /// List equipment with filtering, newest first
    async fn list(
        &self,
        filter: &EquipmentFilter,
        pagination: &Pagination,
    ) -> AppResult<(Vec<Equipment>, i64)>;

    /// Register new equipment
    async fn create(&self, equipment: &NewEquipment) -> AppResult<Equipment>;

    /// Persist all mutable fields
    async fn update(&self, equipment: &Equipment) -> AppResult<Equipment>;

    /// Set the availability status
    async fn set_status(&self, id: i32, status: EquipmentStatus) -> AppResult<()>;

    /// Soft delete
    async fn deactivate(&self, id: i32) -> AppResult<bool>;

    /// Log maintenance and apply its schedule to the equipment atomically
    async fn create_maintenance(
        &self,
        record: &NewMaintenanceRecord,
    ) -> AppResult<MaintenanceRecord>;

    async fn find_maintenance(&self, id: i32) -> AppResult<Option<MaintenanceRecord>>;

    /// Persist a maintenance record and apply `schedule` to its equipment atomically
    async fn update_maintenance(
        &self,
        record: &MaintenanceRecord,
        schedule: &MaintenanceSchedule,
    ) -> AppResult<MaintenanceRecord>;

    /// Maintenance history, newest first
    async fn list_maintenance(&self, equipment_id: i32) -> AppResult<Vec<MaintenanceRecord>>;
}

/// Equipment booking repository
///
/// Writes that can change which windows are occupied take a `ConflictChecker`
/// and must run the check and the write as one atomic step.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<EquipmentBooking>>;

    /// List bookings with filtering, latest start first
    async fn list(
        &self,
        filter: &BookingFilter,
        pagination: &Pagination,
    ) -> AppResult<(Vec<EquipmentBooking>, i64)>;

    /// Windows of every booking on `equipment_id` overlapping `[start, end)`,
    /// whatever their status
    async fn overlapping_windows(
        &self,
        equipment_id: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<BookingWindow>>;

    /// Insert a booking unless it conflicts with a blocking one
    async fn create_checked(
        &self,
        booking: &NewBooking,
        checker: &ConflictChecker,
    ) -> AppResult<EquipmentBooking>;

    /// Apply a partial update to the current stored booking atomically.
    ///
    /// The booking is locked while the update is applied. If
    /// `ConflictChecker::requires_check` holds for the result, the window is
    /// checked against the other bookings on its equipment in the same step,
    /// and any equipment status implied by the change is written with it.
    async fn update_checked(
        &self,
        id: i32,
        update: BookingUpdate,
        actor_id: i32,
        checker: &ConflictChecker,
    ) -> AppResult<(EquipmentBooking, BookingChange)>;
}

/// Invoice repository
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Invoice>>;

    async fn find_by_number(&self, invoice_number: &str) -> AppResult<Option<Invoice>>;

    /// List invoices with filtering, newest first
    async fn list(
        &self,
        filter: &InvoiceFilter,
        pagination: &Pagination,
    ) -> AppResult<(Vec<Invoice>, i64)>;

    /// Insert an invoice with its items
    async fn create(&self, invoice: &PreparedInvoice) -> AppResult<Invoice>;

    async fn find_items(&self, invoice_id: i32) -> AppResult<Vec<InvoiceItem>>;

    /// Apply a partial update to the current stored invoice atomically.
    ///
    /// Runs under the same row lock as `record_payment`, so the ledger the
    /// update sees always includes every payment committed before it.
    async fn apply_update(
        &self,
        id: i32,
        update: InvoiceUpdate,
    ) -> AppResult<(Invoice, InvoiceChange)>;

    /// Record a payment and update the invoice ledger atomically.
    ///
    /// The invoice is locked for the duration so concurrent payments
    /// serialize.
    async fn record_payment(&self, payment: &NewPayment) -> AppResult<(PaymentRecord, Invoice)>;

    async fn list_payments(&self, invoice_id: i32) -> AppResult<Vec<PaymentRecord>>;
}

/// Pagination parameters
#[derive(Debug, Clone)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, 100)
    }
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 1000),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

/// Paginated result wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: i64, pagination: &Pagination) -> Self {
        Self {
            data,
            pagination: PaginationMeta::new(total, pagination.page, pagination.per_page),
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };

        Self {
            total,
            page,
            per_page,
            total_pages,
        }
    }
}
