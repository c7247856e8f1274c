//! In-memory repositories for service tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use literp_core::{
    models::{
        BookingChange, BookingStatus, BookingUpdate, Equipment, EquipmentBooking,
        EquipmentCategory, EquipmentStatus, Invoice, InvoiceChange, InvoiceItem, InvoiceStatus,
        InvoiceUpdate, MaintenanceRecord, MaintenanceSchedule, NewBooking, NewEquipment,
        NewMaintenanceRecord, NewPayment, PaymentRecord, PreparedInvoice,
    },
    traits::{
        BookingFilter, BookingRepository, EquipmentFilter, EquipmentRepository, InvoiceFilter,
        InvoiceRepository, Pagination,
    },
    AppError, AppResult, BookingWindow, ConflictChecker,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;

fn page<T: Clone>(items: Vec<T>, pagination: &Pagination) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let data = items
        .into_iter()
        .skip(pagination.offset() as usize)
        .take(pagination.limit() as usize)
        .collect();
    (data, total)
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
}

pub fn new_camera(code: &str) -> NewEquipment {
    NewEquipment {
        name: "Cinema camera".to_string(),
        code: code.to_string(),
        category: EquipmentCategory::Camera,
        brand: Some("RED".to_string()),
        model: Some("Komodo".to_string()),
        serial_number: None,
        description: None,
        purchase_date: None,
        purchase_price: None,
        current_value: None,
        storage_location: Some("Cage A".to_string()),
        is_rentable: true,
        daily_rate: None,
        weekly_rate: None,
        notes: None,
    }
}

pub fn new_booking(equipment_id: i32, start: DateTime<Utc>, end: DateTime<Utc>) -> NewBooking {
    NewBooking {
        equipment_id,
        project_id: Some(1),
        booked_by_id: 7,
        start_date: start,
        end_date: end,
        purpose: Some("Shoot".to_string()),
        notes: None,
    }
}

#[derive(Default)]
struct EquipmentState {
    equipment: Vec<Equipment>,
    maintenance: Vec<MaintenanceRecord>,
    bookings: Vec<EquipmentBooking>,
}

/// Equipment, maintenance and bookings sharing one lock, so a checked
/// booking write is atomic the way the PostgreSQL row lock makes it
#[derive(Default)]
pub struct MemoryEquipmentStore {
    state: Mutex<EquipmentState>,
}

impl MemoryEquipmentStore {
    pub fn equipment_status(&self, id: i32) -> Option<EquipmentStatus> {
        self.state
            .lock()
            .equipment
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.status)
    }

    pub fn equipment(&self, id: i32) -> Option<Equipment> {
        self.state
            .lock()
            .equipment
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    fn windows(state: &EquipmentState, equipment_id: i32) -> Vec<BookingWindow> {
        state
            .bookings
            .iter()
            .filter(|b| b.equipment_id == equipment_id)
            .map(BookingWindow::from)
            .collect()
    }

    fn check(
        state: &EquipmentState,
        checker: &ConflictChecker,
        candidate: &BookingWindow,
        exclude: Option<i32>,
    ) -> AppResult<()> {
        if !state
            .equipment
            .iter()
            .any(|e| e.id == candidate.resource_id && e.is_active)
        {
            return Err(AppError::NotFound(format!(
                "Equipment {}",
                candidate.resource_id
            )));
        }

        let existing = Self::windows(state, candidate.resource_id);
        if let Some(hit) = checker.find_conflict(candidate, &existing, exclude)? {
            return Err(AppError::BookingConflict {
                equipment_id: candidate.resource_id,
                booking_id: hit.booking_id.unwrap_or_default(),
            });
        }
        Ok(())
    }

    fn apply_schedule(state: &mut EquipmentState, equipment_id: i32, schedule: &MaintenanceSchedule) {
        if let Some(equipment) = state.equipment.iter_mut().find(|e| e.id == equipment_id) {
            schedule.apply_to(equipment, Utc::now());
        }
    }
}

#[async_trait]
impl EquipmentRepository for MemoryEquipmentStore {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Equipment>> {
        Ok(self.equipment(id))
    }

    async fn find_by_code(&self, code: &str) -> AppResult<Option<Equipment>> {
        Ok(self
            .state
            .lock()
            .equipment
            .iter()
            .find(|e| e.code == code)
            .cloned())
    }

    async fn list(
        &self,
        filter: &EquipmentFilter,
        pagination: &Pagination,
    ) -> AppResult<(Vec<Equipment>, i64)> {
        let items: Vec<Equipment> = self
            .state
            .lock()
            .equipment
            .iter()
            .rev()
            .filter(|e| filter.include_inactive || e.is_active)
            .filter(|e| filter.category.map_or(true, |c| e.category == c))
            .filter(|e| filter.status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        Ok(page(items, pagination))
    }

    async fn create(&self, new: &NewEquipment) -> AppResult<Equipment> {
        let mut state = self.state.lock();
        if state.equipment.iter().any(|e| e.code == new.code) {
            return Err(AppError::AlreadyExists(format!(
                "Equipment {} already exists",
                new.code
            )));
        }

        let equipment = Equipment {
            id: state.equipment.len() as i32 + 1,
            name: new.name.clone(),
            code: new.code.clone(),
            category: new.category,
            brand: new.brand.clone(),
            model: new.model.clone(),
            serial_number: new.serial_number.clone(),
            description: new.description.clone(),
            status: EquipmentStatus::Available,
            condition_notes: None,
            purchase_date: new.purchase_date,
            purchase_price: new.purchase_price,
            current_value: new.current_value,
            storage_location: new.storage_location.clone(),
            current_location: None,
            is_rentable: new.is_rentable,
            daily_rate: new.daily_rate,
            weekly_rate: new.weekly_rate,
            last_maintenance_date: None,
            next_maintenance_date: None,
            notes: new.notes.clone(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        };
        state.equipment.push(equipment.clone());
        Ok(equipment)
    }

    async fn update(&self, equipment: &Equipment) -> AppResult<Equipment> {
        let mut state = self.state.lock();
        let slot = state
            .equipment
            .iter_mut()
            .find(|e| e.id == equipment.id)
            .ok_or_else(|| AppError::NotFound(format!("Equipment {}", equipment.id)))?;
        *slot = equipment.clone();
        Ok(slot.clone())
    }

    async fn set_status(&self, id: i32, status: EquipmentStatus) -> AppResult<()> {
        let mut state = self.state.lock();
        let slot = state
            .equipment
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Equipment {}", id)))?;
        slot.status = status;
        Ok(())
    }

    async fn deactivate(&self, id: i32) -> AppResult<bool> {
        let mut state = self.state.lock();
        match state.equipment.iter_mut().find(|e| e.id == id && e.is_active) {
            Some(e) => {
                e.deactivate(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_maintenance(
        &self,
        record: &NewMaintenanceRecord,
    ) -> AppResult<MaintenanceRecord> {
        let mut state = self.state.lock();
        let created = MaintenanceRecord {
            id: state.maintenance.len() as i32 + 1,
            equipment_id: record.equipment_id,
            maintenance_type: record.maintenance_type,
            description: record.description.clone(),
            scheduled_date: record.scheduled_date,
            completed_date: None,
            cost: record.cost,
            vendor: record.vendor.clone(),
            performed_by: record.performed_by.clone(),
            performed_by_id: record.performed_by_id,
            findings: record.findings.clone(),
            parts_replaced: record.parts_replaced.clone(),
            next_maintenance_date: record.next_maintenance_date,
            notes: record.notes.clone(),
            created_at: Utc::now(),
            updated_at: None,
        };
        state.maintenance.push(created.clone());
        Self::apply_schedule(&mut state, record.equipment_id, &record.schedule());
        Ok(created)
    }

    async fn find_maintenance(&self, id: i32) -> AppResult<Option<MaintenanceRecord>> {
        Ok(self
            .state
            .lock()
            .maintenance
            .iter()
            .find(|m| m.id == id)
            .cloned())
    }

    async fn update_maintenance(
        &self,
        record: &MaintenanceRecord,
        schedule: &MaintenanceSchedule,
    ) -> AppResult<MaintenanceRecord> {
        let mut state = self.state.lock();
        let slot = state
            .maintenance
            .iter_mut()
            .find(|m| m.id == record.id)
            .ok_or_else(|| AppError::NotFound(format!("Maintenance record {}", record.id)))?;
        *slot = record.clone();
        Self::apply_schedule(&mut state, record.equipment_id, schedule);
        Ok(record.clone())
    }

    async fn list_maintenance(&self, equipment_id: i32) -> AppResult<Vec<MaintenanceRecord>> {
        Ok(self
            .state
            .lock()
            .maintenance
            .iter()
            .rev()
            .filter(|m| m.equipment_id == equipment_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BookingRepository for MemoryEquipmentStore {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<EquipmentBooking>> {
        Ok(self
            .state
            .lock()
            .bookings
            .iter()
            .find(|b| b.id == id)
            .cloned())
    }

    async fn list(
        &self,
        filter: &BookingFilter,
        pagination: &Pagination,
    ) -> AppResult<(Vec<EquipmentBooking>, i64)> {
        let mut items: Vec<EquipmentBooking> = self
            .state
            .lock()
            .bookings
            .iter()
            .filter(|b| filter.equipment_id.map_or(true, |id| b.equipment_id == id))
            .filter(|b| filter.project_id.map_or(true, |id| b.project_id == Some(id)))
            .filter(|b| filter.status.map_or(true, |s| b.status == s))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(page(items, pagination))
    }

    async fn overlapping_windows(
        &self,
        equipment_id: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<BookingWindow>> {
        let state = self.state.lock();
        Ok(Self::windows(&state, equipment_id)
            .into_iter()
            .filter(|w| w.start < end && w.end > start)
            .collect())
    }

    async fn create_checked(
        &self,
        booking: &NewBooking,
        checker: &ConflictChecker,
    ) -> AppResult<EquipmentBooking> {
        let mut state = self.state.lock();
        let candidate =
            BookingWindow::candidate(booking.equipment_id, booking.start_date, booking.end_date);
        Self::check(&state, checker, &candidate, None)?;

        let created = EquipmentBooking {
            id: state.bookings.len() as i32 + 1,
            equipment_id: booking.equipment_id,
            project_id: booking.project_id,
            booked_by_id: booking.booked_by_id,
            start_date: booking.start_date,
            end_date: booking.end_date,
            status: BookingStatus::Pending,
            checked_out_at: None,
            checked_out_by_id: None,
            returned_at: None,
            returned_to_id: None,
            return_condition: None,
            damage_reported: false,
            damage_notes: None,
            purpose: booking.purpose.clone(),
            notes: booking.notes.clone(),
            created_at: Utc::now(),
            updated_at: None,
        };
        state.bookings.push(created.clone());
        Ok(created)
    }

    async fn update_checked(
        &self,
        id: i32,
        update: BookingUpdate,
        actor_id: i32,
        checker: &ConflictChecker,
    ) -> AppResult<(EquipmentBooking, BookingChange)> {
        let mut state = self.state.lock();
        let mut booking = state
            .bookings
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Booking {}", id)))?;

        let change = booking.apply_update(update, actor_id, Utc::now())?;
        if checker.requires_check(&booking, &change) {
            let candidate = BookingWindow::from(&booking);
            Self::check(&state, checker, &candidate, Some(booking.id))?;
        }

        if let Some(slot) = state.bookings.iter_mut().find(|b| b.id == id) {
            *slot = booking.clone();
        }
        if let Some(status) = change.equipment_status() {
            if let Some(e) = state
                .equipment
                .iter_mut()
                .find(|e| e.id == booking.equipment_id)
            {
                e.status = status;
            }
        }
        Ok((booking, change))
    }
}

#[derive(Default)]
struct InvoiceState {
    invoices: Vec<Invoice>,
    items: Vec<InvoiceItem>,
    payments: Vec<PaymentRecord>,
}

#[derive(Default)]
pub struct MemoryInvoiceStore {
    state: Mutex<InvoiceState>,
}

impl MemoryInvoiceStore {
    pub fn payment_count(&self) -> usize {
        self.state.lock().payments.len()
    }
}

#[async_trait]
impl InvoiceRepository for MemoryInvoiceStore {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Invoice>> {
        Ok(self
            .state
            .lock()
            .invoices
            .iter()
            .find(|i| i.id == id)
            .cloned())
    }

    async fn find_by_number(&self, invoice_number: &str) -> AppResult<Option<Invoice>> {
        Ok(self
            .state
            .lock()
            .invoices
            .iter()
            .find(|i| i.invoice_number == invoice_number)
            .cloned())
    }

    async fn list(
        &self,
        filter: &InvoiceFilter,
        pagination: &Pagination,
    ) -> AppResult<(Vec<Invoice>, i64)> {
        let items: Vec<Invoice> = self
            .state
            .lock()
            .invoices
            .iter()
            .rev()
            .filter(|i| filter.status.map_or(true, |s| i.status == s))
            .filter(|i| filter.client_id.map_or(true, |c| i.client_id == c))
            .filter(|i| filter.project_id.map_or(true, |p| i.project_id == Some(p)))
            .cloned()
            .collect();
        Ok(page(items, pagination))
    }

    async fn create(&self, prepared: &PreparedInvoice) -> AppResult<Invoice> {
        let mut state = self.state.lock();
        if state
            .invoices
            .iter()
            .any(|i| i.invoice_number == prepared.invoice_number)
        {
            return Err(AppError::AlreadyExists(format!(
                "Invoice {} already exists",
                prepared.invoice_number
            )));
        }

        let totals = &prepared.totals;
        let invoice = Invoice {
            id: state.invoices.len() as i32 + 1,
            invoice_number: prepared.invoice_number.clone(),
            client_id: prepared.client_id,
            project_id: prepared.project_id,
            billing_name: prepared.billing_name.clone(),
            billing_address: prepared.billing_address.clone(),
            billing_email: prepared.billing_email.clone(),
            issue_date: prepared.issue_date,
            due_date: prepared.due_date,
            status: InvoiceStatus::Draft,
            subtotal: totals.subtotal,
            discount_percentage: totals.discount_percentage,
            discount_amount: totals.discount_amount,
            tax_rate: totals.tax_rate,
            tax_amount: totals.tax_amount,
            total_amount: totals.total_amount,
            amount_paid: Decimal::ZERO,
            balance_due: totals.total_amount,
            currency: prepared.currency.clone(),
            notes: prepared.notes.clone(),
            terms: prepared.terms.clone(),
            payment_terms: prepared.payment_terms,
            sent_at: None,
            viewed_at: None,
            created_by_id: prepared.created_by_id,
            created_at: Utc::now(),
            updated_at: None,
        };

        for item in &prepared.items {
            let id = state.items.len() as i32 + 1;
            state.items.push(InvoiceItem {
                id,
                invoice_id: invoice.id,
                description: item.description.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                amount: item.amount,
                project_phase: item.project_phase.clone(),
                rate_type: item.rate_type.clone(),
                hours: item.hours,
                created_at: Utc::now(),
            });
        }
        state.invoices.push(invoice.clone());
        Ok(invoice)
    }

    async fn find_items(&self, invoice_id: i32) -> AppResult<Vec<InvoiceItem>> {
        Ok(self
            .state
            .lock()
            .items
            .iter()
            .filter(|i| i.invoice_id == invoice_id)
            .cloned()
            .collect())
    }

    async fn apply_update(
        &self,
        id: i32,
        update: InvoiceUpdate,
    ) -> AppResult<(Invoice, InvoiceChange)> {
        let mut state = self.state.lock();
        let items: Vec<InvoiceItem> = state
            .items
            .iter()
            .filter(|i| i.invoice_id == id)
            .cloned()
            .collect();
        let slot = state
            .invoices
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Invoice {}", id)))?;

        let mut invoice = slot.clone();
        let change = invoice.apply_update(update, &items, Utc::now())?;
        *slot = invoice.clone();
        Ok((invoice, change))
    }

    async fn record_payment(&self, payment: &NewPayment) -> AppResult<(PaymentRecord, Invoice)> {
        let mut state = self.state.lock();
        let invoice = state
            .invoices
            .iter_mut()
            .find(|i| i.id == payment.invoice_id)
            .ok_or_else(|| AppError::NotFound(format!("Invoice {}", payment.invoice_id)))?;
        invoice.record_payment(payment.amount, Utc::now())?;
        let invoice = invoice.clone();

        let record = PaymentRecord {
            id: state.payments.len() as i32 + 1,
            invoice_id: payment.invoice_id,
            amount: payment.amount,
            payment_date: payment.payment_date,
            payment_method: payment.payment_method,
            reference_number: payment.reference_number.clone(),
            notes: payment.notes.clone(),
            received_by_id: payment.received_by_id,
            created_at: Utc::now(),
        };
        state.payments.push(record.clone());
        Ok((record, invoice))
    }

    async fn list_payments(&self, invoice_id: i32) -> AppResult<Vec<PaymentRecord>> {
        Ok(self
            .state
            .lock()
            .payments
            .iter()
            .filter(|p| p.invoice_id == invoice_id)
            .cloned()
            .collect())
    }
}
