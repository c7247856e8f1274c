//! Equipment booking service
//!
//! Orchestrates equipment, bookings and maintenance:
//! - Register, update and retire equipment
//! - Create and reschedule bookings without double-booking
//! - Drive booking status transitions and their equipment side effects
//! - Log and complete maintenance

use chrono::{DateTime, Utc};
use literp_core::{
    config::BookingConfig,
    models::{
        BookingUpdate, Equipment, EquipmentBooking, EquipmentUpdate, MaintenanceRecord,
        MaintenanceUpdate, NewBooking, NewEquipment, NewMaintenanceRecord,
    },
    traits::{
        BookingFilter, BookingRepository, EquipmentFilter, EquipmentRepository, Pagination,
        PaginatedResponse,
    },
    AppError, AppResult, BookingWindow, ConflictChecker,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Booking service
pub struct BookingService<E: EquipmentRepository, B: BookingRepository> {
    equipment_repo: Arc<E>,
    booking_repo: Arc<B>,
    checker: ConflictChecker,
}

impl<E: EquipmentRepository, B: BookingRepository> BookingService<E, B> {
    /// Create a new booking service
    pub fn new(equipment_repo: Arc<E>, booking_repo: Arc<B>, config: &BookingConfig) -> Self {
        Self {
            equipment_repo,
            booking_repo,
            checker: ConflictChecker::with_blocking_statuses(&config.blocking_statuses),
        }
    }

    pub fn checker(&self) -> &ConflictChecker {
        &self.checker
    }

    /// Active equipment or NotFound
    async fn active_equipment(&self, id: i32) -> AppResult<Equipment> {
        match self.equipment_repo.find_by_id(id).await? {
            Some(equipment) if equipment.is_active => Ok(equipment),
            _ => Err(AppError::NotFound(format!("Equipment {}", id))),
        }
    }

    #[instrument(skip(self, equipment), fields(code = %equipment.code))]
    pub async fn register_equipment(&self, equipment: NewEquipment) -> AppResult<Equipment> {
        if equipment.code.trim().is_empty() || equipment.name.trim().is_empty() {
            return Err(AppError::invalid("Equipment name and code are required"));
        }
        self.equipment_repo.create(&equipment).await
    }

    pub async fn get_equipment(&self, id: i32) -> AppResult<Equipment> {
        self.equipment_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {}", id)))
    }

    pub async fn list_equipment(
        &self,
        filter: &EquipmentFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<Equipment>> {
        let (data, total) = self.equipment_repo.list(filter, pagination).await?;
        Ok(PaginatedResponse::new(data, total, pagination))
    }

    #[instrument(skip(self, update))]
    pub async fn update_equipment(&self, id: i32, update: EquipmentUpdate) -> AppResult<Equipment> {
        let mut equipment = self.get_equipment(id).await?;
        equipment.apply_update(update, Utc::now());
        self.equipment_repo.update(&equipment).await
    }

    /// Soft delete; bookings and maintenance history are kept
    #[instrument(skip(self))]
    pub async fn retire_equipment(&self, id: i32) -> AppResult<()> {
        if !self.equipment_repo.deactivate(id).await? {
            return Err(AppError::NotFound(format!("Equipment {}", id)));
        }
        info!("Retired equipment {}", id);
        Ok(())
    }

    /// Whether `[start, end)` is free on the equipment
    #[instrument(skip(self))]
    pub async fn check_availability(
        &self,
        equipment_id: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<bool> {
        let candidate = BookingWindow::candidate(equipment_id, start, end);
        candidate.validate()?;

        let existing = self
            .booking_repo
            .overlapping_windows(equipment_id, start, end)
            .await?;
        let conflict = self.checker.has_conflict(&candidate, &existing)?;

        debug!(
            "Equipment {} {} for {} - {}",
            equipment_id,
            if conflict { "busy" } else { "free" },
            start,
            end
        );
        Ok(!conflict)
    }

    /// Book equipment.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the window is empty or inverted
    /// - `NotFound` if the equipment does not exist or is retired
    /// - `BookingConflict` if a blocking booking overlaps the window
    #[instrument(skip(self, booking), fields(equipment_id = booking.equipment_id))]
    pub async fn create_booking(&self, booking: NewBooking) -> AppResult<EquipmentBooking> {
        booking.validate()?;
        self.active_equipment(booking.equipment_id).await?;

        let created = self
            .booking_repo
            .create_checked(&booking, &self.checker)
            .await
            .inspect_err(|e| {
                if let AppError::BookingConflict { booking_id, .. } = e {
                    warn!(
                        "Rejected booking on equipment {}: overlaps booking {}",
                        booking.equipment_id, booking_id
                    );
                }
            })?;

        Ok(created)
    }

    pub async fn get_booking(&self, id: i32) -> AppResult<EquipmentBooking> {
        self.booking_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {}", id)))
    }

    pub async fn list_bookings(
        &self,
        filter: &BookingFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<EquipmentBooking>> {
        let (data, total) = self.booking_repo.list(filter, pagination).await?;
        Ok(PaginatedResponse::new(data, total, pagination))
    }

    /// Apply a partial update to a booking.
    ///
    /// A booking that ends up holding its equipment is re-checked for
    /// conflicts when its window moves or it becomes blocking again. Status
    /// changes that check equipment out or back in update the equipment in
    /// the same write.
    #[instrument(skip(self, update))]
    pub async fn update_booking(
        &self,
        id: i32,
        update: BookingUpdate,
        actor_id: i32,
    ) -> AppResult<EquipmentBooking> {
        let (saved, change) = self
            .booking_repo
            .update_checked(id, update, actor_id, &self.checker)
            .await
            .inspect_err(|e| debug!("Rejected update of booking {}: {}", id, e))?;

        if change.from != saved.status {
            info!("Booking {} moved {} -> {}", id, change.from, saved.status);
        }
        Ok(saved)
    }

    /// Log maintenance against active equipment
    #[instrument(skip(self, record), fields(equipment_id = record.equipment_id))]
    pub async fn record_maintenance(
        &self,
        record: NewMaintenanceRecord,
    ) -> AppResult<MaintenanceRecord> {
        if record.description.trim().is_empty() {
            return Err(AppError::invalid("Maintenance description is required"));
        }
        self.active_equipment(record.equipment_id).await?;

        let created = self.equipment_repo.create_maintenance(&record).await?;
        info!(
            "Logged {} maintenance {} on equipment {}",
            created.maintenance_type, created.id, created.equipment_id
        );
        Ok(created)
    }

    /// Update a maintenance record; completing it stamps the equipment's
    /// maintenance dates
    #[instrument(skip(self, update))]
    pub async fn update_maintenance(
        &self,
        id: i32,
        update: MaintenanceUpdate,
    ) -> AppResult<MaintenanceRecord> {
        let mut record = self
            .equipment_repo
            .find_maintenance(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Maintenance record {}", id)))?;

        let schedule = record.apply_update(update, Utc::now());
        self.equipment_repo
            .update_maintenance(&record, &schedule)
            .await
    }

    pub async fn maintenance_history(&self, equipment_id: i32) -> AppResult<Vec<MaintenanceRecord>> {
        self.equipment_repo.list_maintenance(equipment_id).await
    }
}
