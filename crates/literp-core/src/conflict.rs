//! Booking conflict detection
//!
//! Windows are half-open: a booking ending at 17:00 does not collide with
//! one starting at 17:00.

use crate::error::AppError;
use crate::models::booking::{BookingChange, BookingStatus, EquipmentBooking};
use crate::AppResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A time window on one bookable resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingWindow {
    /// Id of the stored booking; `None` for a proposed one
    pub booking_id: Option<i32>,
    pub resource_id: i32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: BookingStatus,
}

impl BookingWindow {
    /// A proposed window that is not stored yet
    pub fn candidate(resource_id: i32, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            booking_id: None,
            resource_id,
            start,
            end,
            status: BookingStatus::Pending,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.start >= self.end {
            return Err(AppError::InvalidInput(format!(
                "Booking window start {} must be before end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    /// Half-open overlap test; both windows must already be valid
    pub fn overlaps(&self, other: &BookingWindow) -> bool {
        other.start < self.end && other.end > self.start
    }
}

impl From<&EquipmentBooking> for BookingWindow {
    fn from(b: &EquipmentBooking) -> Self {
        Self {
            booking_id: Some(b.id),
            resource_id: b.equipment_id,
            start: b.start_date,
            end: b.end_date,
            status: b.status,
        }
    }
}

/// Detects overlaps between a proposed window and existing bookings
#[derive(Debug, Clone)]
pub struct ConflictChecker {
    blocking: Vec<BookingStatus>,
}

impl Default for ConflictChecker {
    fn default() -> Self {
        Self {
            blocking: BookingStatus::default_blocking().to_vec(),
        }
    }
}

impl ConflictChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blocking_statuses(statuses: &[BookingStatus]) -> Self {
        Self {
            blocking: statuses.to_vec(),
        }
    }

    pub fn blocking_statuses(&self) -> &[BookingStatus] {
        &self.blocking
    }

    pub fn is_blocking(&self, status: BookingStatus) -> bool {
        self.blocking.contains(&status)
    }

    /// Whether an updated booking must be checked against the others on its
    /// equipment: it blocks now and either moved or has only just started
    /// blocking.
    pub fn requires_check(&self, booking: &EquipmentBooking, change: &BookingChange) -> bool {
        self.is_blocking(booking.status) && (change.rescheduled || !self.is_blocking(change.from))
    }

    /// True if any blocking booking on the candidate's resource overlaps it.
    ///
    /// Every window is validated before any comparison, so the result does
    /// not depend on the order of `existing`.
    pub fn has_conflict(
        &self,
        candidate: &BookingWindow,
        existing: &[BookingWindow],
    ) -> AppResult<bool> {
        Ok(self.find_conflict(candidate, existing, None)?.is_some())
    }

    /// First blocking booking that overlaps the candidate.
    ///
    /// `exclude` skips one stored booking, used when a booking is rescheduled
    /// and must not collide with its own previous window.
    pub fn find_conflict<'a>(
        &self,
        candidate: &BookingWindow,
        existing: &'a [BookingWindow],
        exclude: Option<i32>,
    ) -> AppResult<Option<&'a BookingWindow>> {
        candidate.validate()?;
        for window in existing {
            window.validate()?;
        }

        Ok(existing.iter().find(|w| {
            w.resource_id == candidate.resource_id
                && self.is_blocking(w.status)
                && (exclude.is_none() || w.booking_id != exclude)
                && candidate.overlaps(w)
        }))
    }
}

/// `has_conflict` with the default blocking set
pub fn has_conflict(candidate: &BookingWindow, existing: &[BookingWindow]) -> AppResult<bool> {
    ConflictChecker::default().has_conflict(candidate, existing)
}
