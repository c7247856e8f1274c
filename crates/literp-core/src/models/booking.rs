//! Equipment booking models
//!
//! A booking reserves one piece of equipment for a time window. Its
//! lifecycle runs pending → confirmed → checked_out → returned, with
//! cancellation possible before check-out.

use crate::error::AppError;
use crate::transitions::{TransitionMode, TransitionRule, TransitionTable};
use crate::AppResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Requested, awaiting confirmation
    #[default]
    Pending,
    Confirmed,
    /// Equipment has left storage
    CheckedOut,
    Returned,
    Cancelled,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "pending"),
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::CheckedOut => write!(f, "checked_out"),
            BookingStatus::Returned => write!(f, "returned"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl BookingStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "checked_out" => Some(BookingStatus::CheckedOut),
            "returned" => Some(BookingStatus::Returned),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Statuses that occupy equipment unless configured otherwise
    pub fn default_blocking() -> &'static [BookingStatus] {
        &[
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::CheckedOut,
        ]
    }

    pub fn is_final(&self) -> bool {
        matches!(self, BookingStatus::Returned | BookingStatus::Cancelled)
    }
}

/// Side effects of a booking status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingEffect {
    /// Record checked_out_at and the acting user
    StampCheckedOut,
    /// Record returned_at and the acting user
    StampReturned,
    MarkEquipmentInUse,
    MarkEquipmentAvailable,
}

pub static BOOKING_TRANSITIONS: TransitionTable<BookingStatus, BookingEffect> =
    TransitionTable::new(
        "booking",
        TransitionMode::Strict,
        &[
            TransitionRule {
                from: &[BookingStatus::Pending],
                to: BookingStatus::Confirmed,
                effects: &[],
            },
            TransitionRule {
                from: &[BookingStatus::Pending, BookingStatus::Confirmed],
                to: BookingStatus::CheckedOut,
                effects: &[
                    BookingEffect::StampCheckedOut,
                    BookingEffect::MarkEquipmentInUse,
                ],
            },
            TransitionRule {
                from: &[BookingStatus::CheckedOut],
                to: BookingStatus::Returned,
                effects: &[
                    BookingEffect::StampReturned,
                    BookingEffect::MarkEquipmentAvailable,
                ],
            },
            TransitionRule {
                from: &[BookingStatus::Pending, BookingStatus::Confirmed],
                to: BookingStatus::Cancelled,
                effects: &[],
            },
        ],
    );

/// Equipment booking entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentBooking {
    pub id: i32,
    pub equipment_id: i32,
    pub project_id: Option<i32>,
    pub booked_by_id: i32,

    /// Window start (inclusive)
    pub start_date: DateTime<Utc>,
    /// Window end (exclusive)
    pub end_date: DateTime<Utc>,

    pub status: BookingStatus,

    pub checked_out_at: Option<DateTime<Utc>>,
    pub checked_out_by_id: Option<i32>,
    pub returned_at: Option<DateTime<Utc>>,
    pub returned_to_id: Option<i32>,

    pub return_condition: Option<String>,
    pub damage_reported: bool,
    pub damage_notes: Option<String>,

    pub purpose: Option<String>,
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request to book equipment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub equipment_id: i32,
    pub project_id: Option<i32>,
    pub booked_by_id: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub purpose: Option<String>,
    pub notes: Option<String>,
}

impl NewBooking {
    pub fn validate(&self) -> AppResult<()> {
        validate_window(self.start_date, self.end_date)
    }
}

/// Partial booking update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingUpdate {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<BookingStatus>,
    pub purpose: Option<String>,
    pub return_condition: Option<String>,
    pub damage_reported: Option<bool>,
    pub damage_notes: Option<String>,
    pub notes: Option<String>,
}

impl BookingUpdate {
    pub fn changes_window(&self) -> bool {
        self.start_date.is_some() || self.end_date.is_some()
    }
}

/// Outcome of applying a `BookingUpdate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingChange {
    /// Status before the update
    pub from: BookingStatus,
    pub effects: &'static [BookingEffect],
    pub rescheduled: bool,
}

impl BookingChange {
    /// Equipment status implied by the applied effects, if any
    pub fn equipment_status(&self) -> Option<super::equipment::EquipmentStatus> {
        use super::equipment::EquipmentStatus;
        self.effects.iter().rev().find_map(|e| match e {
            BookingEffect::MarkEquipmentInUse => Some(EquipmentStatus::InUse),
            BookingEffect::MarkEquipmentAvailable => Some(EquipmentStatus::Available),
            _ => None,
        })
    }
}

fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<()> {
    if start >= end {
        return Err(AppError::InvalidInput(format!(
            "Booking start {} must be before end {}",
            start, end
        )));
    }
    Ok(())
}

impl EquipmentBooking {
    /// True while the booking occupies its equipment under `blocking`
    pub fn is_blocking(&self, blocking: &[BookingStatus]) -> bool {
        blocking.contains(&self.status)
    }

    /// Window this booking would occupy after `update`
    pub fn window_after(&self, update: &BookingUpdate) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            update.start_date.unwrap_or(self.start_date),
            update.end_date.unwrap_or(self.end_date),
        )
    }

    /// Apply a partial update.
    ///
    /// Validation happens before any field is written, so a rejected update
    /// leaves the booking untouched. Conflict detection for a new window is
    /// the caller's job.
    pub fn apply_update(
        &mut self,
        update: BookingUpdate,
        actor_id: i32,
        now: DateTime<Utc>,
    ) -> AppResult<BookingChange> {
        let (start, end) = self.window_after(&update);
        validate_window(start, end)?;

        let from = self.status;
        let effects: &'static [BookingEffect] = match update.status {
            Some(to) => BOOKING_TRANSITIONS.resolve(self.status, to)?,
            None => &[],
        };

        let rescheduled = start != self.start_date || end != self.end_date;
        self.start_date = start;
        self.end_date = end;

        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(purpose) = update.purpose {
            self.purpose = Some(purpose);
        }
        if let Some(condition) = update.return_condition {
            self.return_condition = Some(condition);
        }
        if let Some(damage) = update.damage_reported {
            self.damage_reported = damage;
        }
        if let Some(notes) = update.damage_notes {
            self.damage_notes = Some(notes);
        }
        if let Some(notes) = update.notes {
            self.notes = Some(notes);
        }

        for effect in effects {
            match effect {
                BookingEffect::StampCheckedOut => {
                    self.checked_out_at = Some(now);
                    self.checked_out_by_id = Some(actor_id);
                }
                BookingEffect::StampReturned => {
                    self.returned_at = Some(now);
                    self.returned_to_id = Some(actor_id);
                }
                BookingEffect::MarkEquipmentInUse | BookingEffect::MarkEquipmentAvailable => {}
            }
        }

        self.updated_at = Some(now);

        Ok(BookingChange {
            from,
            effects,
            rescheduled,
        })
    }
}
