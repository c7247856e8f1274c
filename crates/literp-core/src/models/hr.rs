//! HR models: leave requests and attendance

use crate::error::AppError;
use crate::finance::round_money;
use crate::transitions::{TransitionMode, TransitionRule, TransitionTable};
use crate::AppResult;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of leave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeaveType {
    #[default]
    Annual,
    Sick,
    Personal,
    Maternity,
    Paternity,
    Unpaid,
}

impl fmt::Display for LeaveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaveType::Annual => write!(f, "annual"),
            LeaveType::Sick => write!(f, "sick"),
            LeaveType::Personal => write!(f, "personal"),
            LeaveType::Maternity => write!(f, "maternity"),
            LeaveType::Paternity => write!(f, "paternity"),
            LeaveType::Unpaid => write!(f, "unpaid"),
        }
    }
}

/// Leave request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaveStatus::Pending => write!(f, "pending"),
            LeaveStatus::Approved => write!(f, "approved"),
            LeaveStatus::Rejected => write!(f, "rejected"),
            LeaveStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl LeaveStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(LeaveStatus::Pending),
            "approved" => Some(LeaveStatus::Approved),
            "rejected" => Some(LeaveStatus::Rejected),
            "cancelled" => Some(LeaveStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveEffect {
    StampApproval,
}

pub static LEAVE_TRANSITIONS: TransitionTable<LeaveStatus, LeaveEffect> = TransitionTable::new(
    "leave_request",
    TransitionMode::Strict,
    &[
        TransitionRule {
            from: &[LeaveStatus::Pending],
            to: LeaveStatus::Approved,
            effects: &[LeaveEffect::StampApproval],
        },
        TransitionRule {
            from: &[LeaveStatus::Pending],
            to: LeaveStatus::Rejected,
            effects: &[],
        },
        TransitionRule {
            from: &[LeaveStatus::Pending, LeaveStatus::Approved],
            to: LeaveStatus::Cancelled,
            effects: &[],
        },
    ],
);

/// Inclusive number of calendar days between two dates
pub fn leave_total_days(start: NaiveDate, end: NaiveDate) -> AppResult<i32> {
    if end < start {
        return Err(AppError::InvalidInput(format!(
            "Leave end {} is before start {}",
            end, start
        )));
    }
    let days = (end - start).num_days() + 1;
    i32::try_from(days).map_err(|_| AppError::invalid("Leave period too long"))
}

/// Worked hours between check-in and check-out, rounded half-up to 2 places
pub fn attendance_hours(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> AppResult<Decimal> {
    if check_out < check_in {
        return Err(AppError::InvalidInput(format!(
            "Check-out {} is before check-in {}",
            check_out, check_in
        )));
    }
    let seconds = Decimal::from((check_out - check_in).num_seconds());
    Ok(round_money(seconds / Decimal::from(3600), 2))
}

/// Leave request entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: i32,
    pub employee_id: i32,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: i32,
    pub reason: Option<String>,
    pub status: LeaveStatus,
    pub approved_by_id: Option<i32>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLeaveRequest {
    pub employee_id: i32,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

impl NewLeaveRequest {
    pub fn total_days(&self) -> AppResult<i32> {
        leave_total_days(self.start_date, self.end_date)
    }
}

/// Partial leave update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaveUpdate {
    pub leave_type: Option<LeaveType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub reason: Option<String>,
    pub status: Option<LeaveStatus>,
    pub rejection_reason: Option<String>,
}

impl LeaveRequest {
    pub fn apply_update(
        &mut self,
        update: LeaveUpdate,
        actor_id: i32,
        now: DateTime<Utc>,
    ) -> AppResult<&'static [LeaveEffect]> {
        let start = update.start_date.unwrap_or(self.start_date);
        let end = update.end_date.unwrap_or(self.end_date);
        let total_days = leave_total_days(start, end)?;
        let effects: &'static [LeaveEffect] = match update.status {
            Some(to) => LEAVE_TRANSITIONS.resolve(self.status, to)?,
            None => &[],
        };

        self.start_date = start;
        self.end_date = end;
        self.total_days = total_days;
        if let Some(v) = update.leave_type {
            self.leave_type = v;
        }
        if let Some(v) = update.reason {
            self.reason = Some(v);
        }
        if let Some(v) = update.status {
            self.status = v;
        }
        if let Some(v) = update.rejection_reason {
            self.rejection_reason = Some(v);
        }

        for effect in effects {
            match effect {
                LeaveEffect::StampApproval => {
                    self.approved_by_id = Some(actor_id);
                    self.approved_at = Some(now);
                }
            }
        }
        self.updated_at = Some(now);

        Ok(effects)
    }
}

/// Daily attendance entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendance {
    pub id: i32,
    pub employee_id: i32,
    pub date: NaiveDate,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    /// Set only when both stamps are present
    pub total_hours: Option<Decimal>,
    pub overtime_hours: Decimal,
    pub location: Option<String>,
    pub project_id: Option<i32>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Attendance {
    /// Recompute `total_hours` from the stamps
    pub fn refresh_hours(&mut self) -> AppResult<()> {
        self.total_hours = match (self.check_in, self.check_out) {
            (Some(check_in), Some(check_out)) => Some(attendance_hours(check_in, check_out)?),
            _ => None,
        };
        Ok(())
    }

    pub fn check_out_at(&mut self, at: DateTime<Utc>) -> AppResult<()> {
        if self.check_in.is_none() {
            return Err(AppError::Conflict(format!(
                "Employee {} has not checked in on {}",
                self.employee_id, self.date
            )));
        }
        self.check_out = Some(at);
        self.refresh_hours()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn test_leave_days_inclusive() {
        assert_eq!(leave_total_days(d(3, 1), d(3, 5)).unwrap(), 5);
        assert_eq!(leave_total_days(d(3, 1), d(3, 1)).unwrap(), 1);
        // leap day
        assert_eq!(leave_total_days(d(2, 28), d(3, 1)).unwrap(), 3);
        assert!(leave_total_days(d(3, 5), d(3, 1)).is_err());
    }

    #[test]
    fn test_attendance_hours() {
        let check_in = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let check_out = Utc.with_ymd_and_hms(2024, 3, 4, 17, 30, 0).unwrap();
        assert_eq!(attendance_hours(check_in, check_out).unwrap(), dec!(8.50));

        let odd = Utc.with_ymd_and_hms(2024, 3, 4, 9, 20, 0).unwrap();
        assert_eq!(attendance_hours(check_in, odd).unwrap(), dec!(0.33));
        assert!(attendance_hours(check_out, check_in).is_err());
    }

    #[test]
    fn test_check_out_requires_check_in() {
        let mut a = Attendance {
            id: 1,
            employee_id: 2,
            date: d(3, 4),
            check_in: None,
            check_out: None,
            total_hours: None,
            overtime_hours: Decimal::ZERO,
            location: None,
            project_id: None,
            notes: None,
            created_at: Utc::now(),
        };
        let out = Utc.with_ymd_and_hms(2024, 3, 4, 17, 0, 0).unwrap();
        assert!(a.check_out_at(out).is_err());

        a.check_in = Some(Utc.with_ymd_and_hms(2024, 3, 4, 8, 45, 0).unwrap());
        a.check_out_at(out).unwrap();
        assert_eq!(a.total_hours, Some(dec!(8.25)));
    }

    #[test]
    fn test_leave_approval_and_date_change() {
        let mut leave = LeaveRequest {
            id: 1,
            employee_id: 2,
            leave_type: LeaveType::Annual,
            start_date: d(3, 1),
            end_date: d(3, 5),
            total_days: 5,
            reason: None,
            status: LeaveStatus::Pending,
            approved_by_id: None,
            approved_at: None,
            rejection_reason: None,
            created_at: Utc::now(),
            updated_at: None,
        };

        leave
            .apply_update(
                LeaveUpdate {
                    end_date: Some(d(3, 8)),
                    status: Some(LeaveStatus::Approved),
                    ..Default::default()
                },
                11,
                Utc::now(),
            )
            .unwrap();
        assert_eq!(leave.total_days, 8);
        assert_eq!(leave.approved_by_id, Some(11));

        let err = leave
            .apply_update(
                LeaveUpdate {
                    status: Some(LeaveStatus::Rejected),
                    ..Default::default()
                },
                11,
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_transition");
    }
}
