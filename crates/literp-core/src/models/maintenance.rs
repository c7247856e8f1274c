//! Equipment maintenance records

use super::equipment::Equipment;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of maintenance work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceType {
    #[default]
    Routine,
    Repair,
    Calibration,
    Cleaning,
    Upgrade,
}

impl fmt::Display for MaintenanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaintenanceType::Routine => write!(f, "routine"),
            MaintenanceType::Repair => write!(f, "repair"),
            MaintenanceType::Calibration => write!(f, "calibration"),
            MaintenanceType::Cleaning => write!(f, "cleaning"),
            MaintenanceType::Upgrade => write!(f, "upgrade"),
        }
    }
}

impl MaintenanceType {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "routine" => Some(MaintenanceType::Routine),
            "repair" => Some(MaintenanceType::Repair),
            "calibration" => Some(MaintenanceType::Calibration),
            "cleaning" => Some(MaintenanceType::Cleaning),
            "upgrade" => Some(MaintenanceType::Upgrade),
            _ => None,
        }
    }
}

/// Maintenance record entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub id: i32,
    pub equipment_id: i32,
    pub maintenance_type: MaintenanceType,
    pub description: String,
    pub scheduled_date: Option<NaiveDate>,
    /// Set once the work is done
    pub completed_date: Option<NaiveDate>,
    pub cost: Option<Decimal>,
    pub vendor: Option<String>,
    pub performed_by: Option<String>,
    pub performed_by_id: Option<i32>,
    pub findings: Option<String>,
    pub parts_replaced: Option<String>,
    pub next_maintenance_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request to log maintenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMaintenanceRecord {
    pub equipment_id: i32,
    pub maintenance_type: MaintenanceType,
    pub description: String,
    pub scheduled_date: Option<NaiveDate>,
    pub cost: Option<Decimal>,
    pub vendor: Option<String>,
    pub performed_by: Option<String>,
    pub performed_by_id: Option<i32>,
    pub findings: Option<String>,
    pub parts_replaced: Option<String>,
    pub next_maintenance_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Partial maintenance update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaintenanceUpdate {
    pub maintenance_type: Option<MaintenanceType>,
    pub description: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub completed_date: Option<NaiveDate>,
    pub cost: Option<Decimal>,
    pub vendor: Option<String>,
    pub performed_by: Option<String>,
    pub findings: Option<String>,
    pub parts_replaced: Option<String>,
    pub next_maintenance_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Equipment date changes produced by maintenance activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaintenanceSchedule {
    pub last_maintenance_date: Option<NaiveDate>,
    pub next_maintenance_date: Option<NaiveDate>,
}

impl MaintenanceSchedule {
    pub fn is_empty(&self) -> bool {
        self.last_maintenance_date.is_none() && self.next_maintenance_date.is_none()
    }

    /// Copy the set dates onto the equipment
    pub fn apply_to(&self, equipment: &mut Equipment, now: DateTime<Utc>) {
        if self.is_empty() {
            return;
        }
        if let Some(last) = self.last_maintenance_date {
            equipment.last_maintenance_date = Some(last);
        }
        if let Some(next) = self.next_maintenance_date {
            equipment.next_maintenance_date = Some(next);
        }
        equipment.updated_at = Some(now);
    }
}

impl NewMaintenanceRecord {
    /// Logging maintenance with a follow-up date reschedules the equipment
    pub fn schedule(&self) -> MaintenanceSchedule {
        MaintenanceSchedule {
            last_maintenance_date: None,
            next_maintenance_date: self.next_maintenance_date,
        }
    }
}

impl MaintenanceRecord {
    pub fn is_completed(&self) -> bool {
        self.completed_date.is_some()
    }

    /// Apply a partial update and report the equipment dates it implies.
    ///
    /// Only an update carrying `completed_date` touches the equipment: the
    /// completion becomes its last maintenance date, and the follow-up date,
    /// when given, its next one.
    pub fn apply_update(
        &mut self,
        update: MaintenanceUpdate,
        now: DateTime<Utc>,
    ) -> MaintenanceSchedule {
        let schedule = match update.completed_date {
            Some(done) => MaintenanceSchedule {
                last_maintenance_date: Some(done),
                next_maintenance_date: update.next_maintenance_date,
            },
            None => MaintenanceSchedule::default(),
        };

        if let Some(v) = update.maintenance_type {
            self.maintenance_type = v;
        }
        if let Some(v) = update.description {
            self.description = v;
        }
        if let Some(v) = update.scheduled_date {
            self.scheduled_date = Some(v);
        }
        if let Some(v) = update.completed_date {
            self.completed_date = Some(v);
        }
        if let Some(v) = update.cost {
            self.cost = Some(v);
        }
        if let Some(v) = update.vendor {
            self.vendor = Some(v);
        }
        if let Some(v) = update.performed_by {
            self.performed_by = Some(v);
        }
        if let Some(v) = update.findings {
            self.findings = Some(v);
        }
        if let Some(v) = update.parts_replaced {
            self.parts_replaced = Some(v);
        }
        if let Some(v) = update.next_maintenance_date {
            self.next_maintenance_date = Some(v);
        }
        if let Some(v) = update.notes {
            self.notes = Some(v);
        }
        self.updated_at = Some(now);

        schedule
    }
}
