//! Equipment inventory models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Equipment category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentCategory {
    Camera,
    Lens,
    Lighting,
    Audio,
    Grip,
    /// Tripods, gimbals and sliders
    Support,
    Drone,
    Monitor,
    Storage,
    Computer,
    Software,
    Vehicle,
    #[default]
    Other,
}

impl fmt::Display for EquipmentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EquipmentCategory::Camera => "camera",
            EquipmentCategory::Lens => "lens",
            EquipmentCategory::Lighting => "lighting",
            EquipmentCategory::Audio => "audio",
            EquipmentCategory::Grip => "grip",
            EquipmentCategory::Support => "support",
            EquipmentCategory::Drone => "drone",
            EquipmentCategory::Monitor => "monitor",
            EquipmentCategory::Storage => "storage",
            EquipmentCategory::Computer => "computer",
            EquipmentCategory::Software => "software",
            EquipmentCategory::Vehicle => "vehicle",
            EquipmentCategory::Other => "other",
        };
        write!(f, "{}", s)
    }
}

impl EquipmentCategory {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "camera" => Some(EquipmentCategory::Camera),
            "lens" => Some(EquipmentCategory::Lens),
            "lighting" => Some(EquipmentCategory::Lighting),
            "audio" => Some(EquipmentCategory::Audio),
            "grip" => Some(EquipmentCategory::Grip),
            "support" => Some(EquipmentCategory::Support),
            "drone" => Some(EquipmentCategory::Drone),
            "monitor" => Some(EquipmentCategory::Monitor),
            "storage" => Some(EquipmentCategory::Storage),
            "computer" => Some(EquipmentCategory::Computer),
            "software" => Some(EquipmentCategory::Software),
            "vehicle" => Some(EquipmentCategory::Vehicle),
            "other" => Some(EquipmentCategory::Other),
            _ => None,
        }
    }
}

/// Physical availability of a piece of equipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    #[default]
    Available,
    InUse,
    Reserved,
    Maintenance,
    Damaged,
    Retired,
}

impl fmt::Display for EquipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EquipmentStatus::Available => write!(f, "available"),
            EquipmentStatus::InUse => write!(f, "in_use"),
            EquipmentStatus::Reserved => write!(f, "reserved"),
            EquipmentStatus::Maintenance => write!(f, "maintenance"),
            EquipmentStatus::Damaged => write!(f, "damaged"),
            EquipmentStatus::Retired => write!(f, "retired"),
        }
    }
}

impl EquipmentStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "available" => Some(EquipmentStatus::Available),
            "in_use" => Some(EquipmentStatus::InUse),
            "reserved" => Some(EquipmentStatus::Reserved),
            "maintenance" => Some(EquipmentStatus::Maintenance),
            "damaged" => Some(EquipmentStatus::Damaged),
            "retired" => Some(EquipmentStatus::Retired),
            _ => None,
        }
    }
}

/// Equipment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equipment {
    pub id: i32,
    pub name: String,
    /// Asset tag, unique
    pub code: String,
    pub category: EquipmentCategory,

    pub brand: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub description: Option<String>,

    pub status: EquipmentStatus,
    pub condition_notes: Option<String>,

    pub purchase_date: Option<NaiveDate>,
    pub purchase_price: Option<Decimal>,
    pub current_value: Option<Decimal>,

    pub storage_location: Option<String>,
    pub current_location: Option<String>,

    pub is_rentable: bool,
    pub daily_rate: Option<Decimal>,
    pub weekly_rate: Option<Decimal>,

    pub last_maintenance_date: Option<NaiveDate>,
    pub next_maintenance_date: Option<NaiveDate>,

    pub notes: Option<String>,
    /// Cleared instead of deleting the row
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Equipment {
    /// Soft delete
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = Some(now);
    }

    /// Whether maintenance is due on or before `today`
    pub fn maintenance_due(&self, today: NaiveDate) -> bool {
        self.next_maintenance_date.is_some_and(|d| d <= today)
    }

    pub fn apply_update(&mut self, update: EquipmentUpdate, now: DateTime<Utc>) {
        if let Some(v) = update.name {
            self.name = v;
        }
        if let Some(v) = update.category {
            self.category = v;
        }
        if let Some(v) = update.brand {
            self.brand = Some(v);
        }
        if let Some(v) = update.model {
            self.model = Some(v);
        }
        if let Some(v) = update.serial_number {
            self.serial_number = Some(v);
        }
        if let Some(v) = update.description {
            self.description = Some(v);
        }
        if let Some(v) = update.status {
            self.status = v;
        }
        if let Some(v) = update.condition_notes {
            self.condition_notes = Some(v);
        }
        if let Some(v) = update.current_value {
            self.current_value = Some(v);
        }
        if let Some(v) = update.storage_location {
            self.storage_location = Some(v);
        }
        if let Some(v) = update.current_location {
            self.current_location = Some(v);
        }
        if let Some(v) = update.is_rentable {
            self.is_rentable = v;
        }
        if let Some(v) = update.daily_rate {
            self.daily_rate = Some(v);
        }
        if let Some(v) = update.weekly_rate {
            self.weekly_rate = Some(v);
        }
        if let Some(v) = update.notes {
            self.notes = Some(v);
        }
        if let Some(v) = update.is_active {
            self.is_active = v;
        }
        self.updated_at = Some(now);
    }
}

/// Request to register equipment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEquipment {
    pub name: String,
    pub code: String,
    pub category: EquipmentCategory,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub description: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_price: Option<Decimal>,
    pub current_value: Option<Decimal>,
    pub storage_location: Option<String>,
    pub is_rentable: bool,
    pub daily_rate: Option<Decimal>,
    pub weekly_rate: Option<Decimal>,
    pub notes: Option<String>,
}

/// Partial equipment update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EquipmentUpdate {
    pub name: Option<String>,
    pub category: Option<EquipmentCategory>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub description: Option<String>,
    pub status: Option<EquipmentStatus>,
    pub condition_notes: Option<String>,
    pub current_value: Option<Decimal>,
    pub storage_location: Option<String>,
    pub current_location: Option<String>,
    pub is_rentable: Option<bool>,
    pub daily_rate: Option<Decimal>,
    pub weekly_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}
