//! Project budget models

use crate::error::AppError;
use crate::finance::{self, BudgetAlertLevel};
use crate::AppResult;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default warning threshold, percent of allocation spent
pub const DEFAULT_WARNING_THRESHOLD: i32 = 80;
/// Default critical threshold, percent of allocation spent
pub const DEFAULT_CRITICAL_THRESHOLD: i32 = 95;

/// Budget line category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BudgetCategory {
    PreProduction,
    Production,
    PostProduction,
    Talent,
    Crew,
    Equipment,
    Location,
    Travel,
    Contingency,
    #[default]
    Other,
}

impl fmt::Display for BudgetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetCategory::PreProduction => write!(f, "pre_production"),
            BudgetCategory::Production => write!(f, "production"),
            BudgetCategory::PostProduction => write!(f, "post_production"),
            BudgetCategory::Talent => write!(f, "talent"),
            BudgetCategory::Crew => write!(f, "crew"),
            BudgetCategory::Equipment => write!(f, "equipment"),
            BudgetCategory::Location => write!(f, "location"),
            BudgetCategory::Travel => write!(f, "travel"),
            BudgetCategory::Contingency => write!(f, "contingency"),
            BudgetCategory::Other => write!(f, "other"),
        }
    }
}

/// Budget entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: i32,
    pub project_id: i32,
    pub category: BudgetCategory,
    pub name: String,
    pub description: Option<String>,
    pub allocated_amount: Decimal,
    pub spent_amount: Decimal,
    /// Always allocated_amount - spent_amount
    pub remaining_amount: Decimal,
    pub currency: String,
    pub warning_threshold: i32,
    pub critical_threshold: i32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial budget update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub allocated_amount: Option<Decimal>,
    pub spent_amount: Option<Decimal>,
    pub warning_threshold: Option<i32>,
    pub critical_threshold: Option<i32>,
    pub notes: Option<String>,
}

fn validate_thresholds(warning: i32, critical: i32) -> AppResult<()> {
    if !(0..=100).contains(&warning) || !(0..=100).contains(&critical) {
        return Err(AppError::InvalidInput(format!(
            "Budget thresholds must be within 0..=100, got {}/{}",
            warning, critical
        )));
    }
    if warning > critical {
        return Err(AppError::InvalidInput(format!(
            "Warning threshold {} exceeds critical threshold {}",
            warning, critical
        )));
    }
    Ok(())
}

fn validate_amounts(allocated: Decimal, spent: Decimal) -> AppResult<()> {
    if allocated < Decimal::ZERO || spent < Decimal::ZERO {
        return Err(AppError::invalid("Budget amounts must not be negative"));
    }
    Ok(())
}

impl Budget {
    pub fn utilisation(&self) -> AppResult<Decimal> {
        finance::budget_utilisation(self.allocated_amount, self.spent_amount)
    }

    pub fn alert_level(&self) -> AppResult<BudgetAlertLevel> {
        finance::budget_alert_level(
            self.allocated_amount,
            self.spent_amount,
            Decimal::from(self.warning_threshold),
            Decimal::from(self.critical_threshold),
        )
    }

    /// Add spending and recompute the remainder
    pub fn record_spend(&mut self, amount: Decimal, now: DateTime<Utc>) -> AppResult<()> {
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidInput(format!(
                "Spend amount must be positive, got {}",
                amount
            )));
        }
        let spent = self
            .spent_amount
            .checked_add(amount)
            .ok_or_else(|| AppError::invalid("amount out of range"))?;
        self.remaining_amount = finance::budget_remaining(self.allocated_amount, spent)?;
        self.spent_amount = spent;
        self.updated_at = Some(now);
        Ok(())
    }

    pub fn apply_update(&mut self, update: BudgetUpdate, now: DateTime<Utc>) -> AppResult<()> {
        let allocated = update.allocated_amount.unwrap_or(self.allocated_amount);
        let spent = update.spent_amount.unwrap_or(self.spent_amount);
        let warning = update.warning_threshold.unwrap_or(self.warning_threshold);
        let critical = update.critical_threshold.unwrap_or(self.critical_threshold);
        validate_amounts(allocated, spent)?;
        validate_thresholds(warning, critical)?;
        let remaining = finance::budget_remaining(allocated, spent)?;

        if let Some(v) = update.name {
            self.name = v;
        }
        if let Some(v) = update.description {
            self.description = Some(v);
        }
        if let Some(v) = update.notes {
            self.notes = Some(v);
        }
        self.allocated_amount = allocated;
        self.spent_amount = spent;
        self.warning_threshold = warning;
        self.critical_threshold = critical;
        self.remaining_amount = remaining;
        self.updated_at = Some(now);
        Ok(())
    }
}
