//! Expense models

use crate::error::AppError;
use crate::transitions::{TransitionMode, TransitionRule, TransitionTable};
use crate::AppResult;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Expense category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    EquipmentRental,
    Talent,
    Crew,
    Location,
    Catering,
    Transportation,
    Accommodation,
    PostProduction,
    MusicLicensing,
    Props,
    Wardrobe,
    Insurance,
    Permits,
    Software,
    Marketing,
    Office,
    Utilities,
    #[default]
    Other,
}

impl ExpenseCategory {
    const ALL: [(ExpenseCategory, &'static str); 18] = [
        (ExpenseCategory::EquipmentRental, "equipment_rental"),
        (ExpenseCategory::Talent, "talent"),
        (ExpenseCategory::Crew, "crew"),
        (ExpenseCategory::Location, "location"),
        (ExpenseCategory::Catering, "catering"),
        (ExpenseCategory::Transportation, "transportation"),
        (ExpenseCategory::Accommodation, "accommodation"),
        (ExpenseCategory::PostProduction, "post_production"),
        (ExpenseCategory::MusicLicensing, "music_licensing"),
        (ExpenseCategory::Props, "props"),
        (ExpenseCategory::Wardrobe, "wardrobe"),
        (ExpenseCategory::Insurance, "insurance"),
        (ExpenseCategory::Permits, "permits"),
        (ExpenseCategory::Software, "software"),
        (ExpenseCategory::Marketing, "marketing"),
        (ExpenseCategory::Office, "office"),
        (ExpenseCategory::Utilities, "utilities"),
        (ExpenseCategory::Other, "other"),
    ];

    pub fn as_str(&self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(c, _)| c == self)
            .map(|(_, s)| *s)
            .unwrap_or("other")
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.to_lowercase();
        Self::ALL.iter().find(|(_, name)| *name == s).map(|(c, _)| *c)
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Expense approval status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Reimbursed,
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpenseStatus::Pending => write!(f, "pending"),
            ExpenseStatus::Approved => write!(f, "approved"),
            ExpenseStatus::Rejected => write!(f, "rejected"),
            ExpenseStatus::Reimbursed => write!(f, "reimbursed"),
        }
    }
}

impl ExpenseStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(ExpenseStatus::Pending),
            "approved" => Some(ExpenseStatus::Approved),
            "rejected" => Some(ExpenseStatus::Rejected),
            "reimbursed" => Some(ExpenseStatus::Reimbursed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpenseEffect {
    /// Record approver and approval time
    StampApproval,
    StampReimbursed,
}

pub static EXPENSE_TRANSITIONS: TransitionTable<ExpenseStatus, ExpenseEffect> =
    TransitionTable::new(
        "expense",
        TransitionMode::Strict,
        &[
            TransitionRule {
                from: &[ExpenseStatus::Pending],
                to: ExpenseStatus::Approved,
                effects: &[ExpenseEffect::StampApproval],
            },
            TransitionRule {
                from: &[ExpenseStatus::Pending],
                to: ExpenseStatus::Rejected,
                effects: &[],
            },
            TransitionRule {
                from: &[ExpenseStatus::Approved],
                to: ExpenseStatus::Reimbursed,
                effects: &[ExpenseEffect::StampReimbursed],
            },
            // resubmission after rejection
            TransitionRule {
                from: &[ExpenseStatus::Rejected],
                to: ExpenseStatus::Pending,
                effects: &[],
            },
        ],
    );

/// Generate an expense number of the form `EXP-YYYYMMDD-XXXXXX`
pub fn generate_expense_number(date: NaiveDate) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(6)
        .collect();
    format!("EXP-{}-{}", date.format("%Y%m%d"), suffix.to_uppercase())
}

/// Expense entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: i32,
    pub project_id: Option<i32>,
    pub employee_id: Option<i32>,
    pub expense_number: String,
    pub category: ExpenseCategory,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub expense_date: NaiveDate,
    pub vendor_name: Option<String>,
    pub vendor_invoice: Option<String>,
    pub status: ExpenseStatus,
    pub approved_by_id: Option<i32>,
    pub approved_at: Option<DateTime<Utc>>,
    pub is_reimbursable: bool,
    pub reimbursed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub submitted_by_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request to file an expense
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpense {
    pub project_id: Option<i32>,
    pub employee_id: Option<i32>,
    pub category: ExpenseCategory,
    pub description: String,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub expense_date: NaiveDate,
    pub vendor_name: Option<String>,
    pub vendor_invoice: Option<String>,
    pub is_reimbursable: bool,
    pub notes: Option<String>,
    pub submitted_by_id: Option<i32>,
}

impl NewExpense {
    pub fn validate(&self) -> AppResult<()> {
        validate_amount(self.amount)?;
        if self.description.trim().is_empty() {
            return Err(AppError::invalid("Expense description must not be empty"));
        }
        Ok(())
    }
}

/// Partial expense update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpenseUpdate {
    pub category: Option<ExpenseCategory>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub expense_date: Option<NaiveDate>,
    pub status: Option<ExpenseStatus>,
    pub vendor_name: Option<String>,
    pub vendor_invoice: Option<String>,
    pub is_reimbursable: Option<bool>,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
}

fn validate_amount(amount: Decimal) -> AppResult<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidInput(format!(
            "Expense amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

impl Expense {
    pub fn apply_update(
        &mut self,
        update: ExpenseUpdate,
        actor_id: i32,
        now: DateTime<Utc>,
    ) -> AppResult<&'static [ExpenseEffect]> {
        if let Some(amount) = update.amount {
            validate_amount(amount)?;
        }
        let effects: &'static [ExpenseEffect] = match update.status {
            Some(to) => EXPENSE_TRANSITIONS.resolve(self.status, to)?,
            None => &[],
        };

        if let Some(v) = update.category {
            self.category = v;
        }
        if let Some(v) = update.description {
            self.description = v;
        }
        if let Some(v) = update.amount {
            self.amount = v;
        }
        if let Some(v) = update.expense_date {
            self.expense_date = v;
        }
        if let Some(v) = update.status {
            self.status = v;
        }
        if let Some(v) = update.vendor_name {
            self.vendor_name = Some(v);
        }
        if let Some(v) = update.vendor_invoice {
            self.vendor_invoice = Some(v);
        }
        if let Some(v) = update.is_reimbursable {
            self.is_reimbursable = v;
        }
        if let Some(v) = update.notes {
            self.notes = Some(v);
        }
        if let Some(v) = update.rejection_reason {
            self.rejection_reason = Some(v);
        }

        for effect in effects {
            match effect {
                ExpenseEffect::StampApproval => {
                    self.approved_by_id = Some(actor_id);
                    self.approved_at = Some(now);
                }
                ExpenseEffect::StampReimbursed => self.reimbursed_at = Some(now),
            }
        }
        self.updated_at = Some(now);

        Ok(effects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn expense(status: ExpenseStatus) -> Expense {
        Expense {
            id: 1,
            project_id: Some(3),
            employee_id: Some(8),
            expense_number: "EXP-20240301-ABC123".to_string(),
            category: ExpenseCategory::Catering,
            description: "Lunch for crew".to_string(),
            amount: dec!(320.50),
            currency: "USD".to_string(),
            expense_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            vendor_name: None,
            vendor_invoice: None,
            status,
            approved_by_id: None,
            approved_at: None,
            is_reimbursable: true,
            reimbursed_at: None,
            notes: None,
            rejection_reason: None,
            submitted_by_id: Some(8),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_expense_number_format() {
        let number = generate_expense_number(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        assert!(number.starts_with("EXP-20240309-"));
        let suffix = &number["EXP-20240309-".len()..];
        assert_eq!(suffix.len(), 6);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_approval_stamps_approver() {
        let now = Utc::now();
        let mut e = expense(ExpenseStatus::Pending);
        let effects = e
            .apply_update(
                ExpenseUpdate {
                    status: Some(ExpenseStatus::Approved),
                    ..Default::default()
                },
                5,
                now,
            )
            .unwrap();
        assert_eq!(effects, &[ExpenseEffect::StampApproval]);
        assert_eq!(e.approved_by_id, Some(5));
        assert_eq!(e.approved_at, Some(now));
    }

    #[test]
    fn test_reimbursement_requires_approval() {
        let mut e = expense(ExpenseStatus::Pending);
        let update = ExpenseUpdate {
            status: Some(ExpenseStatus::Reimbursed),
            ..Default::default()
        };
        assert!(e.apply_update(update.clone(), 5, Utc::now()).is_err());

        let mut approved = expense(ExpenseStatus::Approved);
        approved.apply_update(update, 5, Utc::now()).unwrap();
        assert!(approved.reimbursed_at.is_some());
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let mut e = expense(ExpenseStatus::Pending);
        let update = ExpenseUpdate {
            amount: Some(Decimal::ZERO),
            ..Default::default()
        };
        assert!(matches!(
            e.apply_update(update, 5, Utc::now()),
            Err(AppError::InvalidInput(_))
        ));
        assert_eq!(e.amount, dec!(320.50));
    }

    #[test]
    fn test_category_strings() {
        assert_eq!(ExpenseCategory::MusicLicensing.to_string(), "music_licensing");
        assert_eq!(
            ExpenseCategory::from_str("POST_PRODUCTION"),
            Some(ExpenseCategory::PostProduction)
        );
        assert_eq!(ExpenseCategory::from_str("snacks"), None);
    }
}
