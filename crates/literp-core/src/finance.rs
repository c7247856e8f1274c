//! Invoice totals, payment ledger and budget arithmetic
//!
//! All amounts are exact decimals. Totals are rounded to the currency's
//! minor unit once, on the aggregates, never per line item.

use crate::error::AppError;
use crate::models::invoice::InvoiceStatus;
use crate::AppResult;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Minor-unit places used when no currency is known
pub const DEFAULT_SCALE: u32 = 2;

const ZERO_DECIMAL_CURRENCIES: &[&str] = &["JPY", "KRW", "VND", "CLP", "ISK", "UGX"];
const THREE_DECIMAL_CURRENCIES: &[&str] = &["BHD", "KWD", "OMR", "JOD", "TND", "IQD", "LYD"];

/// Number of decimal places in the minor unit of an ISO 4217 currency
pub fn currency_scale(currency: &str) -> u32 {
    let code = currency.trim().to_uppercase();
    if ZERO_DECIMAL_CURRENCIES.contains(&code.as_str()) {
        0
    } else if THREE_DECIMAL_CURRENCIES.contains(&code.as_str()) {
        3
    } else {
        DEFAULT_SCALE
    }
}

fn out_of_range() -> AppError {
    AppError::invalid("amount out of range")
}

fn mul(a: Decimal, b: Decimal) -> AppResult<Decimal> {
    a.checked_mul(b).ok_or_else(out_of_range)
}

fn add(a: Decimal, b: Decimal) -> AppResult<Decimal> {
    a.checked_add(b).ok_or_else(out_of_range)
}

fn sub(a: Decimal, b: Decimal) -> AppResult<Decimal> {
    a.checked_sub(b).ok_or_else(out_of_range)
}

fn div(a: Decimal, b: Decimal) -> AppResult<Decimal> {
    a.checked_div(b).ok_or_else(out_of_range)
}

/// Round half-up (away from zero) to `scale` places
pub fn round_money(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

/// A billable quantity at a unit price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl LineItem {
    pub fn new(quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            quantity,
            unit_price,
        }
    }

    /// Unrounded line amount
    pub fn amount(&self) -> AppResult<Decimal> {
        mul(self.quantity, self.unit_price)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.quantity < Decimal::ZERO {
            return Err(AppError::InvalidInput(format!(
                "Line item quantity must not be negative, got {}",
                self.quantity
            )));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(AppError::InvalidInput(format!(
                "Line item unit price must not be negative, got {}",
                self.unit_price
            )));
        }
        Ok(())
    }
}

/// Computed invoice amounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub discount_percentage: Decimal,
    pub tax_rate: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

/// Compute invoice totals rounded to two places
pub fn compute_invoice_totals(
    items: &[LineItem],
    discount_percentage: Decimal,
    tax_rate: Decimal,
) -> AppResult<InvoiceTotals> {
    compute_invoice_totals_scaled(items, discount_percentage, tax_rate, DEFAULT_SCALE)
}

/// Compute invoice totals rounded to the minor unit of `currency`
pub fn compute_invoice_totals_for_currency(
    items: &[LineItem],
    discount_percentage: Decimal,
    tax_rate: Decimal,
    currency: &str,
) -> AppResult<InvoiceTotals> {
    compute_invoice_totals_scaled(items, discount_percentage, tax_rate, currency_scale(currency))
}

fn compute_invoice_totals_scaled(
    items: &[LineItem],
    discount_percentage: Decimal,
    tax_rate: Decimal,
    scale: u32,
) -> AppResult<InvoiceTotals> {
    validate_rates(discount_percentage, tax_rate)?;
    for item in items {
        item.validate()?;
    }

    let raw_subtotal = items
        .iter()
        .try_fold(Decimal::ZERO, |acc, item| add(acc, item.amount()?))?;
    totals_from_subtotal(raw_subtotal, discount_percentage, tax_rate, scale)
}

/// Check a discount percentage and tax rate before they are stored
pub fn validate_rates(discount_percentage: Decimal, tax_rate: Decimal) -> AppResult<()> {
    if discount_percentage < Decimal::ZERO || discount_percentage > HUNDRED {
        return Err(AppError::InvalidInput(format!(
            "Discount percentage must be between 0 and 100, got {}",
            discount_percentage
        )));
    }
    if tax_rate < Decimal::ZERO {
        return Err(AppError::InvalidInput(format!(
            "Tax rate must not be negative, got {}",
            tax_rate
        )));
    }
    Ok(())
}

fn totals_from_subtotal(
    raw_subtotal: Decimal,
    discount_percentage: Decimal,
    tax_rate: Decimal,
    scale: u32,
) -> AppResult<InvoiceTotals> {
    let subtotal = round_money(raw_subtotal, scale);
    let discount_amount = round_money(div(mul(subtotal, discount_percentage)?, HUNDRED)?, scale);
    let taxable = sub(subtotal, discount_amount)?;
    let tax_amount = round_money(div(mul(taxable, tax_rate)?, HUNDRED)?, scale);
    let total_amount = add(taxable, tax_amount)?;

    Ok(InvoiceTotals {
        subtotal,
        discount_percentage,
        tax_rate,
        discount_amount,
        tax_amount,
        total_amount,
    })
}

/// Payment-tracking view of an invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLedgerState {
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub balance_due: Decimal,
    pub status: InvoiceStatus,
}

impl PaymentLedgerState {
    /// Fresh ledger for an unpaid invoice
    pub fn new(total_amount: Decimal, status: InvoiceStatus) -> Self {
        Self {
            total_amount,
            amount_paid: Decimal::ZERO,
            balance_due: total_amount,
            status,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.balance_due <= Decimal::ZERO
    }
}

/// Apply an incoming payment and derive the new status.
///
/// Overpayment is allowed and leaves a negative balance. Recording the same
/// payment twice is the caller's concern.
pub fn apply_payment(state: &PaymentLedgerState, amount: Decimal) -> AppResult<PaymentLedgerState> {
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidInput(format!(
            "Payment amount must be positive, got {}",
            amount
        )));
    }

    let amount_paid = add(state.amount_paid, amount)?;
    let balance_due = sub(state.total_amount, amount_paid)?;
    let status = derive_payment_status(balance_due, amount_paid, state.status);

    Ok(PaymentLedgerState {
        total_amount: state.total_amount,
        amount_paid,
        balance_due,
        status,
    })
}

/// Status implied by a balance, falling back to `current` when nothing is paid
pub fn derive_payment_status(
    balance_due: Decimal,
    amount_paid: Decimal,
    current: InvoiceStatus,
) -> InvoiceStatus {
    if balance_due <= Decimal::ZERO {
        InvoiceStatus::Paid
    } else if amount_paid > Decimal::ZERO {
        InvoiceStatus::Partial
    } else {
        current
    }
}

// ==================== Budgets ====================

/// Budget consumption level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BudgetAlertLevel {
    #[default]
    Ok,
    Warning,
    Critical,
}

impl fmt::Display for BudgetAlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetAlertLevel::Ok => write!(f, "ok"),
            BudgetAlertLevel::Warning => write!(f, "warning"),
            BudgetAlertLevel::Critical => write!(f, "critical"),
        }
    }
}

pub fn budget_remaining(allocated: Decimal, spent: Decimal) -> AppResult<Decimal> {
    sub(allocated, spent)
}

/// Spent share of the allocation as a percentage, two places.
///
/// A zero allocation reports 0 when nothing is spent and 100 otherwise.
pub fn budget_utilisation(allocated: Decimal, spent: Decimal) -> AppResult<Decimal> {
    if allocated <= Decimal::ZERO {
        return Ok(if spent > Decimal::ZERO {
            HUNDRED
        } else {
            Decimal::ZERO
        });
    }
    Ok(round_money(mul(div(spent, allocated)?, HUNDRED)?, 2))
}

pub fn budget_alert_level(
    allocated: Decimal,
    spent: Decimal,
    warning_threshold: Decimal,
    critical_threshold: Decimal,
) -> AppResult<BudgetAlertLevel> {
    if spent > allocated {
        return Ok(BudgetAlertLevel::Critical);
    }
    let utilisation = budget_utilisation(allocated, spent)?;
    Ok(if utilisation >= critical_threshold {
        BudgetAlertLevel::Critical
    } else if utilisation >= warning_threshold {
        BudgetAlertLevel::Warning
    } else {
        BudgetAlertLevel::Ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_invoice_totals_example() {
        let items = vec![
            LineItem::new(dec!(2), dec!(100.00)),
            LineItem::new(dec!(1), dec!(50.00)),
        ];
        let totals = compute_invoice_totals(&items, dec!(10), dec!(8)).unwrap();
        assert_eq!(totals.subtotal, dec!(250.00));
        assert_eq!(totals.discount_amount, dec!(25.00));
        assert_eq!(totals.tax_amount, dec!(18.00));
        assert_eq!(totals.total_amount, dec!(243.00));
    }

    #[test]
    fn test_rounding_applied_once_on_aggregate() {
        let items = vec![LineItem::new(dec!(3), dec!(10.005))];
        let totals = compute_invoice_totals(&items, dec!(0), dec!(0)).unwrap();
        assert_eq!(totals.subtotal, dec!(30.02));
        assert_eq!(totals.total_amount, dec!(30.02));
        // the line amount itself stays exact
        assert_eq!(items[0].amount().unwrap(), dec!(30.015));
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_money(dec!(0.125), 2), dec!(0.13));
        assert_eq!(round_money(dec!(0.124), 2), dec!(0.12));
        assert_eq!(round_money(dec!(1.5), 0), dec!(2));
    }

    #[test]
    fn test_empty_invoice() {
        let totals = compute_invoice_totals(&[], dec!(5), dec!(10)).unwrap();
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.total_amount, Decimal::ZERO);
    }

    #[test]
    fn test_currency_scale() {
        assert_eq!(currency_scale("USD"), 2);
        assert_eq!(currency_scale("jpy"), 0);
        assert_eq!(currency_scale("KWD"), 3);
        assert_eq!(currency_scale("EUR"), 2);

        let items = vec![LineItem::new(dec!(1), dec!(1000.6))];
        let totals = compute_invoice_totals_for_currency(&items, dec!(0), dec!(10), "JPY").unwrap();
        assert_eq!(totals.subtotal, dec!(1001));
        assert_eq!(totals.tax_amount, dec!(100));
        assert_eq!(totals.total_amount, dec!(1101));
    }

    #[test]
    fn test_rejects_bad_rates_and_items() {
        let items = vec![LineItem::new(dec!(1), dec!(10))];
        assert!(matches!(
            compute_invoice_totals(&items, dec!(100.01), dec!(0)),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            compute_invoice_totals(&items, dec!(-1), dec!(0)),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            compute_invoice_totals(&items, dec!(0), dec!(-0.5)),
            Err(AppError::InvalidInput(_))
        ));
        let negative = vec![LineItem::new(dec!(-1), dec!(10))];
        assert!(compute_invoice_totals(&negative, dec!(0), dec!(0)).is_err());
        let negative_price = vec![LineItem::new(dec!(1), dec!(-10))];
        assert!(compute_invoice_totals(&negative_price, dec!(0), dec!(0)).is_err());

        // boundaries are inclusive
        assert!(compute_invoice_totals(&items, dec!(100), dec!(0)).is_ok());
        assert!(compute_invoice_totals(&items, dec!(0), dec!(0)).is_ok());
    }

    #[test]
    fn test_full_discount() {
        let items = vec![LineItem::new(dec!(4), dec!(25))];
        let totals = compute_invoice_totals(&items, dec!(100), dec!(8)).unwrap();
        assert_eq!(totals.discount_amount, dec!(100));
        assert_eq!(totals.tax_amount, Decimal::ZERO);
        assert_eq!(totals.total_amount, Decimal::ZERO);
    }

    #[test]
    fn test_apply_payment_full_and_partial() {
        let state = PaymentLedgerState::new(dec!(243.00), InvoiceStatus::Sent);

        let paid = apply_payment(&state, dec!(243.00)).unwrap();
        assert_eq!(paid.balance_due, dec!(0.00));
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert!(paid.is_settled());

        let partial = apply_payment(&state, dec!(100.00)).unwrap();
        assert_eq!(partial.amount_paid, dec!(100.00));
        assert_eq!(partial.balance_due, dec!(143.00));
        assert_eq!(partial.status, InvoiceStatus::Partial);

        let rest = apply_payment(&partial, dec!(143.00)).unwrap();
        assert_eq!(rest.status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_overpayment_goes_negative() {
        let state = PaymentLedgerState::new(dec!(50), InvoiceStatus::Sent);
        let over = apply_payment(&state, dec!(60)).unwrap();
        assert_eq!(over.balance_due, dec!(-10));
        assert_eq!(over.status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_non_positive_payment_rejected() {
        let state = PaymentLedgerState::new(dec!(50), InvoiceStatus::Sent);
        assert!(matches!(
            apply_payment(&state, Decimal::ZERO),
            Err(AppError::InvalidInput(_))
        ));
        assert!(apply_payment(&state, dec!(-5)).is_err());
    }

    #[test]
    fn test_status_unchanged_when_nothing_paid() {
        assert_eq!(
            derive_payment_status(dec!(10), Decimal::ZERO, InvoiceStatus::Overdue),
            InvoiceStatus::Overdue
        );
    }

    #[test]
    fn test_budget_levels() {
        assert_eq!(budget_remaining(dec!(1000), dec!(850)).unwrap(), dec!(150));
        assert_eq!(budget_utilisation(dec!(1000), dec!(850)).unwrap(), dec!(85));
        assert_eq!(
            budget_alert_level(dec!(1000), dec!(850), dec!(80), dec!(95)).unwrap(),
            BudgetAlertLevel::Warning
        );
        assert_eq!(
            budget_alert_level(dec!(1000), dec!(500), dec!(80), dec!(95)).unwrap(),
            BudgetAlertLevel::Ok
        );
        assert_eq!(
            budget_alert_level(dec!(1000), dec!(950), dec!(80), dec!(95)).unwrap(),
            BudgetAlertLevel::Critical
        );
        assert_eq!(
            budget_alert_level(dec!(1000), dec!(1200), dec!(80), dec!(200)).unwrap(),
            BudgetAlertLevel::Critical
        );
    }

    #[test]
    fn test_budget_zero_allocation() {
        assert_eq!(
            budget_utilisation(Decimal::ZERO, Decimal::ZERO).unwrap(),
            Decimal::ZERO
        );
        assert_eq!(
            budget_alert_level(Decimal::ZERO, Decimal::ZERO, dec!(80), dec!(95)).unwrap(),
            BudgetAlertLevel::Ok
        );
        assert_eq!(
            budget_alert_level(Decimal::ZERO, dec!(1), dec!(80), dec!(95)).unwrap(),
            BudgetAlertLevel::Critical
        );
    }

    #[test]
    fn test_oversized_amounts_are_rejected() {
        let huge = vec![LineItem::new(Decimal::MAX, dec!(2))];
        assert!(matches!(
            compute_invoice_totals(&huge, dec!(0), dec!(0)),
            Err(AppError::InvalidInput(_))
        ));

        let summed = vec![
            LineItem::new(Decimal::MAX, dec!(1)),
            LineItem::new(Decimal::MAX, dec!(1)),
        ];
        assert!(matches!(
            compute_invoice_totals(&summed, dec!(0), dec!(0)),
            Err(AppError::InvalidInput(_))
        ));

        let taxed = vec![LineItem::new(Decimal::MAX, dec!(1))];
        assert!(matches!(
            compute_invoice_totals(&taxed, dec!(0), dec!(1000)),
            Err(AppError::InvalidInput(_))
        ));

        let state = PaymentLedgerState::new(dec!(50), InvoiceStatus::Sent);
        let paid = apply_payment(&state, Decimal::MAX).unwrap();
        assert!(matches!(
            apply_payment(&paid, Decimal::MAX),
            Err(AppError::InvalidInput(_))
        ));

        assert!(budget_utilisation(dec!(0.0000001), Decimal::MAX).is_err());
    }
}
