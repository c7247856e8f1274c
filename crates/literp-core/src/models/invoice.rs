//! Invoice, invoice item and payment models
//!
//! Totals are never entered by hand: they are computed from the line items,
//! the discount percentage and the tax rate, and recomputed whenever either
//! rate changes. Payments move the invoice to `partial` or `paid`.

use crate::config::FinanceConfig;
use crate::error::AppError;
use crate::finance::{
    self, compute_invoice_totals_for_currency, InvoiceTotals, LineItem, PaymentLedgerState,
};
use crate::transitions::{TransitionMode, TransitionRule, TransitionTable};
use crate::AppResult;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Viewed,
    /// Some but not all of the total has been paid
    Partial,
    Paid,
    Overdue,
    Cancelled,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceStatus::Draft => write!(f, "draft"),
            InvoiceStatus::Sent => write!(f, "sent"),
            InvoiceStatus::Viewed => write!(f, "viewed"),
            InvoiceStatus::Partial => write!(f, "partial"),
            InvoiceStatus::Paid => write!(f, "paid"),
            InvoiceStatus::Overdue => write!(f, "overdue"),
            InvoiceStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl InvoiceStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(InvoiceStatus::Draft),
            "sent" => Some(InvoiceStatus::Sent),
            "viewed" => Some(InvoiceStatus::Viewed),
            "partial" => Some(InvoiceStatus::Partial),
            "paid" => Some(InvoiceStatus::Paid),
            "overdue" => Some(InvoiceStatus::Overdue),
            "cancelled" => Some(InvoiceStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether the invoice can still receive payments
    pub fn accepts_payments(&self) -> bool {
        !matches!(self, InvoiceStatus::Cancelled)
    }
}

/// Side effects of an invoice status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceEffect {
    /// Record sent_at unless already recorded
    StampSent,
    /// Record viewed_at unless already recorded
    StampViewed,
}

/// Manual status changes. `partial` and `paid` are only reached by
/// recording payments.
pub static INVOICE_TRANSITIONS: TransitionTable<InvoiceStatus, InvoiceEffect> =
    TransitionTable::new(
        "invoice",
        TransitionMode::Strict,
        &[
            TransitionRule {
                from: &[InvoiceStatus::Draft],
                to: InvoiceStatus::Sent,
                effects: &[InvoiceEffect::StampSent],
            },
            TransitionRule {
                from: &[InvoiceStatus::Sent],
                to: InvoiceStatus::Viewed,
                effects: &[InvoiceEffect::StampViewed],
            },
            TransitionRule {
                from: &[
                    InvoiceStatus::Sent,
                    InvoiceStatus::Viewed,
                    InvoiceStatus::Partial,
                ],
                to: InvoiceStatus::Overdue,
                effects: &[],
            },
            TransitionRule {
                from: &[
                    InvoiceStatus::Draft,
                    InvoiceStatus::Sent,
                    InvoiceStatus::Viewed,
                    InvoiceStatus::Overdue,
                ],
                to: InvoiceStatus::Cancelled,
                effects: &[],
            },
        ],
    );

/// How a payment was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    BankTransfer,
    CreditCard,
    Check,
    Cash,
    Paypal,
    Other,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::BankTransfer => write!(f, "bank_transfer"),
            PaymentMethod::CreditCard => write!(f, "credit_card"),
            PaymentMethod::Check => write!(f, "check"),
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Paypal => write!(f, "paypal"),
            PaymentMethod::Other => write!(f, "other"),
        }
    }
}

impl PaymentMethod {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            "credit_card" => Some(PaymentMethod::CreditCard),
            "check" => Some(PaymentMethod::Check),
            "cash" => Some(PaymentMethod::Cash),
            "paypal" => Some(PaymentMethod::Paypal),
            "other" => Some(PaymentMethod::Other),
            _ => None,
        }
    }
}

/// Invoice entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i32,
    pub invoice_number: String,
    pub client_id: i32,
    pub project_id: Option<i32>,

    // Billing snapshot taken when the invoice is issued
    pub billing_name: Option<String>,
    pub billing_address: Option<String>,
    pub billing_email: Option<String>,

    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,

    pub subtotal: Decimal,
    pub discount_percentage: Decimal,
    pub discount_amount: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub balance_due: Decimal,

    /// ISO 4217 code
    pub currency: String,
    pub notes: Option<String>,
    pub terms: Option<String>,
    /// Days between issue and due date
    pub payment_terms: i32,

    pub sent_at: Option<DateTime<Utc>>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub created_by_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Invoice line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: i32,
    pub invoice_id: i32,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// quantity × unit_price, unrounded
    pub amount: Decimal,
    pub project_phase: Option<String>,
    /// hourly, daily or fixed
    pub rate_type: Option<String>,
    pub hours: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl InvoiceItem {
    pub fn line_item(&self) -> LineItem {
        LineItem::new(self.quantity, self.unit_price)
    }
}

/// Recorded payment against an invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: i32,
    pub invoice_id: i32,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub payment_method: PaymentMethod,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub received_by_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Incoming payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub invoice_id: i32,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub payment_method: PaymentMethod,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub received_by_id: Option<i32>,
}

/// Line of an invoice that is being created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoiceItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub project_phase: Option<String>,
    pub rate_type: Option<String>,
    pub hours: Option<Decimal>,
}

impl NewInvoiceItem {
    pub fn line_item(&self) -> LineItem {
        LineItem::new(self.quantity, self.unit_price)
    }
}

/// Request to create an invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoice {
    pub invoice_number: String,
    pub client_id: i32,
    pub project_id: Option<i32>,
    pub billing_name: Option<String>,
    pub billing_address: Option<String>,
    pub billing_email: Option<String>,
    pub issue_date: NaiveDate,
    /// Derived from `payment_terms` when absent
    pub due_date: Option<NaiveDate>,
    pub discount_percentage: Decimal,
    pub tax_rate: Decimal,
    pub currency: Option<String>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub payment_terms: Option<i32>,
    pub items: Vec<NewInvoiceItem>,
    pub created_by_id: Option<i32>,
}

/// Validated invoice ready to be stored
#[derive(Debug, Clone)]
pub struct PreparedInvoice {
    pub invoice_number: String,
    pub client_id: i32,
    pub project_id: Option<i32>,
    pub billing_name: Option<String>,
    pub billing_address: Option<String>,
    pub billing_email: Option<String>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub totals: InvoiceTotals,
    pub currency: String,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub payment_terms: i32,
    pub items: Vec<PreparedInvoiceItem>,
    pub created_by_id: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct PreparedInvoiceItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub project_phase: Option<String>,
    pub rate_type: Option<String>,
    pub hours: Option<Decimal>,
}

impl NewInvoice {
    /// Validate the request, fill defaults and compute totals
    pub fn prepare(self, defaults: &FinanceConfig) -> AppResult<PreparedInvoice> {
        if self.invoice_number.trim().is_empty() {
            return Err(AppError::invalid("Invoice number must not be empty"));
        }

        let payment_terms = self.payment_terms.unwrap_or(defaults.default_payment_terms);
        if payment_terms < 0 {
            return Err(AppError::InvalidInput(format!(
                "Payment terms must not be negative, got {}",
                payment_terms
            )));
        }

        let due_date = match self.due_date {
            Some(d) => d,
            None => due_date_for(self.issue_date, payment_terms)?,
        };
        validate_dates(self.issue_date, due_date)?;

        let currency = self
            .currency
            .map(|c| c.trim().to_uppercase())
            .unwrap_or_else(|| defaults.default_currency.clone());

        let lines: Vec<LineItem> = self.items.iter().map(NewInvoiceItem::line_item).collect();
        let totals = compute_invoice_totals_for_currency(
            &lines,
            self.discount_percentage,
            self.tax_rate,
            &currency,
        )?;

        let items = self
            .items
            .into_iter()
            .map(|i| {
                Ok(PreparedInvoiceItem {
                    amount: i.line_item().amount()?,
                    description: i.description,
                    quantity: i.quantity,
                    unit_price: i.unit_price,
                    project_phase: i.project_phase,
                    rate_type: i.rate_type,
                    hours: i.hours,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PreparedInvoice {
            invoice_number: self.invoice_number,
            client_id: self.client_id,
            project_id: self.project_id,
            billing_name: self.billing_name,
            billing_address: self.billing_address,
            billing_email: self.billing_email,
            issue_date: self.issue_date,
            due_date,
            totals,
            currency,
            notes: self.notes,
            terms: self.terms,
            payment_terms,
            items,
            created_by_id: self.created_by_id,
        })
    }
}

/// Partial invoice update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceUpdate {
    pub status: Option<InvoiceStatus>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub billing_name: Option<String>,
    pub billing_address: Option<String>,
    pub billing_email: Option<String>,
    pub discount_percentage: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub payment_terms: Option<i32>,
}

impl InvoiceUpdate {
    pub fn changes_rates(&self) -> bool {
        self.discount_percentage.is_some() || self.tax_rate.is_some()
    }
}

/// Outcome of applying an `InvoiceUpdate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceChange {
    /// Status before the update
    pub from: InvoiceStatus,
    pub effects: &'static [InvoiceEffect],
    pub totals_recomputed: bool,
}

fn due_date_for(issue_date: NaiveDate, payment_terms: i32) -> AppResult<NaiveDate> {
    issue_date
        .checked_add_signed(Duration::days(i64::from(payment_terms)))
        .ok_or_else(|| AppError::invalid("Due date out of range"))
}

fn validate_dates(issue_date: NaiveDate, due_date: NaiveDate) -> AppResult<()> {
    if due_date < issue_date {
        return Err(AppError::InvalidInput(format!(
            "Due date {} is before issue date {}",
            due_date, issue_date
        )));
    }
    Ok(())
}

impl Invoice {
    pub fn ledger(&self) -> PaymentLedgerState {
        PaymentLedgerState {
            total_amount: self.total_amount,
            amount_paid: self.amount_paid,
            balance_due: self.balance_due,
            status: self.status,
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date < today
            && !matches!(self.status, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
            && self.balance_due > Decimal::ZERO
    }

    /// Apply a payment to the running balance and derive the new status
    pub fn record_payment(
        &mut self,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> AppResult<PaymentLedgerState> {
        if !self.status.accepts_payments() {
            return Err(AppError::Conflict(format!(
                "Invoice {} is {} and cannot receive payments",
                self.invoice_number, self.status
            )));
        }

        let state = finance::apply_payment(&self.ledger(), amount)?;
        self.amount_paid = state.amount_paid;
        self.balance_due = state.balance_due;
        self.status = state.status;
        self.updated_at = Some(now);
        Ok(state)
    }

    fn set_totals(&mut self, totals: InvoiceTotals) {
        self.subtotal = totals.subtotal;
        self.discount_percentage = totals.discount_percentage;
        self.discount_amount = totals.discount_amount;
        self.tax_rate = totals.tax_rate;
        self.tax_amount = totals.tax_amount;
        self.total_amount = totals.total_amount;
        self.balance_due = self.total_amount - self.amount_paid;
        if self.amount_paid > Decimal::ZERO {
            self.status =
                finance::derive_payment_status(self.balance_due, self.amount_paid, self.status);
        }
    }

    /// Apply a partial update.
    ///
    /// `items` are the invoice's stored lines; they are needed only when the
    /// discount or tax rate changes and the totals must be recomputed.
    /// Nothing is written if any part of the update is rejected.
    pub fn apply_update(
        &mut self,
        update: InvoiceUpdate,
        items: &[InvoiceItem],
        now: DateTime<Utc>,
    ) -> AppResult<InvoiceChange> {
        let from = self.status;
        let effects: &'static [InvoiceEffect] = match update.status {
            Some(to) => INVOICE_TRANSITIONS.resolve(self.status, to)?,
            None => &[],
        };

        let issue_date = update.issue_date.unwrap_or(self.issue_date);
        let due_date = update.due_date.unwrap_or(self.due_date);
        validate_dates(issue_date, due_date)?;

        if let Some(terms) = update.payment_terms {
            if terms < 0 {
                return Err(AppError::InvalidInput(format!(
                    "Payment terms must not be negative, got {}",
                    terms
                )));
            }
        }

        let totals = if update.changes_rates() {
            let lines: Vec<LineItem> = items.iter().map(InvoiceItem::line_item).collect();
            Some(compute_invoice_totals_for_currency(
                &lines,
                update.discount_percentage.unwrap_or(self.discount_percentage),
                update.tax_rate.unwrap_or(self.tax_rate),
                &self.currency,
            )?)
        } else {
            None
        };

        self.issue_date = issue_date;
        self.due_date = due_date;
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(v) = update.billing_name {
            self.billing_name = Some(v);
        }
        if let Some(v) = update.billing_address {
            self.billing_address = Some(v);
        }
        if let Some(v) = update.billing_email {
            self.billing_email = Some(v);
        }
        if let Some(v) = update.notes {
            self.notes = Some(v);
        }
        if let Some(v) = update.terms {
            self.terms = Some(v);
        }
        if let Some(v) = update.payment_terms {
            self.payment_terms = v;
        }

        let totals_recomputed = totals.is_some();
        if let Some(totals) = totals {
            self.set_totals(totals);
        }

        for effect in effects {
            match effect {
                InvoiceEffect::StampSent => {
                    self.sent_at.get_or_insert(now);
                }
                InvoiceEffect::StampViewed => {
                    self.viewed_at.get_or_insert(now);
                }
            }
        }
        self.updated_at = Some(now);

        Ok(InvoiceChange {
            from,
            effects,
            totals_recomputed,
        })
    }
}
