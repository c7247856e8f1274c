//! Invoice service
//!
//! Creates invoices from line items, applies updates and records payments.
//! Totals always come from the financial calculator in `literp-core`.

use chrono::NaiveDate;
use literp_core::{
    config::FinanceConfig,
    models::{
        Invoice, InvoiceItem, InvoiceStatus, InvoiceUpdate, NewInvoice, NewPayment,
        PaymentRecord,
    },
    traits::{InvoiceFilter, InvoiceRepository, Pagination, PaginatedResponse},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Page size used when sweeping all invoices
const SWEEP_PAGE_SIZE: i64 = 500;

/// Invoice service
pub struct InvoiceService<I: InvoiceRepository> {
    invoice_repo: Arc<I>,
    finance: FinanceConfig,
}

impl<I: InvoiceRepository> InvoiceService<I> {
    /// Create a new invoice service
    pub fn new(invoice_repo: Arc<I>, finance: FinanceConfig) -> Self {
        Self {
            invoice_repo,
            finance,
        }
    }

    /// Create a draft invoice.
    ///
    /// Defaults the currency and payment terms from configuration, derives
    /// the due date and computes the totals before anything is stored.
    #[instrument(skip(self, invoice), fields(invoice_number = %invoice.invoice_number))]
    pub async fn create_invoice(&self, invoice: NewInvoice) -> AppResult<Invoice> {
        let prepared = invoice.prepare(&self.finance).inspect_err(|e| {
            warn!("Rejected invoice: {}", e);
        })?;

        debug!(
            "Prepared invoice {}: subtotal {}, total {} {}",
            prepared.invoice_number,
            prepared.totals.subtotal,
            prepared.totals.total_amount,
            prepared.currency
        );

        self.invoice_repo.create(&prepared).await
    }

    pub async fn get_invoice(&self, id: i32) -> AppResult<Invoice> {
        self.invoice_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Invoice {}", id)))
    }

    pub async fn get_by_number(&self, invoice_number: &str) -> AppResult<Invoice> {
        self.invoice_repo
            .find_by_number(invoice_number)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Invoice {}", invoice_number)))
    }

    pub async fn list_invoices(
        &self,
        filter: &InvoiceFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<Invoice>> {
        let (data, total) = self.invoice_repo.list(filter, pagination).await?;
        Ok(PaginatedResponse::new(data, total, pagination))
    }

    pub async fn invoice_items(&self, invoice_id: i32) -> AppResult<Vec<InvoiceItem>> {
        self.invoice_repo.find_items(invoice_id).await
    }

    /// Apply a partial update.
    ///
    /// Changing the discount or tax rate recomputes the totals from the
    /// stored items and the balance against what has already been paid.
    #[instrument(skip(self, update))]
    pub async fn update_invoice(&self, id: i32, update: InvoiceUpdate) -> AppResult<Invoice> {
        let (invoice, change) = self
            .invoice_repo
            .apply_update(id, update)
            .await
            .inspect_err(|e| debug!("Rejected update of invoice {}: {}", id, e))?;

        if change.totals_recomputed {
            info!(
                "Recomputed invoice {} totals: total {}, balance {}",
                invoice.invoice_number, invoice.total_amount, invoice.balance_due
            );
        }
        if change.from != invoice.status {
            info!(
                "Invoice {} moved {} -> {}",
                invoice.invoice_number, change.from, invoice.status
            );
        }

        Ok(invoice)
    }

    /// Record a payment against an invoice.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the amount is not positive
    /// - `NotFound` if the invoice does not exist
    /// - `Conflict` if the invoice is cancelled
    #[instrument(skip(self, payment), fields(invoice_id = payment.invoice_id, amount = %payment.amount))]
    pub async fn record_payment(&self, payment: NewPayment) -> AppResult<(PaymentRecord, Invoice)> {
        if payment.amount <= Decimal::ZERO {
            warn!("Rejected non-positive payment of {}", payment.amount);
            return Err(AppError::InvalidInput(format!(
                "Payment amount must be positive, got {}",
                payment.amount
            )));
        }

        self.invoice_repo.record_payment(&payment).await
    }

    pub async fn list_payments(&self, invoice_id: i32) -> AppResult<Vec<PaymentRecord>> {
        self.invoice_repo.list_payments(invoice_id).await
    }

    /// Move every unpaid invoice past its due date to `overdue`.
    ///
    /// Returns the number of invoices changed.
    #[instrument(skip(self))]
    pub async fn mark_overdue(&self, today: NaiveDate) -> AppResult<usize> {
        let mut marked = 0;

        for status in [InvoiceStatus::Sent, InvoiceStatus::Viewed, InvoiceStatus::Partial] {
            let filter = InvoiceFilter {
                status: Some(status),
                ..Default::default()
            };
            for invoice in self.collect_all(&filter).await? {
                if !invoice.is_overdue(today) {
                    continue;
                }
                let update = InvoiceUpdate {
                    status: Some(InvoiceStatus::Overdue),
                    ..Default::default()
                };
                match self.update_invoice(invoice.id, update).await {
                    Ok(_) => marked += 1,
                    // Settled or cancelled since it was listed
                    Err(AppError::InvalidTransition { .. }) => {
                        debug!("Invoice {} no longer eligible for overdue", invoice.id);
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if marked > 0 {
            info!("Marked {} invoices overdue as of {}", marked, today);
        }
        Ok(marked)
    }

    /// Sum of balances still owed by a client on issued invoices
    #[instrument(skip(self))]
    pub async fn outstanding_balance(&self, client_id: i32) -> AppResult<Decimal> {
        let filter = InvoiceFilter {
            client_id: Some(client_id),
            ..Default::default()
        };

        let invoices = self.collect_all(&filter).await?;
        invoices
            .iter()
            .filter(|inv| {
                matches!(
                    inv.status,
                    InvoiceStatus::Sent
                        | InvoiceStatus::Viewed
                        | InvoiceStatus::Partial
                        | InvoiceStatus::Overdue
                )
            })
            .try_fold(Decimal::ZERO, |acc, inv| {
                acc.checked_add(inv.balance_due)
                    .ok_or_else(|| AppError::invalid("amount out of range"))
            })
    }

    async fn collect_all(&self, filter: &InvoiceFilter) -> AppResult<Vec<Invoice>> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let pagination = Pagination::new(page, SWEEP_PAGE_SIZE);
            let (batch, total) = self.invoice_repo.list(filter, &pagination).await?;
            let done = batch.is_empty() || (all.len() + batch.len()) as i64 >= total;
            all.extend(batch);
            if done {
                return Ok(all);
            }
            page += 1;
        }
    }
}
