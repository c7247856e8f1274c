//! Invoice and payment repository implementation

use super::{is_unique_violation, parse_or_default};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use literp_core::{
    models::{
        Invoice, InvoiceChange, InvoiceItem, InvoiceStatus, InvoiceUpdate, NewPayment,
        PaymentMethod, PaymentRecord, PreparedInvoice,
    },
    traits::{InvoiceFilter, InvoiceRepository, Pagination},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error, info, instrument};

const INVOICE_COLUMNS: &str = r#"
    id, invoice_number, client_id, project_id, billing_name, billing_address,
    billing_email, issue_date, due_date, status, subtotal, discount_percentage,
    discount_amount, tax_rate, tax_amount, total_amount, amount_paid,
    balance_due, currency, notes, terms, payment_terms, sent_at, viewed_at,
    created_by_id, created_at, updated_at
"#;

const ITEM_COLUMNS: &str = r#"
    id, invoice_id, description, quantity, unit_price, amount, project_phase,
    rate_type, hours, created_at
"#;

const PAYMENT_COLUMNS: &str = r#"
    id, invoice_id, amount, payment_date, payment_method, reference_number,
    notes, received_by_id, created_at
"#;

/// PostgreSQL implementation of InvoiceRepository
pub struct PgInvoiceRepository {
    pool: PgPool,
}

impl PgInvoiceRepository {
    /// Create a new invoice repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })
    }

    async fn commit(tx: Transaction<'static, Postgres>) -> AppResult<()> {
        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })
    }

    /// Load an invoice and hold its row lock until `tx` ends
    async fn lock_invoice(tx: &mut Transaction<'static, Postgres>, id: i32) -> AppResult<Invoice> {
        let sql = format!(
            "SELECT {} FROM invoices WHERE id = $1 FOR UPDATE",
            INVOICE_COLUMNS
        );
        let row = sqlx::query_as::<Postgres, InvoiceRow>(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| {
                error!("Database error locking invoice {}: {}", id, e);
                AppError::Database(format!("Failed to lock invoice: {}", e))
            })?
            .ok_or_else(|| AppError::NotFound(format!("Invoice {}", id)))?;

        Ok(row.into())
    }

    async fn find_where(&self, clause: &str, key: InvoiceKey<'_>) -> AppResult<Option<Invoice>> {
        let sql = format!("SELECT {} FROM invoices WHERE {}", INVOICE_COLUMNS, clause);
        let query = sqlx::query_as::<Postgres, InvoiceRow>(&sql);
        let query = match key {
            InvoiceKey::Id(id) => query.bind(id),
            InvoiceKey::Number(number) => query.bind(number),
        };

        let result = query.fetch_optional(&self.pool).await.map_err(|e| {
            error!("Database error finding invoice: {}", e);
            AppError::Database(format!("Failed to find invoice: {}", e))
        })?;

        Ok(result.map(Into::into))
    }
}

enum InvoiceKey<'a> {
    Id(i32),
    Number(&'a str),
}

#[async_trait]
impl InvoiceRepository for PgInvoiceRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Invoice>> {
        debug!("Finding invoice by id: {}", id);
        self.find_where("id = $1", InvoiceKey::Id(id)).await
    }

    #[instrument(skip(self))]
    async fn find_by_number(&self, invoice_number: &str) -> AppResult<Option<Invoice>> {
        debug!("Finding invoice by number: {}", invoice_number);
        self.find_where("invoice_number = $1", InvoiceKey::Number(invoice_number))
            .await
    }

    #[instrument(skip(self))]
    async fn list(
        &self,
        filter: &InvoiceFilter,
        pagination: &Pagination,
    ) -> AppResult<(Vec<Invoice>, i64)> {
        debug!("Listing invoices with filter {:?}", filter);

        let status = filter.status.map(|s| s.to_string());

        const WHERE: &str = r#"
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::int IS NULL OR client_id = $2)
              AND ($3::int IS NULL OR project_id = $3)
        "#;

        let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM invoices {}", WHERE))
            .bind(&status)
            .bind(filter.client_id)
            .bind(filter.project_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting invoices: {}", e);
                AppError::Database(format!("Failed to count invoices: {}", e))
            })?;

        let sql = format!(
            "SELECT {} FROM invoices {} ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5",
            INVOICE_COLUMNS, WHERE
        );
        let rows = sqlx::query_as::<Postgres, InvoiceRow>(&sql)
            .bind(&status)
            .bind(filter.client_id)
            .bind(filter.project_id)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing invoices: {}", e);
                AppError::Database(format!("Failed to fetch invoices: {}", e))
            })?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }

    #[instrument(skip(self, invoice), fields(invoice_number = %invoice.invoice_number))]
    async fn create(&self, invoice: &PreparedInvoice) -> AppResult<Invoice> {
        let mut tx = self.begin().await?;

        let totals = &invoice.totals;
        let sql = format!(
            r#"
            INSERT INTO invoices (
                invoice_number, client_id, project_id, billing_name,
                billing_address, billing_email, issue_date, due_date, status,
                subtotal, discount_percentage, discount_amount, tax_rate,
                tax_amount, total_amount, amount_paid, balance_due, currency,
                notes, terms, payment_terms, created_by_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, 0, $15, $16, $17, $18, $19, $20)
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        );

        let row = sqlx::query_as::<Postgres, InvoiceRow>(&sql)
            .bind(&invoice.invoice_number)
            .bind(invoice.client_id)
            .bind(invoice.project_id)
            .bind(&invoice.billing_name)
            .bind(&invoice.billing_address)
            .bind(&invoice.billing_email)
            .bind(invoice.issue_date)
            .bind(invoice.due_date)
            .bind(InvoiceStatus::Draft.to_string())
            .bind(totals.subtotal)
            .bind(totals.discount_percentage)
            .bind(totals.discount_amount)
            .bind(totals.tax_rate)
            .bind(totals.tax_amount)
            .bind(totals.total_amount)
            .bind(&invoice.currency)
            .bind(&invoice.notes)
            .bind(&invoice.terms)
            .bind(invoice.payment_terms)
            .bind(invoice.created_by_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                error!("Database error creating invoice: {}", e);
                if is_unique_violation(&e) {
                    AppError::AlreadyExists(format!(
                        "Invoice {} already exists",
                        invoice.invoice_number
                    ))
                } else {
                    AppError::Database(format!("Failed to create invoice: {}", e))
                }
            })?;

        for item in &invoice.items {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (
                    invoice_id, description, quantity, unit_price, amount,
                    project_phase, rate_type, hours
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(row.id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.amount)
            .bind(&item.project_phase)
            .bind(&item.rate_type)
            .bind(item.hours)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Database error creating invoice item: {}", e);
                AppError::Database(format!("Failed to create invoice item: {}", e))
            })?;
        }

        Self::commit(tx).await?;

        info!(
            "Created invoice {} for client {} totalling {} {}",
            row.invoice_number, row.client_id, row.total_amount, row.currency
        );
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn find_items(&self, invoice_id: i32) -> AppResult<Vec<InvoiceItem>> {
        let sql = format!(
            "SELECT {} FROM invoice_items WHERE invoice_id = $1 ORDER BY id",
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<Postgres, ItemRow>(&sql)
            .bind(invoice_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error loading invoice items: {}", e);
                AppError::Database(format!("Failed to fetch invoice items: {}", e))
            })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, update))]
    async fn apply_update(
        &self,
        id: i32,
        update: InvoiceUpdate,
    ) -> AppResult<(Invoice, InvoiceChange)> {
        debug!("Updating invoice: {}", id);
        let mut tx = self.begin().await?;

        let mut invoice = Self::lock_invoice(&mut tx, id).await?;
        let items: Vec<InvoiceItem> = if update.changes_rates() {
            let sql = format!(
                "SELECT {} FROM invoice_items WHERE invoice_id = $1 ORDER BY id",
                ITEM_COLUMNS
            );
            sqlx::query_as::<Postgres, ItemRow>(&sql)
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| {
                    error!("Database error loading invoice items: {}", e);
                    AppError::Database(format!("Failed to fetch invoice items: {}", e))
                })?
                .into_iter()
                .map(Into::into)
                .collect()
        } else {
            Vec::new()
        };

        let change = invoice.apply_update(update, &items, Utc::now())?;

        // amount_paid is owned by record_payment and left as stored
        let sql = format!(
            r#"
            UPDATE invoices
            SET billing_name = $2,
                billing_address = $3,
                billing_email = $4,
                issue_date = $5,
                due_date = $6,
                status = $7,
                subtotal = $8,
                discount_percentage = $9,
                discount_amount = $10,
                tax_rate = $11,
                tax_amount = $12,
                total_amount = $13,
                balance_due = $14,
                notes = $15,
                terms = $16,
                payment_terms = $17,
                sent_at = $18,
                viewed_at = $19,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        );

        let row = sqlx::query_as::<Postgres, InvoiceRow>(&sql)
            .bind(invoice.id)
            .bind(&invoice.billing_name)
            .bind(&invoice.billing_address)
            .bind(&invoice.billing_email)
            .bind(invoice.issue_date)
            .bind(invoice.due_date)
            .bind(invoice.status.to_string())
            .bind(invoice.subtotal)
            .bind(invoice.discount_percentage)
            .bind(invoice.discount_amount)
            .bind(invoice.tax_rate)
            .bind(invoice.tax_amount)
            .bind(invoice.total_amount)
            .bind(invoice.balance_due)
            .bind(&invoice.notes)
            .bind(&invoice.terms)
            .bind(invoice.payment_terms)
            .bind(invoice.sent_at)
            .bind(invoice.viewed_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                error!("Database error updating invoice {}: {}", id, e);
                AppError::Database(format!("Failed to update invoice: {}", e))
            })?;

        Self::commit(tx).await?;
        Ok((row.into(), change))
    }

    #[instrument(skip(self, payment), fields(invoice_id = payment.invoice_id, amount = %payment.amount))]
    async fn record_payment(&self, payment: &NewPayment) -> AppResult<(PaymentRecord, Invoice)> {
        let mut tx = self.begin().await?;
        let mut invoice = Self::lock_invoice(&mut tx, payment.invoice_id).await?;

        let state = invoice.record_payment(payment.amount, Utc::now())?;

        sqlx::query(
            r#"
            UPDATE invoices
            SET amount_paid = $2, balance_due = $3, status = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(invoice.id)
        .bind(state.amount_paid)
        .bind(state.balance_due)
        .bind(state.status.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Database error updating invoice balance: {}", e);
            AppError::Database(format!("Failed to update invoice balance: {}", e))
        })?;

        let sql = format!(
            r#"
            INSERT INTO payment_records (
                invoice_id, amount, payment_date, payment_method,
                reference_number, notes, received_by_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );
        let record = sqlx::query_as::<Postgres, PaymentRow>(&sql)
            .bind(payment.invoice_id)
            .bind(payment.amount)
            .bind(payment.payment_date)
            .bind(payment.payment_method.to_string())
            .bind(&payment.reference_number)
            .bind(&payment.notes)
            .bind(payment.received_by_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                error!("Database error recording payment: {}", e);
                AppError::Database(format!("Failed to record payment: {}", e))
            })?;

        Self::commit(tx).await?;

        info!(
            "Recorded payment of {} on invoice {}: balance {} ({})",
            payment.amount, invoice.invoice_number, state.balance_due, state.status
        );
        Ok((record.into(), invoice))
    }

    #[instrument(skip(self))]
    async fn list_payments(&self, invoice_id: i32) -> AppResult<Vec<PaymentRecord>> {
        let sql = format!(
            "SELECT {} FROM payment_records WHERE invoice_id = $1 ORDER BY payment_date, id",
            PAYMENT_COLUMNS
        );
        let rows = sqlx::query_as::<Postgres, PaymentRow>(&sql)
            .bind(invoice_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing payments: {}", e);
                AppError::Database(format!("Failed to fetch payments: {}", e))
            })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: i32,
    invoice_number: String,
    client_id: i32,
    project_id: Option<i32>,
    billing_name: Option<String>,
    billing_address: Option<String>,
    billing_email: Option<String>,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    status: String,
    subtotal: Decimal,
    discount_percentage: Decimal,
    discount_amount: Decimal,
    tax_rate: Decimal,
    tax_amount: Decimal,
    total_amount: Decimal,
    amount_paid: Decimal,
    balance_due: Decimal,
    currency: String,
    notes: Option<String>,
    terms: Option<String>,
    payment_terms: i32,
    sent_at: Option<DateTime<Utc>>,
    viewed_at: Option<DateTime<Utc>>,
    created_by_id: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        Self {
            id: row.id,
            invoice_number: row.invoice_number,
            client_id: row.client_id,
            project_id: row.project_id,
            billing_name: row.billing_name,
            billing_address: row.billing_address,
            billing_email: row.billing_email,
            issue_date: row.issue_date,
            due_date: row.due_date,
            status: parse_or_default(&row.status, InvoiceStatus::from_str),
            subtotal: row.subtotal,
            discount_percentage: row.discount_percentage,
            discount_amount: row.discount_amount,
            tax_rate: row.tax_rate,
            tax_amount: row.tax_amount,
            total_amount: row.total_amount,
            amount_paid: row.amount_paid,
            balance_due: row.balance_due,
            currency: row.currency,
            notes: row.notes,
            terms: row.terms,
            payment_terms: row.payment_terms,
            sent_at: row.sent_at,
            viewed_at: row.viewed_at,
            created_by_id: row.created_by_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: i32,
    invoice_id: i32,
    description: String,
    quantity: Decimal,
    unit_price: Decimal,
    amount: Decimal,
    project_phase: Option<String>,
    rate_type: Option<String>,
    hours: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl From<ItemRow> for InvoiceItem {
    fn from(row: ItemRow) -> Self {
        Self {
            id: row.id,
            invoice_id: row.invoice_id,
            description: row.description,
            quantity: row.quantity,
            unit_price: row.unit_price,
            amount: row.amount,
            project_phase: row.project_phase,
            rate_type: row.rate_type,
            hours: row.hours,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: i32,
    invoice_id: i32,
    amount: Decimal,
    payment_date: NaiveDate,
    payment_method: String,
    reference_number: Option<String>,
    notes: Option<String>,
    received_by_id: Option<i32>,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for PaymentRecord {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: row.id,
            invoice_id: row.invoice_id,
            amount: row.amount,
            payment_date: row.payment_date,
            payment_method: parse_or_default(&row.payment_method, PaymentMethod::from_str),
            reference_number: row.reference_number,
            notes: row.notes,
            received_by_id: row.received_by_id,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_payment_row_conversion() {
        let row = PaymentRow {
            id: 1,
            invoice_id: 9,
            amount: dec!(250.00),
            payment_date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            payment_method: "bank_transfer".to_string(),
            reference_number: Some("TRX-1".to_string()),
            notes: None,
            received_by_id: None,
            created_at: Utc::now(),
        };

        let record: PaymentRecord = row.into();
        assert_eq!(record.payment_method, PaymentMethod::BankTransfer);
        assert_eq!(record.amount, dec!(250.00));
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_payment_on_missing_invoice() {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/literp".to_string());
        let pool = PgPool::connect(&url).await.unwrap();
        let repo = PgInvoiceRepository::new(pool);

        let payment = NewPayment {
            invoice_id: -1,
            amount: dec!(10),
            payment_date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            payment_method: PaymentMethod::Cash,
            reference_number: None,
            notes: None,
            received_by_id: None,
        };
        let err = repo.record_payment(&payment).await.unwrap_err();
        assert_eq!(err.error_code(), "not_found");

        let err = repo
            .apply_update(-1, InvoiceUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "not_found");
    }
}
