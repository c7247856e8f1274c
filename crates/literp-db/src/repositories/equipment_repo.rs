//! Equipment and maintenance repository implementation
//!
//! Equipment is never deleted, only deactivated. Maintenance writes update
//! the equipment's maintenance dates in the same transaction.

use super::{is_unique_violation, parse_or_default};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use literp_core::{
    models::{
        Equipment, EquipmentCategory, EquipmentStatus, MaintenanceRecord, MaintenanceSchedule,
        MaintenanceType, NewEquipment, NewMaintenanceRecord,
    },
    traits::{EquipmentFilter, EquipmentRepository, Pagination},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error, info, instrument};

const EQUIPMENT_COLUMNS: &str = r#"
    id, name, code, category, brand, model, serial_number, description,
    status, condition_notes, purchase_date, purchase_price, current_value,
    storage_location, current_location, is_rentable, daily_rate, weekly_rate,
    last_maintenance_date, next_maintenance_date, notes, is_active,
    created_at, updated_at
"#;

const MAINTENANCE_COLUMNS: &str = r#"
    id, equipment_id, maintenance_type, description, scheduled_date,
    completed_date, cost, vendor, performed_by, performed_by_id, findings,
    parts_replaced, next_maintenance_date, notes, created_at, updated_at
"#;

/// PostgreSQL implementation of EquipmentRepository
pub struct PgEquipmentRepository {
    pool: PgPool,
}

impl PgEquipmentRepository {
    /// Create a new equipment repository
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

    /// Apply maintenance dates to an equipment row inside `tx`
    async fn apply_schedule(
        tx: &mut Transaction<'static, Postgres>,
        equipment_id: i32,
        schedule: &MaintenanceSchedule,
    ) -> AppResult<()> {
        if schedule.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            UPDATE equipment
            SET last_maintenance_date = COALESCE($2, last_maintenance_date),
                next_maintenance_date = COALESCE($3, next_maintenance_date),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(equipment_id)
        .bind(schedule.last_maintenance_date)
        .bind(schedule.next_maintenance_date)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            error!(
                "Database error updating maintenance dates for equipment {}: {}",
                equipment_id, e
            );
            AppError::Database(format!("Failed to update maintenance dates: {}", e))
        })?;

        Ok(())
    }
}

#[async_trait]
impl EquipmentRepository for PgEquipmentRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Equipment>> {
        debug!("Finding equipment by id: {}", id);

        let sql = format!("SELECT {} FROM equipment WHERE id = $1", EQUIPMENT_COLUMNS);
        let result = sqlx::query_as::<Postgres, EquipmentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding equipment {}: {}", id, e);
                AppError::Database(format!("Failed to find equipment: {}", e))
            })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_by_code(&self, code: &str) -> AppResult<Option<Equipment>> {
        debug!("Finding equipment by code: {}", code);

        let sql = format!("SELECT {} FROM equipment WHERE code = $1", EQUIPMENT_COLUMNS);
        let result = sqlx::query_as::<Postgres, EquipmentRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding equipment by code: {}", e);
                AppError::Database(format!("Failed to find equipment: {}", e))
            })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list(
        &self,
        filter: &EquipmentFilter,
        pagination: &Pagination,
    ) -> AppResult<(Vec<Equipment>, i64)> {
        debug!("Listing equipment with filter {:?}", filter);

        let category = filter.category.map(|c| c.to_string());
        let status = filter.status.map(|s| s.to_string());

        const WHERE: &str = r#"
            WHERE ($1::text IS NULL OR category = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3 OR is_active)
        "#;

        let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM equipment {}", WHERE))
            .bind(&category)
            .bind(&status)
            .bind(filter.include_inactive)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting equipment: {}", e);
                AppError::Database(format!("Failed to count equipment: {}", e))
            })?;

        let sql = format!(
            "SELECT {} FROM equipment {} ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5",
            EQUIPMENT_COLUMNS, WHERE
        );
        let rows = sqlx::query_as::<Postgres, EquipmentRow>(&sql)
            .bind(&category)
            .bind(&status)
            .bind(filter.include_inactive)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing equipment: {}", e);
                AppError::Database(format!("Failed to fetch equipment: {}", e))
            })?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }

    #[instrument(skip(self, equipment), fields(code = %equipment.code))]
    async fn create(&self, equipment: &NewEquipment) -> AppResult<Equipment> {
        debug!("Creating equipment: {}", equipment.code);

        let sql = format!(
            r#"
            INSERT INTO equipment (
                name, code, category, brand, model, serial_number, description,
                status, purchase_date, purchase_price, current_value,
                storage_location, is_rentable, daily_rate, weekly_rate, notes,
                is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, TRUE)
            RETURNING {}
            "#,
            EQUIPMENT_COLUMNS
        );

        let row = sqlx::query_as::<Postgres, EquipmentRow>(&sql)
            .bind(&equipment.name)
            .bind(&equipment.code)
            .bind(equipment.category.to_string())
            .bind(&equipment.brand)
            .bind(&equipment.model)
            .bind(&equipment.serial_number)
            .bind(&equipment.description)
            .bind(EquipmentStatus::Available.to_string())
            .bind(equipment.purchase_date)
            .bind(equipment.purchase_price)
            .bind(equipment.current_value)
            .bind(&equipment.storage_location)
            .bind(equipment.is_rentable)
            .bind(equipment.daily_rate)
            .bind(equipment.weekly_rate)
            .bind(&equipment.notes)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error creating equipment: {}", e);
                if is_unique_violation(&e) {
                    AppError::AlreadyExists(format!("Equipment {} already exists", equipment.code))
                } else {
                    AppError::Database(format!("Failed to create equipment: {}", e))
                }
            })?;

        info!("Registered equipment {} ({})", row.code, row.id);
        Ok(row.into())
    }

    #[instrument(skip(self, equipment), fields(id = equipment.id))]
    async fn update(&self, equipment: &Equipment) -> AppResult<Equipment> {
        debug!("Updating equipment: {}", equipment.id);

        let sql = format!(
            r#"
            UPDATE equipment
            SET name = $2,
                category = $3,
                brand = $4,
                model = $5,
                serial_number = $6,
                description = $7,
                status = $8,
                condition_notes = $9,
                current_value = $10,
                storage_location = $11,
                current_location = $12,
                is_rentable = $13,
                daily_rate = $14,
                weekly_rate = $15,
                notes = $16,
                is_active = $17,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            EQUIPMENT_COLUMNS
        );

        let row = sqlx::query_as::<Postgres, EquipmentRow>(&sql)
            .bind(equipment.id)
            .bind(&equipment.name)
            .bind(equipment.category.to_string())
            .bind(&equipment.brand)
            .bind(&equipment.model)
            .bind(&equipment.serial_number)
            .bind(&equipment.description)
            .bind(equipment.status.to_string())
            .bind(&equipment.condition_notes)
            .bind(equipment.current_value)
            .bind(&equipment.storage_location)
            .bind(&equipment.current_location)
            .bind(equipment.is_rentable)
            .bind(equipment.daily_rate)
            .bind(equipment.weekly_rate)
            .bind(&equipment.notes)
            .bind(equipment.is_active)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error updating equipment {}: {}", equipment.id, e);
                AppError::Database(format!("Failed to update equipment: {}", e))
            })?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {}", equipment.id)))?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn set_status(&self, id: i32, status: EquipmentStatus) -> AppResult<()> {
        debug!("Setting equipment {} status to {}", id, status);

        let result = sqlx::query("UPDATE equipment SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error setting equipment {} status: {}", id, e);
                AppError::Database(format!("Failed to update equipment status: {}", e))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Equipment {}", id)));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn deactivate(&self, id: i32) -> AppResult<bool> {
        debug!("Deactivating equipment: {}", id);

        let result = sqlx::query(
            "UPDATE equipment SET is_active = FALSE, updated_at = NOW() WHERE id = $1 AND is_active",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error deactivating equipment {}: {}", id, e);
            AppError::Database(format!("Failed to deactivate equipment: {}", e))
        })?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, record), fields(equipment_id = record.equipment_id))]
    async fn create_maintenance(
        &self,
        record: &NewMaintenanceRecord,
    ) -> AppResult<MaintenanceRecord> {
        let mut tx = self.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO maintenance_records (
                equipment_id, maintenance_type, description, scheduled_date,
                cost, vendor, performed_by, performed_by_id, findings,
                parts_replaced, next_maintenance_date, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            MAINTENANCE_COLUMNS
        );

        let row = sqlx::query_as::<Postgres, MaintenanceRow>(&sql)
            .bind(record.equipment_id)
            .bind(record.maintenance_type.to_string())
            .bind(&record.description)
            .bind(record.scheduled_date)
            .bind(record.cost)
            .bind(&record.vendor)
            .bind(&record.performed_by)
            .bind(record.performed_by_id)
            .bind(&record.findings)
            .bind(&record.parts_replaced)
            .bind(record.next_maintenance_date)
            .bind(&record.notes)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                error!("Database error creating maintenance record: {}", e);
                AppError::Database(format!("Failed to create maintenance record: {}", e))
            })?;

        Self::apply_schedule(&mut tx, record.equipment_id, &record.schedule()).await?;
        Self::commit(tx).await?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn find_maintenance(&self, id: i32) -> AppResult<Option<MaintenanceRecord>> {
        debug!("Finding maintenance record: {}", id);

        let sql = format!(
            "SELECT {} FROM maintenance_records WHERE id = $1",
            MAINTENANCE_COLUMNS
        );
        let result = sqlx::query_as::<Postgres, MaintenanceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding maintenance record {}: {}", id, e);
                AppError::Database(format!("Failed to find maintenance record: {}", e))
            })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self, record, schedule), fields(id = record.id))]
    async fn update_maintenance(
        &self,
        record: &MaintenanceRecord,
        schedule: &MaintenanceSchedule,
    ) -> AppResult<MaintenanceRecord> {
        let mut tx = self.begin().await?;

        let sql = format!(
            r#"
            UPDATE maintenance_records
            SET maintenance_type = $2,
                description = $3,
                scheduled_date = $4,
                completed_date = $5,
                cost = $6,
                vendor = $7,
                performed_by = $8,
                findings = $9,
                parts_replaced = $10,
                next_maintenance_date = $11,
                notes = $12,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            MAINTENANCE_COLUMNS
        );

        let row = sqlx::query_as::<Postgres, MaintenanceRow>(&sql)
            .bind(record.id)
            .bind(record.maintenance_type.to_string())
            .bind(&record.description)
            .bind(record.scheduled_date)
            .bind(record.completed_date)
            .bind(record.cost)
            .bind(&record.vendor)
            .bind(&record.performed_by)
            .bind(&record.findings)
            .bind(&record.parts_replaced)
            .bind(record.next_maintenance_date)
            .bind(&record.notes)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                error!("Database error updating maintenance record {}: {}", record.id, e);
                AppError::Database(format!("Failed to update maintenance record: {}", e))
            })?
            .ok_or_else(|| AppError::NotFound(format!("Maintenance record {}", record.id)))?;

        Self::apply_schedule(&mut tx, record.equipment_id, schedule).await?;
        Self::commit(tx).await?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn list_maintenance(&self, equipment_id: i32) -> AppResult<Vec<MaintenanceRecord>> {
        debug!("Listing maintenance for equipment {}", equipment_id);

        let sql = format!(
            "SELECT {} FROM maintenance_records WHERE equipment_id = $1 ORDER BY created_at DESC",
            MAINTENANCE_COLUMNS
        );
        let rows = sqlx::query_as::<Postgres, MaintenanceRow>(&sql)
            .bind(equipment_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing maintenance: {}", e);
                AppError::Database(format!("Failed to fetch maintenance records: {}", e))
            })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct EquipmentRow {
    id: i32,
    name: String,
    code: String,
    category: String,
    brand: Option<String>,
    model: Option<String>,
    serial_number: Option<String>,
    description: Option<String>,
    status: String,
    condition_notes: Option<String>,
    purchase_date: Option<NaiveDate>,
    purchase_price: Option<Decimal>,
    current_value: Option<Decimal>,
    storage_location: Option<String>,
    current_location: Option<String>,
    is_rentable: bool,
    daily_rate: Option<Decimal>,
    weekly_rate: Option<Decimal>,
    last_maintenance_date: Option<NaiveDate>,
    next_maintenance_date: Option<NaiveDate>,
    notes: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<EquipmentRow> for Equipment {
    fn from(row: EquipmentRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            code: row.code,
            category: parse_or_default(&row.category, EquipmentCategory::from_str),
            brand: row.brand,
            model: row.model,
            serial_number: row.serial_number,
            description: row.description,
            status: parse_or_default(&row.status, EquipmentStatus::from_str),
            condition_notes: row.condition_notes,
            purchase_date: row.purchase_date,
            purchase_price: row.purchase_price,
            current_value: row.current_value,
            storage_location: row.storage_location,
            current_location: row.current_location,
            is_rentable: row.is_rentable,
            daily_rate: row.daily_rate,
            weekly_rate: row.weekly_rate,
            last_maintenance_date: row.last_maintenance_date,
            next_maintenance_date: row.next_maintenance_date,
            notes: row.notes,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MaintenanceRow {
    id: i32,
    equipment_id: i32,
    maintenance_type: String,
    description: String,
    scheduled_date: Option<NaiveDate>,
    completed_date: Option<NaiveDate>,
    cost: Option<Decimal>,
    vendor: Option<String>,
    performed_by: Option<String>,
    performed_by_id: Option<i32>,
    findings: Option<String>,
    parts_replaced: Option<String>,
    next_maintenance_date: Option<NaiveDate>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<MaintenanceRow> for MaintenanceRecord {
    fn from(row: MaintenanceRow) -> Self {
        Self {
            id: row.id,
            equipment_id: row.equipment_id,
            maintenance_type: parse_or_default(&row.maintenance_type, MaintenanceType::from_str),
            description: row.description,
            scheduled_date: row.scheduled_date,
            completed_date: row.completed_date,
            cost: row.cost,
            vendor: row.vendor,
            performed_by: row.performed_by,
            performed_by_id: row.performed_by_id,
            findings: row.findings,
            parts_replaced: row.parts_replaced,
            next_maintenance_date: row.next_maintenance_date,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
