//! Equipment booking repository implementation
//!
//! Conflict-checked writes lock the equipment row first, so two requests for
//! the same equipment serialize and cannot both pass the overlap check.
//! Updates lock the booking row before the equipment row.

use super::parse_or_default;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use literp_core::{
    models::{BookingChange, BookingStatus, BookingUpdate, EquipmentBooking, NewBooking},
    traits::{BookingFilter, BookingRepository, Pagination},
    AppError, AppResult, BookingWindow, ConflictChecker,
};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error, info, instrument, warn};

const BOOKING_COLUMNS: &str = r#"
    id, equipment_id, project_id, booked_by_id, start_date, end_date, status,
    checked_out_at, checked_out_by_id, returned_at, returned_to_id,
    return_condition, damage_reported, damage_notes, purpose, notes,
    created_at, updated_at
"#;

/// PostgreSQL implementation of BookingRepository
pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    /// Create a new booking repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lock the equipment row for the rest of the transaction
    async fn lock_equipment(
        tx: &mut Transaction<'static, Postgres>,
        equipment_id: i32,
    ) -> AppResult<()> {
        let locked: Option<(i32,)> =
            sqlx::query_as("SELECT id FROM equipment WHERE id = $1 AND is_active FOR UPDATE")
                .bind(equipment_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| {
                    error!("Database error locking equipment {}: {}", equipment_id, e);
                    AppError::Database(format!("Failed to lock equipment: {}", e))
                })?;

        match locked {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(format!("Equipment {}", equipment_id))),
        }
    }

    async fn lock_booking(
        tx: &mut Transaction<'static, Postgres>,
        id: i32,
    ) -> AppResult<EquipmentBooking> {
        let sql = format!(
            "SELECT {} FROM equipment_bookings WHERE id = $1 FOR UPDATE",
            BOOKING_COLUMNS
        );
        let row = sqlx::query_as::<Postgres, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| {
                error!("Database error locking booking {}: {}", id, e);
                AppError::Database(format!("Failed to lock booking: {}", e))
            })?
            .ok_or_else(|| AppError::NotFound(format!("Booking {}", id)))?;

        Ok(row.into())
    }

    async fn windows_in_tx(
        tx: &mut Transaction<'static, Postgres>,
        equipment_id: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<BookingWindow>> {
        let rows = sqlx::query_as::<Postgres, WindowRow>(
            r#"
            SELECT id, equipment_id, start_date, end_date, status
            FROM equipment_bookings
            WHERE equipment_id = $1 AND start_date < $3 AND end_date > $2
            "#,
        )
        .bind(equipment_id)
        .bind(start)
        .bind(end)
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| {
            error!("Database error loading booking windows: {}", e);
            AppError::Database(format!("Failed to load booking windows: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Run the overlap check for `candidate` inside `tx`
    async fn check_in_tx(
        tx: &mut Transaction<'static, Postgres>,
        checker: &ConflictChecker,
        candidate: &BookingWindow,
        exclude: Option<i32>,
    ) -> AppResult<()> {
        candidate.validate()?;
        let existing =
            Self::windows_in_tx(tx, candidate.resource_id, candidate.start, candidate.end).await?;

        if let Some(hit) = checker.find_conflict(candidate, &existing, exclude)? {
            let booking_id = hit.booking_id.unwrap_or_default();
            warn!(
                "Booking window {} - {} on equipment {} conflicts with booking {}",
                candidate.start, candidate.end, candidate.resource_id, booking_id
            );
            return Err(AppError::BookingConflict {
                equipment_id: candidate.resource_id,
                booking_id,
            });
        }
        Ok(())
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i32) -> AppResult<Option<EquipmentBooking>> {
        debug!("Finding booking by id: {}", id);

        let sql = format!(
            "SELECT {} FROM equipment_bookings WHERE id = $1",
            BOOKING_COLUMNS
        );
        let result = sqlx::query_as::<Postgres, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding booking {}: {}", id, e);
                AppError::Database(format!("Failed to find booking: {}", e))
            })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list(
        &self,
        filter: &BookingFilter,
        pagination: &Pagination,
    ) -> AppResult<(Vec<EquipmentBooking>, i64)> {
        debug!("Listing bookings with filter {:?}", filter);

        let status = filter.status.map(|s| s.to_string());

        const WHERE: &str = r#"
            WHERE ($1::int IS NULL OR equipment_id = $1)
              AND ($2::int IS NULL OR project_id = $2)
              AND ($3::text IS NULL OR status = $3)
        "#;

        let total: (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM equipment_bookings {}",
            WHERE
        ))
        .bind(filter.equipment_id)
        .bind(filter.project_id)
        .bind(&status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error counting bookings: {}", e);
            AppError::Database(format!("Failed to count bookings: {}", e))
        })?;

        let sql = format!(
            "SELECT {} FROM equipment_bookings {} ORDER BY start_date DESC, id DESC LIMIT $4 OFFSET $5",
            BOOKING_COLUMNS, WHERE
        );
        let rows = sqlx::query_as::<Postgres, BookingRow>(&sql)
            .bind(filter.equipment_id)
            .bind(filter.project_id)
            .bind(&status)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing bookings: {}", e);
                AppError::Database(format!("Failed to fetch bookings: {}", e))
            })?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }

    #[instrument(skip(self))]
    async fn overlapping_windows(
        &self,
        equipment_id: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<BookingWindow>> {
        let rows = sqlx::query_as::<Postgres, WindowRow>(
            r#"
            SELECT id, equipment_id, start_date, end_date, status
            FROM equipment_bookings
            WHERE equipment_id = $1 AND start_date < $3 AND end_date > $2
            ORDER BY start_date
            "#,
        )
        .bind(equipment_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error loading booking windows: {}", e);
            AppError::Database(format!("Failed to load booking windows: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, booking, checker), fields(equipment_id = booking.equipment_id))]
    async fn create_checked(
        &self,
        booking: &NewBooking,
        checker: &ConflictChecker,
    ) -> AppResult<EquipmentBooking> {
        booking.validate()?;

        let mut tx = self.begin().await?;
        Self::lock_equipment(&mut tx, booking.equipment_id).await?;

        let candidate =
            BookingWindow::candidate(booking.equipment_id, booking.start_date, booking.end_date);
        Self::check_in_tx(&mut tx, checker, &candidate, None).await?;

        let sql = format!(
            r#"
            INSERT INTO equipment_bookings (
                equipment_id, project_id, booked_by_id, start_date, end_date,
                status, damage_reported, purpose, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7, $8)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );

        let row = sqlx::query_as::<Postgres, BookingRow>(&sql)
            .bind(booking.equipment_id)
            .bind(booking.project_id)
            .bind(booking.booked_by_id)
            .bind(booking.start_date)
            .bind(booking.end_date)
            .bind(BookingStatus::Pending.to_string())
            .bind(&booking.purpose)
            .bind(&booking.notes)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                error!("Database error creating booking: {}", e);
                AppError::Database(format!("Failed to create booking: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit booking: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        info!(
            "Booked equipment {} from {} to {} (booking {})",
            row.equipment_id, row.start_date, row.end_date, row.id
        );
        Ok(row.into())
    }

    #[instrument(skip(self, update, checker))]
    async fn update_checked(
        &self,
        id: i32,
        update: BookingUpdate,
        actor_id: i32,
        checker: &ConflictChecker,
    ) -> AppResult<(EquipmentBooking, BookingChange)> {
        let mut tx = self.begin().await?;

        let mut booking = Self::lock_booking(&mut tx, id).await?;
        let change = booking.apply_update(update, actor_id, Utc::now())?;

        if checker.requires_check(&booking, &change) {
            Self::lock_equipment(&mut tx, booking.equipment_id).await?;
            let candidate = BookingWindow::candidate(
                booking.equipment_id,
                booking.start_date,
                booking.end_date,
            );
            Self::check_in_tx(&mut tx, checker, &candidate, Some(booking.id)).await?;
        }

        let sql = format!(
            r#"
            UPDATE equipment_bookings
            SET start_date = $2,
                end_date = $3,
                status = $4,
                checked_out_at = $5,
                checked_out_by_id = $6,
                returned_at = $7,
                returned_to_id = $8,
                return_condition = $9,
                damage_reported = $10,
                damage_notes = $11,
                purpose = $12,
                notes = $13,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );

        let row = sqlx::query_as::<Postgres, BookingRow>(&sql)
            .bind(booking.id)
            .bind(booking.start_date)
            .bind(booking.end_date)
            .bind(booking.status.to_string())
            .bind(booking.checked_out_at)
            .bind(booking.checked_out_by_id)
            .bind(booking.returned_at)
            .bind(booking.returned_to_id)
            .bind(&booking.return_condition)
            .bind(booking.damage_reported)
            .bind(&booking.damage_notes)
            .bind(&booking.purpose)
            .bind(&booking.notes)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                error!("Database error updating booking {}: {}", booking.id, e);
                AppError::Database(format!("Failed to update booking: {}", e))
            })?;

        if let Some(status) = change.equipment_status() {
            sqlx::query("UPDATE equipment SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(booking.equipment_id)
                .bind(status.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    error!(
                        "Database error setting equipment {} status: {}",
                        booking.equipment_id, e
                    );
                    AppError::Database(format!("Failed to update equipment status: {}", e))
                })?;
            debug!("Equipment {} marked {}", booking.equipment_id, status);
        }

        tx.commit().await.map_err(|e| {
            error!("Failed to commit booking update: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        Ok((row.into(), change))
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: i32,
    equipment_id: i32,
    project_id: Option<i32>,
    booked_by_id: i32,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    status: String,
    checked_out_at: Option<DateTime<Utc>>,
    checked_out_by_id: Option<i32>,
    returned_at: Option<DateTime<Utc>>,
    returned_to_id: Option<i32>,
    return_condition: Option<String>,
    damage_reported: bool,
    damage_notes: Option<String>,
    purpose: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<BookingRow> for EquipmentBooking {
    fn from(row: BookingRow) -> Self {
        Self {
            id: row.id,
            equipment_id: row.equipment_id,
            project_id: row.project_id,
            booked_by_id: row.booked_by_id,
            start_date: row.start_date,
            end_date: row.end_date,
            status: parse_or_default(&row.status, BookingStatus::from_str),
            checked_out_at: row.checked_out_at,
            checked_out_by_id: row.checked_out_by_id,
            returned_at: row.returned_at,
            returned_to_id: row.returned_to_id,
            return_condition: row.return_condition,
            damage_reported: row.damage_reported,
            damage_notes: row.damage_notes,
            purpose: row.purpose,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WindowRow {
    id: i32,
    equipment_id: i32,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    status: String,
}

impl From<WindowRow> for BookingWindow {
    fn from(row: WindowRow) -> Self {
        Self {
            booking_id: Some(row.id),
            resource_id: row.equipment_id,
            start: row.start_date,
            end: row.end_date,
            status: parse_or_default(&row.status, BookingStatus::from_str),
        }
    }
}
