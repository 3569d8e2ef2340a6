//! SQL implementation of the booking repository
//!
//! Appointment instants are stored as unix seconds (UTC) because the `Any`
//! driver cannot decode timestamp columns.

use crate::client::{DbBackend, DbClient};
use crate::error::DbError;
use crate::repositories::booking::{Booking, BookingRepository, NewBooking, UserId};
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, error, info};

const SELECT_COLUMNS: &str = "SELECT id, user_id, name, contact, appointment_at, event_id FROM bookings";

/// SQL implementation of the booking repository
#[derive(Debug, Clone)]
pub struct SqlBookingRepository {
    db_client: DbClient,
}

impl SqlBookingRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    async fn fetch_list<'q>(
        &self,
        query: sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>,
    ) -> Result<Vec<Booking>, DbError> {
        let rows = query.fetch_all(self.db_client.pool()).await.map_err(|e| {
            error!("Failed to list bookings: {}", e);
            DbError::QueryError(e.to_string())
        })?;
        rows.iter().map(booking_from_row).collect()
    }
}

fn booking_from_row(row: &AnyRow) -> Result<Booking, DbError> {
    let appointment_secs: i64 = row.try_get("appointment_at")?;
    let appointment_at = DateTime::<Utc>::from_timestamp(appointment_secs, 0).ok_or_else(|| {
        DbError::QueryError(format!("invalid appointment timestamp {appointment_secs}"))
    })?;
    let user_id: Option<i64> = row.try_get("user_id")?;

    Ok(Booking {
        id: row.try_get("id")?,
        user_id: user_id.map(UserId),
        name: row.try_get("name")?,
        contact: row.try_get("contact")?,
        appointment_at,
        event_id: row.try_get("event_id")?,
    })
}

fn create_table_sql(backend: DbBackend) -> String {
    let id_column = match backend {
        DbBackend::Sqlite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
        DbBackend::Postgres => "id BIGSERIAL PRIMARY KEY",
    };
    format!(
        "CREATE TABLE IF NOT EXISTS bookings (
            {id_column},
            user_id BIGINT,
            name TEXT NOT NULL,
            contact TEXT NOT NULL,
            appointment_at BIGINT NOT NULL,
            event_id TEXT,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )"
    )
}

impl BookingRepository for SqlBookingRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing booking schema");

        self.db_client
            .execute(&create_table_sql(self.db_client.backend()))
            .await?;
        self.db_client
            .execute("CREATE INDEX IF NOT EXISTS idx_bookings_user_id ON bookings (user_id)")
            .await?;
        self.db_client
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_bookings_appointment_at ON bookings (appointment_at)",
            )
            .await?;

        info!("Booking schema initialized successfully");
        Ok(())
    }

    async fn create(&self, booking: NewBooking) -> Result<Booking, DbError> {
        debug!(user_id = ?booking.user_id, at = %booking.appointment_at, "inserting booking");

        let query = r#"
            INSERT INTO bookings (user_id, name, contact, appointment_at, event_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
        "#;

        let row = sqlx::query(query)
            .bind(booking.user_id.map(|u| u.0))
            .bind(&booking.name)
            .bind(&booking.contact)
            .bind(booking.appointment_at.timestamp())
            .bind(booking.event_id.clone())
            .fetch_one(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to insert booking: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        let id: i64 = row.try_get("id")?;
        info!(booking_id = id, "Booking created");
        Ok(booking.into_booking(id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Booking, DbError> {
        let query = format!("{SELECT_COLUMNS} WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to load booking {}: {}", id, e);
                DbError::QueryError(e.to_string())
            })?;

        match row {
            Some(row) => booking_from_row(&row),
            None => Err(DbError::NotFound(id)),
        }
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to delete booking {}: {}", id, e);
                DbError::QueryError(e.to_string())
            })?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(id));
        }
        info!(booking_id = id, "Booking deleted");
        Ok(())
    }

    async fn list_by_owner(&self, user_id: UserId) -> Result<Vec<Booking>, DbError> {
        let query = format!("{SELECT_COLUMNS} WHERE user_id = $1 ORDER BY appointment_at, id");
        self.fetch_list(sqlx::query(&query).bind(user_id.0)).await
    }

    async fn list_all(&self) -> Result<Vec<Booking>, DbError> {
        let query = format!("{SELECT_COLUMNS} ORDER BY appointment_at, id");
        self.fetch_list(sqlx::query(&query)).await
    }

    async fn list_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>, DbError> {
        let query = format!(
            "{SELECT_COLUMNS} WHERE user_id IS NOT NULL AND appointment_at >= $1 AND appointment_at < $2 \
             ORDER BY appointment_at, id"
        );
        self.fetch_list(sqlx::query(&query).bind(from.timestamp()).bind(to.timestamp()))
            .await
    }
}
