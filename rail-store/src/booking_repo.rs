use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rail_core::repository::BookingRepository;
use rail_core::{Booking, StoreResult, TripId, UserId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::db_err;

pub(crate) const BOOKING_COLUMNS: &str = "id, user_id, trip_id, booking_timestamp, seat_count";

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct BookingRow {
    id: i64,
    user_id: Uuid,
    trip_id: i64,
    booking_timestamp: DateTime<Utc>,
    seat_count: i32,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: row.id,
            user_id: row.user_id,
            trip_id: row.trip_id,
            booking_timestamp: row.booking_timestamp,
            seat_count: row.seat_count,
        }
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn list_bookings(&self, user_id: UserId, trip_id: Option<TripId>) -> StoreResult<Vec<Booking>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE user_id = $1 AND ($2::BIGINT IS NULL OR trip_id = $2)
            ORDER BY booking_timestamp DESC, id DESC
            "#,
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(user_id)
            .bind(trip_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Booking::from).collect())
    }
}
