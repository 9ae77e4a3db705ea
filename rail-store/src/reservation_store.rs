use async_trait::async_trait;
use rail_core::repository::{ReservationStore, ReservationTx};
use rail_core::{Booking, NewBooking, StoreError, StoreResult, Trip, TripId, UserId};
use sqlx::{PgPool, Postgres, Transaction};

use crate::booking_repo::{BookingRow, BOOKING_COLUMNS};
use crate::database::db_err;
use crate::trip_repo::{fetch_trip, TripRow, TRIP_COLUMNS};

/// Reservation storage on PostgreSQL. Each unit of work is one database transaction.
pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn get_trip(&self, id: TripId) -> StoreResult<Option<Trip>> {
        fetch_trip(&self.pool, id).await
    }

    async fn begin(&self) -> StoreResult<Box<dyn ReservationTx>> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(PgReservationTx { tx: Some(tx) }))
    }
}

/// Rolls back on drop unless committed (sqlx `Transaction` semantics).
struct PgReservationTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgReservationTx {
    fn conn(&mut self) -> StoreResult<&mut Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| StoreError::Backend("transaction already finished".to_string()))
    }
}

#[async_trait]
impl ReservationTx for PgReservationTx {
    async fn lock_trip(&mut self, id: TripId) -> StoreResult<Option<Trip>> {
        // The row lock serializes reservations across processes sharing the database.
        let sql = format!("SELECT {} FROM trips WHERE id = $1 FOR UPDATE", TRIP_COLUMNS);
        let tx = self.conn()?;
        let row = sqlx::query_as::<_, TripRow>(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_err)?;
        Ok(row.map(Trip::from))
    }

    async fn save_trip(&mut self, trip: &Trip) -> StoreResult<()> {
        let tx = self.conn()?;
        let result = sqlx::query("UPDATE trips SET free_seats = $1 WHERE id = $2")
            .bind(trip.free_seats)
            .bind(trip.id)
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Trip {}", trip.id)));
        }
        Ok(())
    }

    async fn get_booking(&mut self, user_id: UserId, trip_id: TripId) -> StoreResult<Option<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE user_id = $1 AND trip_id = $2 FOR UPDATE",
            BOOKING_COLUMNS
        );
        let tx = self.conn()?;
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(user_id)
            .bind(trip_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_err)?;
        Ok(row.map(Booking::from))
    }

    async fn insert_booking(&mut self, booking: &NewBooking) -> StoreResult<Booking> {
        let sql = format!(
            r#"
            INSERT INTO bookings (user_id, trip_id, booking_timestamp, seat_count)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );
        let tx = self.conn()?;
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(booking.user_id)
            .bind(booking.trip_id)
            .bind(booking.booking_timestamp)
            .bind(booking.seat_count)
            .fetch_one(&mut **tx)
            .await
            .map_err(db_err)?;
        Ok(row.into())
    }

    async fn update_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        let tx = self.conn()?;
        let result = sqlx::query("UPDATE bookings SET seat_count = $1 WHERE id = $2")
            .bind(booking.seat_count)
            .bind(booking.id)
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Booking {}", booking.id)));
        }
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StoreError::Backend("transaction already finished".to_string()))?;
        tx.commit().await.map_err(db_err)
    }
}
