use chrono::Utc;
use rail_core::repository::ReservationStore;
use rail_core::{Booking, NewBooking, StoreError, TripId, UserId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::locks::TripLocks;

/// Where an insufficient-seats rejection was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStage {
    /// Advisory read before taking the trip lock.
    PreCheck,
    /// Authoritative read while holding the trip lock.
    Locked,
}

#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("Trip not found: {0}")]
    NotFound(TripId),

    #[error("Invalid seat count: {0}")]
    InvalidArgument(String),

    #[error("Not enough seats available: requested {requested}, available {available}")]
    InsufficientSeats {
        requested: i32,
        available: i32,
        stage: CheckStage,
    },

    /// The trip lock was not granted in time. Nothing was written.
    #[error("Trip {0} is busy")]
    Busy(TripId),

    #[error("Reservation failed: {0}")]
    Internal(String),
}

impl From<StoreError> for ReservationError {
    fn from(err: StoreError) -> Self {
        ReservationError::Internal(err.to_string())
    }
}

/// Outcome of a committed reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingResult {
    pub booking: Booking,
    pub remaining_free_seats: i32,
}

/// Serializes seat reservations per trip and commits the seat decrement together with the
/// booking upsert.
pub struct ReservationEngine {
    store: Arc<dyn ReservationStore>,
    locks: Arc<TripLocks>,
    lock_timeout: Option<Duration>,
}

impl ReservationEngine {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self::with_locks(store, Arc::new(TripLocks::new()))
    }

    /// Shares a lock registry, e.g. between engines over the same store.
    pub fn with_locks(store: Arc<dyn ReservationStore>, locks: Arc<TripLocks>) -> Self {
        Self {
            store,
            locks,
            lock_timeout: None,
        }
    }

    /// Gives up with [`ReservationError::Busy`] when the trip lock is not granted within
    /// `limit`. Once the lock is held the reservation always runs to completion.
    pub fn with_lock_timeout(mut self, limit: Duration) -> Self {
        self.lock_timeout = Some(limit);
        self
    }

    pub fn locks(&self) -> &Arc<TripLocks> {
        &self.locks
    }

    /// Reserves `seat_count` seats on `trip_id` for `user_id`.
    ///
    /// A repeated reservation by the same user on the same trip adds to the existing booking.
    /// Cancelling the returned future while it waits for the trip lock leaves no mutation
    /// behind.
    #[instrument(skip(self))]
    pub async fn reserve_seats(
        &self,
        trip_id: TripId,
        user_id: UserId,
        seat_count: i64,
    ) -> Result<BookingResult, ReservationError> {
        let requested = validate_seat_count(seat_count)?;

        // Fail fast on obvious overbooking; this read races and proves nothing.
        let trip = self
            .store
            .get_trip(trip_id)
            .await
            .map_err(internal("read trip"))?
            .ok_or(ReservationError::NotFound(trip_id))?;

        if !trip.can_seat(requested) {
            return Err(rejected(requested, trip.free_seats, CheckStage::PreCheck));
        }

        let _guard = match self.lock_timeout {
            Some(limit) => tokio::time::timeout(limit, self.locks.acquire(trip_id))
                .await
                .map_err(|_| {
                    debug!(wait_ms = limit.as_millis() as u64, "Trip lock not granted in time");
                    ReservationError::Busy(trip_id)
                })?,
            None => self.locks.acquire(trip_id).await,
        };

        let mut tx = self.store.begin().await.map_err(internal("begin"))?;

        let mut trip = tx
            .lock_trip(trip_id)
            .await
            .map_err(internal("lock trip"))?
            .ok_or(ReservationError::NotFound(trip_id))?;

        if !trip.can_seat(requested) {
            return Err(rejected(requested, trip.free_seats, CheckStage::Locked));
        }

        trip.free_seats -= requested;
        tx.save_trip(&trip).await.map_err(internal("save trip"))?;

        let booking = match tx
            .get_booking(user_id, trip_id)
            .await
            .map_err(internal("read booking"))?
        {
            Some(mut existing) => {
                existing.seat_count = existing
                    .seat_count
                    .checked_add(requested)
                    .ok_or_else(|| ReservationError::Internal("seat count overflow".to_string()))?;
                tx.update_booking(&existing).await.map_err(internal("update booking"))?;
                existing
            }
            None => {
                let draft = NewBooking {
                    user_id,
                    trip_id,
                    booking_timestamp: Utc::now(),
                    seat_count: requested,
                };
                tx.insert_booking(&draft).await.map_err(internal("insert booking"))?
            }
        };

        tx.commit().await.map_err(internal("commit"))?;

        info!(
            booking_id = booking.id,
            seat_count = booking.seat_count,
            remaining = trip.free_seats,
            "Reserved {} seat(s)",
            requested
        );

        Ok(BookingResult {
            booking,
            remaining_free_seats: trip.free_seats,
        })
    }
}

fn validate_seat_count(seat_count: i64) -> Result<i32, ReservationError> {
    if seat_count < 1 {
        return Err(ReservationError::InvalidArgument(format!(
            "seat_count must be at least 1, got {}",
            seat_count
        )));
    }
    i32::try_from(seat_count)
        .map_err(|_| ReservationError::InvalidArgument(format!("seat_count {} is too large", seat_count)))
}

fn rejected(requested: i32, available: i32, stage: CheckStage) -> ReservationError {
    debug!(requested, available, ?stage, "Not enough seats available");
    ReservationError::InsufficientSeats {
        requested,
        available,
        stage,
    }
}

// The caller reports the failure; only the failing step is recorded here.
fn internal(step: &'static str) -> impl Fn(StoreError) -> ReservationError {
    move |err| {
        debug!(step, error = %err, "Reservation aborted");
        ReservationError::from(err)
    }
}
