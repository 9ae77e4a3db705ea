use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use rail_core::{Booking, BookingId, Identity, TripId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::AppError,
    extract::AppJson,
    state::AppState,
};

#[derive(Debug, Deserialize)]
struct BookSeatRequest {
    trip_id: TripId,
    seat_count: i64,
}

#[derive(Debug, Serialize)]
struct BookSeatResponse {
    message: &'static str,
    booking_id: BookingId,
    trip_id: TripId,
    seat_count: i32,
    remaining_free_seats: i32,
}

#[derive(Debug, Serialize)]
struct BookingView {
    id: BookingId,
    user: String,
    trip: TripId,
    booking_timestamp: DateTime<Utc>,
    seat_count: i32,
}

impl BookingView {
    fn new(booking: Booking, username: &str) -> Self {
        Self {
            id: booking.id,
            user: username.to_string(),
            trip: booking.trip_id,
            booking_timestamp: booking.booking_timestamp,
            seat_count: booking.seat_count,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/book-seat", post(book_seat))
        .route("/my-bookings", get(my_bookings))
        .route("/my-bookings/{trip_id}", get(my_booking_for_trip))
}

async fn book_seat(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    AppJson(req): AppJson<BookSeatRequest>,
) -> Result<(StatusCode, Json<BookSeatResponse>), AppError> {
    // The engine bounds only the wait for the trip lock; a granted reservation completes.
    let result = state
        .engine
        .reserve_seats(req.trip_id, identity.user_id, req.seat_count)
        .await?;

    info!(
        user = %identity.username,
        trip_id = req.trip_id,
        booking_id = result.booking.id,
        "Seats booked"
    );

    Ok((
        StatusCode::CREATED,
        Json(BookSeatResponse {
            message: "Seats booked successfully!",
            booking_id: result.booking.id,
            trip_id: result.booking.trip_id,
            seat_count: result.booking.seat_count,
            remaining_free_seats: result.remaining_free_seats,
        }),
    ))
}

async fn my_bookings(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<BookingView>>, AppError> {
    let bookings = state.bookings.list_bookings(identity.user_id, None).await?;
    Ok(Json(
        bookings
            .into_iter()
            .map(|b| BookingView::new(b, &identity.username))
            .collect(),
    ))
}

async fn my_booking_for_trip(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(trip_id): Path<TripId>,
) -> Result<Json<Vec<BookingView>>, AppError> {
    let bookings = state
        .bookings
        .list_bookings(identity.user_id, Some(trip_id))
        .await?;
    if bookings.is_empty() {
        return Err(AppError::NotFoundError(
            "No booking found for this trip and user.".to_string(),
        ));
    }

    Ok(Json(
        bookings
            .into_iter()
            .map(|b| BookingView::new(b, &identity.username))
            .collect(),
    ))
}
