use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use rail_core::search::TripFilter;
use rail_core::{Identity, NewTrip, Trip, TripId, TripUpdate};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, extract::AppJson, state::AppState};

/// Trip as returned to clients.
#[derive(Debug, Serialize)]
pub struct TripResponse {
    pub id: TripId,
    pub train: String,
    pub starting_time_date: DateTime<Utc>,
    pub ending_time_date: DateTime<Utc>,
    pub total_seats: i32,
    pub free_seats: i32,
    pub available_seats: i32,
}

impl From<Trip> for TripResponse {
    fn from(trip: Trip) -> Self {
        Self {
            id: trip.id,
            train: trip.train_no,
            starting_time_date: trip.starting_time_date,
            ending_time_date: trip.ending_time_date,
            total_seats: trip.total_seats,
            available_seats: trip.free_seats,
            free_seats: trip.free_seats,
        }
    }
}

/// Create payload. Any `free_seats` sent by the client is ignored.
#[derive(Debug, Deserialize)]
struct CreateTripRequest {
    train: String,
    starting_time_date: DateTime<Utc>,
    ending_time_date: DateTime<Utc>,
    total_seats: i32,
}

#[derive(Debug, Deserialize)]
struct UpdateTripRequest {
    train: String,
    starting_time_date: DateTime<Utc>,
    ending_time_date: DateTime<Utc>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/trips", get(list_trips).post(create_trip))
        .route("/trips/{id}", get(get_trip).put(update_trip).delete(delete_trip))
}

async fn list_trips(State(state): State<AppState>) -> Result<Json<Vec<TripResponse>>, AppError> {
    let trips = state.trips.list_trips(&TripFilter::default()).await?;
    Ok(Json(trips.into_iter().map(TripResponse::from).collect()))
}

async fn get_trip(
    State(state): State<AppState>,
    Path(id): Path<TripId>,
) -> Result<Json<TripResponse>, AppError> {
    state
        .trips
        .get_trip(id)
        .await?
        .map(|trip| Json(trip.into()))
        .ok_or_else(|| AppError::NotFoundError(format!("Trip {} not found.", id)))
}

async fn create_trip(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    AppJson(req): AppJson<CreateTripRequest>,
) -> Result<(StatusCode, Json<TripResponse>), AppError> {
    identity.require_admin()?;

    let new_trip = NewTrip {
        train_no: req.train,
        starting_time_date: req.starting_time_date,
        ending_time_date: req.ending_time_date,
        total_seats: req.total_seats,
    };
    new_trip.validate().map_err(AppError::ValidationError)?;

    let trip = state.trips.create_trip(&new_trip).await?;
    tracing::info!(trip_id = trip.id, train = %trip.train_no, seats = trip.total_seats, "Created trip");
    Ok((StatusCode::CREATED, Json(trip.into())))
}

async fn update_trip(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<TripId>,
    AppJson(req): AppJson<UpdateTripRequest>,
) -> Result<Json<TripResponse>, AppError> {
    identity.require_admin()?;

    let update = TripUpdate {
        train_no: req.train,
        starting_time_date: req.starting_time_date,
        ending_time_date: req.ending_time_date,
    };
    update.validate().map_err(AppError::ValidationError)?;

    Ok(Json(state.trips.update_trip(id, &update).await?.into()))
}

async fn delete_trip(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<TripId>,
) -> Result<StatusCode, AppError> {
    identity.require_admin()?;

    state.trips.delete_trip(id).await?;
    tracing::info!(trip_id = id, "Deleted trip");
    Ok(StatusCode::NO_CONTENT)
}
