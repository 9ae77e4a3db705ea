use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use rail_core::search::TripFilter;

use crate::{error::AppError, extract::AppQuery, state::AppState, trips::TripResponse};

pub fn routes() -> Router<AppState> {
    Router::new().route("/availability", get(search_availability))
}

/// Trips by route and departure date, earliest first.
async fn search_availability(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<TripFilter>,
) -> Result<Json<Vec<TripResponse>>, AppError> {
    if let (Some(from), Some(to)) = (filter.date_from, filter.date_to) {
        if from > to {
            return Err(AppError::ValidationError(
                "date_from must not be after date_to".to_string(),
            ));
        }
    }

    let trips = state.trips.list_trips(&filter).await?;
    tracing::debug!(found = trips.len(), "Availability search");
    Ok(Json(trips.into_iter().map(TripResponse::from).collect()))
}
