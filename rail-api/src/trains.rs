use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use rail_core::search::TrainFilter;
use rail_core::{Identity, Train, TrainUpdate};

use crate::{
    error::AppError,
    extract::{AppJson, AppQuery},
    state::AppState,
};

const MAX_NO_LEN: usize = 20;
const MAX_NAME_LEN: usize = 255;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/trains", get(list_trains).post(create_train))
        .route("/trains/{no}", get(get_train).put(update_train).delete(delete_train))
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    let len = value.trim().chars().count();
    if len == 0 || len > max {
        return Err(AppError::ValidationError(format!(
            "{} must be 1 to {} characters",
            field, max
        )));
    }
    Ok(())
}

async fn list_trains(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<TrainFilter>,
) -> Result<Json<Vec<Train>>, AppError> {
    Ok(Json(state.trains.list_trains(&filter).await?))
}

async fn get_train(
    State(state): State<AppState>,
    Path(no): Path<String>,
) -> Result<Json<Train>, AppError> {
    state
        .trains
        .get_train(&no)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFoundError(format!("Train {} not found.", no)))
}

async fn create_train(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    AppJson(train): AppJson<Train>,
) -> Result<(StatusCode, Json<Train>), AppError> {
    identity.require_admin()?;
    check_len("Train number", &train.no, MAX_NO_LEN)?;
    check_len("Train name", &train.name, MAX_NAME_LEN)?;

    let created = state.trains.create_train(&train).await?;
    tracing::info!(train = %created.no, "Created train");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_train(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(no): Path<String>,
    AppJson(update): AppJson<TrainUpdate>,
) -> Result<Json<Train>, AppError> {
    identity.require_admin()?;
    check_len("Train name", &update.name, MAX_NAME_LEN)?;

    Ok(Json(state.trains.update_train(&no, &update).await?))
}

async fn delete_train(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(no): Path<String>,
) -> Result<StatusCode, AppError> {
    identity.require_admin()?;

    state.trains.delete_train(&no).await?;
    tracing::info!(train = %no, "Deleted train");
    Ok(StatusCode::NO_CONTENT)
}
