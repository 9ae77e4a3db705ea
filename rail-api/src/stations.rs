use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use rail_core::{Identity, Station};

use crate::{error::AppError, extract::AppJson, state::AppState};

const MAX_NAME_LEN: usize = 100;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stations", get(list_stations).post(create_station))
        .route(
            "/stations/{name}",
            get(get_station).put(rename_station).delete(delete_station),
        )
}

fn validate(station: &Station) -> Result<(), AppError> {
    let len = station.name.trim().chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(AppError::ValidationError(format!(
            "Station name must be 1 to {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

async fn list_stations(State(state): State<AppState>) -> Result<Json<Vec<Station>>, AppError> {
    Ok(Json(state.stations.list_stations().await?))
}

async fn get_station(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Station>, AppError> {
    state
        .stations
        .get_station(&name)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFoundError(format!("Station {} not found.", name)))
}

async fn create_station(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    AppJson(station): AppJson<Station>,
) -> Result<(StatusCode, Json<Station>), AppError> {
    identity.require_admin()?;
    validate(&station)?;

    let created = state.stations.create_station(&station).await?;
    tracing::info!(station = %created.name, "Created station");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn rename_station(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(name): Path<String>,
    AppJson(station): AppJson<Station>,
) -> Result<Json<Station>, AppError> {
    identity.require_admin()?;
    validate(&station)?;

    Ok(Json(state.stations.rename_station(&name, &station).await?))
}

async fn delete_station(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    identity.require_admin()?;

    state.stations.delete_station(&name).await?;
    tracing::info!(station = %name, "Deleted station");
    Ok(StatusCode::NO_CONTENT)
}
