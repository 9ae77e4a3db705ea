use async_trait::async_trait;
use rail_core::repository::StationRepository;
use rail_core::{Station, StoreError, StoreResult};
use sqlx::PgPool;

use crate::database::db_err;

pub struct PgStationRepository {
    pool: PgPool,
}

impl PgStationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct StationRow {
    name: String,
}

impl From<StationRow> for Station {
    fn from(row: StationRow) -> Self {
        Station { name: row.name }
    }
}

#[async_trait]
impl StationRepository for PgStationRepository {
    async fn list_stations(&self) -> StoreResult<Vec<Station>> {
        let rows = sqlx::query_as::<_, StationRow>("SELECT name FROM stations ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Station::from).collect())
    }

    async fn get_station(&self, name: &str) -> StoreResult<Option<Station>> {
        let row = sqlx::query_as::<_, StationRow>("SELECT name FROM stations WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Station::from))
    }

    async fn create_station(&self, station: &Station) -> StoreResult<Station> {
        let row = sqlx::query_as::<_, StationRow>("INSERT INTO stations (name) VALUES ($1) RETURNING name")
            .bind(&station.name)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.into())
    }

    async fn rename_station(&self, name: &str, station: &Station) -> StoreResult<Station> {
        // trains.source / trains.destination follow via ON UPDATE CASCADE
        let row = sqlx::query_as::<_, StationRow>("UPDATE stations SET name = $1 WHERE name = $2 RETURNING name")
            .bind(&station.name)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(Station::from)
            .ok_or_else(|| StoreError::NotFound(format!("Station {}", name)))
    }

    async fn delete_station(&self, name: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM stations WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Station {}", name)));
        }
        Ok(())
    }
}
