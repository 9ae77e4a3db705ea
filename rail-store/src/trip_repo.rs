use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rail_core::repository::TripRepository;
use rail_core::search::TripFilter;
use rail_core::{NewTrip, StoreError, StoreResult, Trip, TripId, TripUpdate};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::database::db_err;

pub(crate) const TRIP_COLUMNS: &str =
    "id, train_no, starting_time_date, ending_time_date, total_seats, free_seats";

pub struct PgTripRepository {
    pool: PgPool,
}

impl PgTripRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TripRow {
    id: i64,
    train_no: String,
    starting_time_date: DateTime<Utc>,
    ending_time_date: DateTime<Utc>,
    total_seats: i32,
    free_seats: i32,
}

impl From<TripRow> for Trip {
    fn from(row: TripRow) -> Self {
        Trip {
            id: row.id,
            train_no: row.train_no,
            starting_time_date: row.starting_time_date,
            ending_time_date: row.ending_time_date,
            total_seats: row.total_seats,
            free_seats: row.free_seats,
        }
    }
}

#[async_trait]
impl TripRepository for PgTripRepository {
    async fn list_trips(&self, filter: &TripFilter) -> StoreResult<Vec<Trip>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT t.id, t.train_no, t.starting_time_date, t.ending_time_date, t.total_seats, t.free_seats
            FROM trips t
            JOIN trains tr ON tr.train_no = t.train_no
            WHERE TRUE
            "#,
        );

        if let Some(source) = &filter.source {
            query.push(" AND tr.source = ").push_bind(source);
        }
        if let Some(destination) = &filter.destination {
            query.push(" AND tr.destination = ").push_bind(destination);
        }
        // Calendar dates are taken in UTC, matching TripFilter::matches.
        let departure = " AND (t.starting_time_date AT TIME ZONE 'UTC')::date ";
        if let Some(date) = filter.date {
            query.push(departure).push("= ").push_bind(date);
        }
        if let Some(from) = filter.date_from {
            query.push(departure).push(">= ").push_bind(from);
        }
        if let Some(to) = filter.date_to {
            query.push(departure).push("<= ").push_bind(to);
        }
        query.push(" ORDER BY t.starting_time_date ASC, t.id ASC");

        let rows = query
            .build_query_as::<TripRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Trip::from).collect())
    }

    async fn get_trip(&self, id: TripId) -> StoreResult<Option<Trip>> {
        fetch_trip(&self.pool, id).await
    }

    async fn create_trip(&self, trip: &NewTrip) -> StoreResult<Trip> {
        let sql = format!(
            r#"
            INSERT INTO trips (train_no, starting_time_date, ending_time_date, total_seats, free_seats)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING {}
            "#,
            TRIP_COLUMNS
        );
        let row = sqlx::query_as::<_, TripRow>(&sql)
            .bind(&trip.train_no)
            .bind(trip.starting_time_date)
            .bind(trip.ending_time_date)
            .bind(trip.total_seats)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.into())
    }

    async fn update_trip(&self, id: TripId, update: &TripUpdate) -> StoreResult<Trip> {
        let sql = format!(
            r#"
            UPDATE trips SET train_no = $1, starting_time_date = $2, ending_time_date = $3
            WHERE id = $4
            RETURNING {}
            "#,
            TRIP_COLUMNS
        );
        let row = sqlx::query_as::<_, TripRow>(&sql)
            .bind(&update.train_no)
            .bind(update.starting_time_date)
            .bind(update.ending_time_date)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(Trip::from)
            .ok_or_else(|| StoreError::NotFound(format!("Trip {}", id)))
    }

    async fn delete_trip(&self, id: TripId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM trips WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Trip {}", id)));
        }
        Ok(())
    }
}

pub(crate) async fn fetch_trip(pool: &PgPool, id: TripId) -> StoreResult<Option<Trip>> {
    let sql = format!("SELECT {} FROM trips WHERE id = $1", TRIP_COLUMNS);
    let row = sqlx::query_as::<_, TripRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_err)?;
    Ok(row.map(Trip::from))
}
