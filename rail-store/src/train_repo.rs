use async_trait::async_trait;
use rail_core::repository::TrainRepository;
use rail_core::search::TrainFilter;
use rail_core::{StoreError, StoreResult, Train, TrainUpdate};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::database::db_err;

pub struct PgTrainRepository {
    pool: PgPool,
}

impl PgTrainRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TrainRow {
    train_no: String,
    name: String,
    source: String,
    destination: String,
}

impl From<TrainRow> for Train {
    fn from(row: TrainRow) -> Self {
        Train {
            no: row.train_no,
            name: row.name,
            source: row.source,
            destination: row.destination,
        }
    }
}

#[async_trait]
impl TrainRepository for PgTrainRepository {
    async fn list_trains(&self, filter: &TrainFilter) -> StoreResult<Vec<Train>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT train_no, name, source, destination FROM trains WHERE TRUE");

        if let Some(source) = &filter.source {
            query.push(" AND source = ").push_bind(source);
        }
        if let Some(destination) = &filter.destination {
            query.push(" AND destination = ").push_bind(destination);
        }
        if let Some(term) = &filter.search {
            let pattern = format!("%{}%", escape_like(term));
            query
                .push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR train_no ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        query.push(" ORDER BY ").push(filter.ordering.sql());

        let rows = query
            .build_query_as::<TrainRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Train::from).collect())
    }

    async fn get_train(&self, no: &str) -> StoreResult<Option<Train>> {
        let row = sqlx::query_as::<_, TrainRow>(
            "SELECT train_no, name, source, destination FROM trains WHERE train_no = $1",
        )
        .bind(no)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(Train::from))
    }

    async fn create_train(&self, train: &Train) -> StoreResult<Train> {
        let row = sqlx::query_as::<_, TrainRow>(
            r#"
            INSERT INTO trains (train_no, name, source, destination)
            VALUES ($1, $2, $3, $4)
            RETURNING train_no, name, source, destination
            "#,
        )
        .bind(&train.no)
        .bind(&train.name)
        .bind(&train.source)
        .bind(&train.destination)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.into())
    }

    async fn update_train(&self, no: &str, update: &TrainUpdate) -> StoreResult<Train> {
        let row = sqlx::query_as::<_, TrainRow>(
            r#"
            UPDATE trains SET name = $1, source = $2, destination = $3
            WHERE train_no = $4
            RETURNING train_no, name, source, destination
            "#,
        )
        .bind(&update.name)
        .bind(&update.source)
        .bind(&update.destination)
        .bind(no)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(Train::from)
            .ok_or_else(|| StoreError::NotFound(format!("Train {}", no)))
    }

    async fn delete_train(&self, no: &str) -> StoreResult<()> {
        // Trips cascade; bookings on those trips block the delete.
        let result = sqlx::query("DELETE FROM trains WHERE train_no = $1")
            .bind(no)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Train {}", no)));
        }
        Ok(())
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
