//! Edge list rows.

use anyhow::{Context, Result};
use rutas_core::{Coordinate, EdgeRecord};
use sqlx::SqlitePool;

/// Load every stored edge, ordered by id.
pub async fn load_all(pool: &SqlitePool) -> Result<Vec<EdgeRecord>> {
    let rows = sqlx::query_as::<_, RoadEdgeRow>(
        "SELECT id, source, target, directed, speed_kph, cost, reverse_cost, geometry FROM road_edges ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(|r| r.try_into()).collect()
}

/// Insert or replace a batch of edges in one transaction. Returns the number
/// of rows written.
pub async fn insert_many(pool: &SqlitePool, records: &[EdgeRecord]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut written = 0;
    for record in records {
        let geometry: Vec<[f64; 2]> = record.geometry.iter().map(|c| [c.lon, c.lat]).collect();
        let geometry_json = serde_json::to_string(&geometry)?;
        let result = sqlx::query(
            r#"
            INSERT INTO road_edges (id, source, target, directed, speed_kph, cost, reverse_cost, geometry, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET
                source = ?2, target = ?3, directed = ?4, speed_kph = ?5,
                cost = ?6, reverse_cost = ?7, geometry = ?8,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(record.id)
        .bind(record.source)
        .bind(record.target)
        .bind(record.directed)
        .bind(record.speed_kph)
        .bind(record.cost)
        .bind(record.reverse_cost)
        .bind(&geometry_json)
        .execute(&mut *tx)
        .await?;
        written += result.rows_affected();
    }
    tx.commit().await?;
    Ok(written)
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM road_edges")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[derive(sqlx::FromRow)]
struct RoadEdgeRow {
    id: i64,
    source: i64,
    target: i64,
    directed: bool,
    speed_kph: Option<f64>,
    cost: Option<f64>,
    reverse_cost: Option<f64>,
    geometry: String,
}

impl TryFrom<RoadEdgeRow> for EdgeRecord {
    type Error = anyhow::Error;

    fn try_from(row: RoadEdgeRow) -> Result<Self> {
        let positions: Vec<[f64; 2]> = serde_json::from_str(&row.geometry)
            .with_context(|| format!("edge {} has malformed geometry", row.id))?;
        Ok(EdgeRecord {
            id: row.id,
            source: row.source,
            target: row.target,
            directed: row.directed,
            speed_kph: row.speed_kph,
            cost: row.cost,
            reverse_cost: row.reverse_cost,
            geometry: positions
                .into_iter()
                .map(|[lon, lat]| Coordinate::new(lat, lon))
                .collect(),
        })
    }
}
