//! Station catalogue, current prices and promotions.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use rutas_core::{Coordinate, FuelType, Promotion, Station, Weekday};
use sqlx::SqlitePool;

/// Insert or update a station and replace its prices and promotions.
pub async fn upsert(pool: &SqlitePool, station: &Station) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO stations (id, code, brand, address, commune, region, lat, lon, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, CURRENT_TIMESTAMP)
        ON CONFLICT(id) DO UPDATE SET
            code = ?2, brand = ?3, address = ?4, commune = ?5, region = ?6,
            lat = ?7, lon = ?8,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(station.id)
    .bind(&station.code)
    .bind(&station.brand)
    .bind(&station.address)
    .bind(&station.commune)
    .bind(&station.region)
    .bind(station.location.lat)
    .bind(station.location.lon)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM station_prices WHERE station_id = ?1")
        .bind(station.id)
        .execute(&mut *tx)
        .await?;
    for (fuel_type, price) in &station.prices {
        sqlx::query("INSERT INTO station_prices (station_id, fuel_type, price) VALUES (?1, ?2, ?3)")
            .bind(station.id)
            .bind(fuel_type.code())
            .bind(price)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("DELETE FROM station_promotions WHERE station_id = ?1")
        .bind(station.id)
        .execute(&mut *tx)
        .await?;
    for (position, promotion) in station.promotions.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO station_promotions
                (station_id, position, title, description, discount_per_liter, days)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(station.id)
        .bind(position as i64)
        .bind(&promotion.title)
        .bind(&promotion.description)
        .bind(promotion.discount_per_liter)
        .bind(serde_json::to_string(&promotion.days)?)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Load every station with its prices and promotions. Price rows with an
/// unknown fuel code are skipped.
pub async fn load_all(pool: &SqlitePool) -> Result<Vec<Station>> {
    let rows = sqlx::query_as::<_, StationRow>(
        "SELECT id, code, brand, address, commune, region, lat, lon FROM stations ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    let price_rows = sqlx::query_as::<_, PriceRow>(
        "SELECT station_id, fuel_type, price FROM station_prices",
    )
    .fetch_all(pool)
    .await?;
    let promotion_rows = sqlx::query_as::<_, PromotionRow>(
        r#"
        SELECT station_id, title, description, discount_per_liter, days
        FROM station_promotions
        ORDER BY station_id, position
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut prices: HashMap<i64, BTreeMap<FuelType, f64>> = HashMap::new();
    for row in price_rows {
        match row.fuel_type.parse::<FuelType>() {
            Ok(fuel_type) => {
                prices
                    .entry(row.station_id)
                    .or_default()
                    .insert(fuel_type, row.price);
            }
            Err(err) => tracing::debug!(station_id = row.station_id, "skipping price: {}", err),
        }
    }

    let mut promotions: HashMap<i64, Vec<Promotion>> = HashMap::new();
    for row in promotion_rows {
        let station_id = row.station_id;
        promotions
            .entry(station_id)
            .or_default()
            .push(row.into_promotion().with_context(|| format!("station {station_id}"))?);
    }

    Ok(rows
        .into_iter()
        .map(|row| Station {
            prices: prices.remove(&row.id).unwrap_or_default(),
            promotions: promotions.remove(&row.id).unwrap_or_default(),
            id: row.id,
            code: row.code,
            brand: row.brand,
            address: row.address,
            commune: row.commune,
            region: row.region,
            location: Coordinate::new(row.lat, row.lon),
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct StationRow {
    id: i64,
    code: String,
    brand: String,
    address: String,
    commune: String,
    region: String,
    lat: f64,
    lon: f64,
}

#[derive(sqlx::FromRow)]
struct PriceRow {
    station_id: i64,
    fuel_type: String,
    price: f64,
}

#[derive(sqlx::FromRow)]
struct PromotionRow {
    station_id: i64,
    title: String,
    description: String,
    discount_per_liter: Option<f64>,
    days: String,
}

impl PromotionRow {
    fn into_promotion(self) -> Result<Promotion> {
        let days: Vec<Weekday> = serde_json::from_str(&self.days)
            .with_context(|| format!("invalid promotion days {:?}", self.days))?;
        Ok(Promotion {
            title: self.title,
            description: self.description,
            discount_per_liter: self.discount_per_liter,
            days,
        })
    }
}
