//! Core data models for the routing engine.

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::geo::polyline_length_m;

pub type VertexId = i64;
pub type EdgeId = i64;

/// Costs at or above this value are the importer's one-way marker and are
/// treated as impassable.
pub const IMPASSABLE_COST_SENTINEL: f64 = 1e9;

/// WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// GeoJSON position order: `[lon, lat]`.
    pub fn to_position(self) -> Vec<f64> {
        vec![self.lon, self.lat]
    }
}

/// A routable point of the road network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    pub coordinate: Coordinate,
}

/// A road segment between two vertices.
///
/// `geometry` runs from `source` to `target`. A direction that cannot be
/// traversed carries a cost of `+inf`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: VertexId,
    pub target: VertexId,
    pub geometry: Vec<Coordinate>,
    pub forward_cost: f64,
    pub reverse_cost: f64,
    pub directed: bool,
}

impl Edge {
    pub fn is_forward_passable(&self) -> bool {
        self.forward_cost.is_finite()
    }

    pub fn is_reverse_passable(&self) -> bool {
        self.reverse_cost.is_finite()
    }

    pub fn length_m(&self) -> f64 {
        polyline_length_m(&self.geometry)
    }
}

/// Defaults applied when a persisted edge has no stored cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostDefaults {
    /// Speed used to turn length into seconds. `None` keeps costs in meters.
    pub default_speed_kph: Option<f64>,
}

impl Default for CostDefaults {
    fn default() -> Self {
        Self {
            default_speed_kph: Some(60.0),
        }
    }
}

/// One row of the persisted edge list, before cost defaults are applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: EdgeId,
    pub source: VertexId,
    pub target: VertexId,
    pub directed: bool,
    #[serde(default)]
    pub speed_kph: Option<f64>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub reverse_cost: Option<f64>,
    pub geometry: Vec<Coordinate>,
}

impl EdgeRecord {
    /// Resolve stored or default costs into a routable edge.
    ///
    /// Missing costs fall back to travel time at the edge (or default) speed,
    /// or to the geometric length when no speed is known. A directed edge with
    /// no stored reverse cost is impassable backwards. Any stored cost at or
    /// above [`IMPASSABLE_COST_SENTINEL`] makes its direction impassable.
    pub fn into_edge(self, defaults: &CostDefaults) -> Edge {
        let length_m = polyline_length_m(&self.geometry);
        let speed_kph = self
            .speed_kph
            .filter(|s| s.is_finite() && *s > 0.0)
            .or(defaults.default_speed_kph.filter(|s| *s > 0.0));
        let fallback = match speed_kph {
            Some(kph) => length_m / (kph * 1000.0 / 3600.0),
            None => length_m,
        };

        let forward_cost = self.cost.map_or(fallback, normalize_cost);
        let reverse_cost = match self.reverse_cost {
            Some(cost) => normalize_cost(cost),
            None if self.directed => f64::INFINITY,
            None => fallback,
        };

        Edge {
            id: self.id,
            source: self.source,
            target: self.target,
            geometry: self.geometry,
            forward_cost,
            reverse_cost,
            directed: self.directed,
        }
    }
}

fn normalize_cost(cost: f64) -> f64 {
    if cost >= IMPASSABLE_COST_SENTINEL {
        f64::INFINITY
    } else {
        cost
    }
}

/// Fuel grades sold at Chilean stations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FuelType {
    #[serde(rename = "93")]
    Gasoline93,
    #[serde(rename = "95")]
    Gasoline95,
    #[serde(rename = "97")]
    Gasoline97,
    #[serde(rename = "DI")]
    Diesel,
}

impl FuelType {
    pub fn code(&self) -> &'static str {
        match self {
            FuelType::Gasoline93 => "93",
            FuelType::Gasoline95 => "95",
            FuelType::Gasoline97 => "97",
            FuelType::Diesel => "DI",
        }
    }
}

impl FromStr for FuelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "93" => Ok(FuelType::Gasoline93),
            "95" => Ok(FuelType::Gasoline95),
            "97" => Ok(FuelType::Gasoline97),
            "DI" | "DIESEL" => Ok(FuelType::Diesel),
            other => Err(format!("unknown fuel type '{other}'")),
        }
    }
}

impl std::fmt::Display for FuelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A station promotion, typically a bank card discount on certain weekdays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Pesos off per liter. When unset, the first `$` amount in the
    /// description is used.
    #[serde(default)]
    pub discount_per_liter: Option<f64>,
    /// Days the promotion is valid. Empty means every day.
    #[serde(default)]
    pub days: Vec<Weekday>,
}

impl Promotion {
    pub fn applies_on(&self, day: Weekday) -> bool {
        self.days.is_empty() || self.days.contains(&day)
    }

    /// Discount per liter, zero when none can be determined.
    pub fn discount(&self) -> f64 {
        self.discount_per_liter
            .filter(|d| d.is_finite() && *d >= 0.0)
            .or_else(|| peso_amount(&self.description))
            .unwrap_or(0.0)
    }
}

/// First `$ 123` style amount in a promotion text. Dots are thousands
/// separators.
fn peso_amount(text: &str) -> Option<f64> {
    let (_, after) = text.split_once('$')?;
    let digits: String = after
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse::<f64>().ok()
}

/// Parse a weekday written in Spanish (`Miércoles`, `miercoles`) or English
/// (`Wed`, `Wednesday`).
pub fn parse_weekday(raw: &str) -> Option<Weekday> {
    let folded: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            other => other,
        })
        .collect();
    match folded.as_str() {
        "lunes" => Some(Weekday::Mon),
        "martes" => Some(Weekday::Tue),
        "miercoles" => Some(Weekday::Wed),
        "jueves" => Some(Weekday::Thu),
        "viernes" => Some(Weekday::Fri),
        "sabado" => Some(Weekday::Sat),
        "domingo" => Some(Weekday::Sun),
        other => other.parse::<Weekday>().ok(),
    }
}

/// What a liter costs at one station, with the promotion that lowered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpPrice {
    pub fuel_type: FuelType,
    pub base_price: f64,
    pub discount_per_liter: f64,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

/// A fuel station with its current prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: i64,
    pub code: String,
    pub brand: String,
    pub address: String,
    #[serde(default)]
    pub commune: String,
    /// Administrative region code, e.g. `"13"` for Santiago Metropolitan.
    #[serde(default)]
    pub region: String,
    pub location: Coordinate,
    #[serde(default)]
    pub prices: BTreeMap<FuelType, f64>,
    #[serde(default)]
    pub promotions: Vec<Promotion>,
}

impl Station {
    pub fn price(&self, fuel_type: FuelType) -> Option<f64> {
        self.prices.get(&fuel_type).copied()
    }

    pub fn has_promotion(&self) -> bool {
        !self.promotions.is_empty()
    }

    /// Largest discount valid on `day`, or across all promotions when no day
    /// is given. Equal discounts keep the first listed.
    pub fn best_promotion(&self, day: Option<Weekday>) -> Option<&Promotion> {
        self.promotions
            .iter()
            .filter(|p| day.map_or(true, |d| p.applies_on(d)))
            .fold(None, |best: Option<&Promotion>, p| match best {
                Some(b) if b.discount() >= p.discount() => Some(b),
                _ => Some(p),
            })
    }

    /// Price of `fuel_type`. Promotions only discount it when `day` is known.
    pub fn price_on(&self, fuel_type: FuelType, day: Option<Weekday>) -> Option<PumpPrice> {
        let base_price = self.price(fuel_type)?;
        let promotion = day.and_then(|d| self.best_promotion(Some(d)));
        let discount = promotion.map_or(0.0, Promotion::discount);
        Some(PumpPrice {
            fuel_type,
            base_price,
            discount_per_liter: discount,
            price: (base_price - discount).max(0.0),
            promotion: promotion.map(|p| p.title.clone()),
        })
    }
}
