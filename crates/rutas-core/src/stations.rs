//! Fuel station lookups (by viewport, around a point, along a route) and
//! price comparisons that account for weekday promotions.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::geo::{distance_m, distance_to_polyline_m, BoundingBox};
use crate::models::{Coordinate, FuelType, PumpPrice, Station};

pub const DEFAULT_NEAR_RADIUS_M: f64 = 5000.0;
pub const DEFAULT_ROUTE_BUFFER_M: f64 = 1000.0;
pub const DEFAULT_KM_PER_LITER: f64 = 12.0;

/// A station with its distance to whatever it was searched against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationHit<'a> {
    #[serde(flatten)]
    pub station: &'a Station,
    pub distance_m: f64,
    /// Price of the searched fuel, after any promotion valid that day.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pump_price: Option<PumpPrice>,
}

impl StationHit<'_> {
    fn price(&self) -> Option<f64> {
        self.pump_price.as_ref().map(|p| p.price)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuelEstimate {
    pub fuel_type: FuelType,
    pub km_per_liter: f64,
    pub liters_needed: f64,
    /// Id of the cheapest priced station, when any has a price.
    pub cheapest_station: Option<i64>,
    /// Price paid per liter there, promotion included.
    pub cheapest_price: Option<f64>,
    pub base_price: Option<f64>,
    pub discount_per_liter: Option<f64>,
    pub promotion: Option<String>,
    pub estimated_cost: Option<f64>,
    /// Pesos saved by the promotion on this trip.
    pub savings: Option<f64>,
}

/// Cost of a trip at one station with and without its promotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsReport {
    pub station_id: i64,
    pub station_code: String,
    pub brand: String,
    pub fuel_type: FuelType,
    pub liters_needed: f64,
    pub base_price: f64,
    pub base_total_cost: f64,
    pub discount_per_liter: f64,
    pub promo_price: f64,
    pub promo_total_cost: f64,
    pub total_savings: f64,
    pub promotion: String,
}

/// Price spread of one brand for one fuel type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandPrices {
    pub brand: String,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub station_count: usize,
}

type Cell = (i32, i32);

/// Stations bucketed on a lat/lon grid.
#[derive(Debug, Clone, Default)]
pub struct StationIndex {
    stations: Vec<Station>,
    cells: HashMap<Cell, Vec<usize>>,
    cell_deg: f64,
}

impl StationIndex {
    pub fn build(mut stations: Vec<Station>, cell_deg: f64) -> Self {
        let cell_deg = if cell_deg.is_finite() && cell_deg > 0.0 {
            cell_deg
        } else {
            0.01
        };
        stations.retain(|s| s.location.is_valid());
        stations.sort_by_key(|s| s.id);
        let mut cells: HashMap<Cell, Vec<usize>> = HashMap::new();
        for (idx, station) in stations.iter().enumerate() {
            cells
                .entry(cell_of(station.location, cell_deg))
                .or_default()
                .push(idx);
        }
        Self {
            stations,
            cells,
            cell_deg,
        }
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&Station> {
        self.stations
            .binary_search_by_key(&id, |s| s.id)
            .ok()
            .map(|idx| &self.stations[idx])
    }

    /// Indices of stations in cells overlapping `bbox`, ascending.
    fn candidates(&self, bbox: &BoundingBox) -> Vec<usize> {
        let min = cell_of(Coordinate::new(bbox.south, bbox.west), self.cell_deg);
        let max = cell_of(Coordinate::new(bbox.north, bbox.east), self.cell_deg);
        let rows = (max.0 as i64 - min.0 as i64 + 1).max(0) as u64;
        let cols = (max.1 as i64 - min.1 as i64 + 1).max(0) as u64;

        let mut out: Vec<usize> = if rows.saturating_mul(cols) > self.cells.len() as u64 {
            self.cells
                .iter()
                .filter(|(cell, _)| {
                    (min.0..=max.0).contains(&cell.0) && (min.1..=max.1).contains(&cell.1)
                })
                .flat_map(|(_, items)| items.iter().copied())
                .collect()
        } else {
            let mut out = Vec::new();
            for row in min.0..=max.0 {
                for col in min.1..=max.1 {
                    if let Some(items) = self.cells.get(&(row, col)) {
                        out.extend_from_slice(items);
                    }
                }
            }
            out
        };
        out.sort_unstable();
        out
    }

    /// Stations inside `bbox`. With a fuel type, only stations selling it,
    /// cheapest first; otherwise by id.
    pub fn within_bbox(
        &self,
        bbox: &BoundingBox,
        fuel_type: Option<FuelType>,
        limit: usize,
    ) -> Vec<&Station> {
        let mut hits: Vec<&Station> = self
            .candidates(bbox)
            .into_iter()
            .map(|idx| &self.stations[idx])
            .filter(|s| bbox.contains(s.location))
            .filter(|s| fuel_type.map_or(true, |fuel| s.price(fuel).is_some()))
            .collect();
        if let Some(fuel) = fuel_type {
            hits.sort_by(|a, b| {
                compare_price(a.price(fuel), b.price(fuel)).then_with(|| a.id.cmp(&b.id))
            });
        }
        hits.truncate(limit);
        hits
    }

    /// Stations within `max_distance_m` of `point`, nearest first.
    pub fn near_point(
        &self,
        point: Coordinate,
        max_distance_m: f64,
        fuel_type: Option<FuelType>,
        with_promotions: bool,
        limit: usize,
    ) -> Vec<StationHit<'_>> {
        if !point.is_valid() {
            return Vec::new();
        }
        let search = BoundingBox {
            south: point.lat,
            west: point.lon,
            north: point.lat,
            east: point.lon,
        }
        .expanded_by_m(max_distance_m);

        let mut hits: Vec<StationHit<'_>> = self
            .candidates(&search)
            .into_iter()
            .map(|idx| &self.stations[idx])
            .filter(|s| fuel_type.map_or(true, |fuel| s.price(fuel).is_some()))
            .filter(|s| !with_promotions || s.has_promotion())
            .map(|station| StationHit {
                station,
                distance_m: distance_m(point, station.location),
                pump_price: fuel_type.and_then(|fuel| station.price_on(fuel, None)),
            })
            .filter(|hit| hit.distance_m <= max_distance_m)
            .collect();
        hits.sort_by(|a, b| {
            a.distance_m
                .total_cmp(&b.distance_m)
                .then_with(|| a.station.id.cmp(&b.station.id))
        });
        hits.truncate(limit);
        hits
    }

    /// Stations within `buffer_m` of the route polyline. Cheapest first (no
    /// price sorts last), then closest to the route. With a `day`, prices
    /// include the best promotion valid on that day.
    pub fn along_route(
        &self,
        route: &[Coordinate],
        buffer_m: f64,
        fuel_type: Option<FuelType>,
        day: Option<Weekday>,
        limit: usize,
    ) -> Vec<StationHit<'_>> {
        let Some(bounds) = BoundingBox::enclosing(route) else {
            return Vec::new();
        };
        let search = bounds.expanded_by_m(buffer_m);

        let mut hits: Vec<StationHit<'_>> = self
            .candidates(&search)
            .into_iter()
            .map(|idx| &self.stations[idx])
            .map(|station| StationHit {
                station,
                distance_m: distance_to_polyline_m(station.location, route),
                pump_price: fuel_type.and_then(|fuel| station.price_on(fuel, day)),
            })
            .filter(|hit| hit.distance_m <= buffer_m)
            .collect();
        hits.sort_by(|a, b| {
            compare_price(a.price(), b.price())
                .then_with(|| a.distance_m.total_cmp(&b.distance_m))
                .then_with(|| a.station.id.cmp(&b.station.id))
        });
        hits.truncate(limit);
        hits
    }

    /// Cheapest stations selling `fuel_type` in `region`, by list price.
    pub fn cheapest_in_region(
        &self,
        region: &str,
        fuel_type: FuelType,
        limit: usize,
    ) -> Vec<&Station> {
        let region = region.trim();
        let mut hits: Vec<&Station> = self
            .stations
            .iter()
            .filter(|s| s.region.eq_ignore_ascii_case(region))
            .filter(|s| s.price(fuel_type).is_some())
            .collect();
        hits.sort_by(|a, b| {
            compare_price(a.price(fuel_type), b.price(fuel_type)).then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(limit);
        hits
    }

    /// Average, minimum and maximum list price per brand, cheapest average
    /// first. Optionally restricted to one region.
    pub fn compare_brands(&self, fuel_type: FuelType, region: Option<&str>) -> Vec<BrandPrices> {
        let region = region.map(str::trim).filter(|r| !r.is_empty());
        let mut by_brand: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for station in &self.stations {
            if region.is_some_and(|r| !station.region.eq_ignore_ascii_case(r)) {
                continue;
            }
            if let Some(price) = station.price(fuel_type) {
                by_brand.entry(station.brand.trim()).or_default().push(price);
            }
        }

        let mut out: Vec<BrandPrices> = by_brand
            .into_iter()
            .map(|(brand, prices)| BrandPrices {
                brand: brand.to_string(),
                avg_price: prices.iter().sum::<f64>() / prices.len() as f64,
                min_price: prices.iter().copied().fold(f64::INFINITY, f64::min),
                max_price: prices.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                station_count: prices.len(),
            })
            .collect();
        out.sort_by(|a, b| a.avg_price.total_cmp(&b.avg_price).then_with(|| a.brand.cmp(&b.brand)));
        out
    }
}

/// Missing prices order after every known price.
fn compare_price(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn cell_of(point: Coordinate, cell_deg: f64) -> Cell {
    (
        (point.lat / cell_deg).floor() as i32,
        (point.lon / cell_deg).floor() as i32,
    )
}

fn valid_km_per_liter(km_per_liter: f64) -> f64 {
    if km_per_liter.is_finite() && km_per_liter > 0.0 {
        km_per_liter
    } else {
        DEFAULT_KM_PER_LITER
    }
}

/// Fuel needed for `route_distance_m` and its cost at the cheapest station
/// among `stations`. Hits priced for another fuel are repriced at list price.
pub fn estimate_fuel_cost(
    route_distance_m: f64,
    stations: &[StationHit<'_>],
    fuel_type: FuelType,
    km_per_liter: f64,
) -> FuelEstimate {
    let km_per_liter = valid_km_per_liter(km_per_liter);
    let liters_needed = route_distance_m / 1000.0 / km_per_liter;
    let cheapest = stations
        .iter()
        .filter_map(|hit| {
            let price = match &hit.pump_price {
                Some(price) if price.fuel_type == fuel_type => Some(price.clone()),
                _ => hit.station.price_on(fuel_type, None),
            };
            price.map(|price| (hit.station.id, price))
        })
        .min_by(|a, b| a.1.price.total_cmp(&b.1.price).then_with(|| a.0.cmp(&b.0)));

    let (cheapest_station, pump) = match cheapest {
        Some((id, pump)) => (Some(id), Some(pump)),
        None => (None, None),
    };
    FuelEstimate {
        fuel_type,
        km_per_liter,
        liters_needed,
        cheapest_station,
        cheapest_price: pump.as_ref().map(|p| p.price),
        base_price: pump.as_ref().map(|p| p.base_price),
        discount_per_liter: pump.as_ref().map(|p| p.discount_per_liter),
        estimated_cost: pump.as_ref().map(|p| (liters_needed * p.price).round()),
        savings: pump
            .as_ref()
            .map(|p| (liters_needed * (p.base_price - p.price)).round()),
        promotion: pump.and_then(|p| p.promotion),
    }
}

/// What the station's promotion saves on a trip of `route_distance_m`.
///
/// `None` when the station has no price for the fuel or no promotion valid on
/// `day` (any day when unset). `discount_per_liter` overrides the
/// promotion's own discount. The discounted price never drops below zero.
pub fn promotion_savings(
    station: &Station,
    fuel_type: FuelType,
    route_distance_m: f64,
    km_per_liter: f64,
    day: Option<Weekday>,
    discount_per_liter: Option<f64>,
) -> Option<SavingsReport> {
    let base_price = station.price(fuel_type)?;
    let promotion = station.best_promotion(day)?;
    let discount = discount_per_liter
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or_else(|| promotion.discount());

    let liters_needed = route_distance_m / 1000.0 / valid_km_per_liter(km_per_liter);
    let promo_price = (base_price - discount).max(0.0);
    let base_total_cost = (base_price * liters_needed).round();
    let promo_total_cost = (promo_price * liters_needed).round();
    let promotion = if promotion.description.is_empty() {
        promotion.title.clone()
    } else {
        format!("{} - {}", promotion.title, promotion.description)
    };

    Some(SavingsReport {
        station_id: station.id,
        station_code: station.code.clone(),
        brand: station.brand.clone(),
        fuel_type,
        liters_needed,
        base_price,
        base_total_cost,
        discount_per_liter: discount,
        promo_price,
        promo_total_cost,
        total_savings: base_total_cost - promo_total_cost,
        promotion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::offset_position;
    use crate::models::Promotion;

    fn station(
        id: i64,
        brand: &str,
        region: &str,
        location: Coordinate,
        prices: &[(FuelType, f64)],
        promotions: Vec<Promotion>,
    ) -> Station {
        Station {
            id,
            code: format!("ST{id:04}"),
            brand: brand.to_string(),
            address: format!("Calle {id}"),
            commune: "Santiago".to_string(),
            region: region.to_string(),
            location,
            prices: prices.iter().copied().collect(),
            promotions,
        }
    }

    fn wednesday_card() -> Promotion {
        Promotion {
            title: "Miércoles Banco".to_string(),
            description: "$60 por litro".to_string(),
            discount_per_liter: None,
            days: vec![Weekday::Wed],
        }
    }

    fn coffee() -> Promotion {
        Promotion {
            title: "2x1 cafe".to_string(),
            description: String::new(),
            discount_per_liter: None,
            days: Vec::new(),
        }
    }

    fn fixture() -> (StationIndex, Coordinate) {
        let origin = Coordinate::new(-33.45, -70.66);
        let at = |north: f64, east: f64| offset_position(origin, north, east);
        let stations = vec![
            station(1, "COPEC", "13", at(0.0, 200.0), &[(FuelType::Gasoline93, 1290.0)], vec![wednesday_card()]),
            station(2, "COPEC", "13", at(0.0, 800.0), &[(FuelType::Gasoline93, 1250.0)], vec![coffee()]),
            station(3, "SHELL", "13", at(3000.0, 0.0), &[(FuelType::Diesel, 990.0)], Vec::new()),
            station(4, "PETROBRAS", "13", at(0.0, 1500.0), &[], Vec::new()),
            station(5, "SHELL", "5", at(20_000.0, 0.0), &[(FuelType::Gasoline93, 1100.0)], vec![coffee()]),
        ];
        (StationIndex::build(stations, 0.01), origin)
    }

    fn ids(hits: &[StationHit<'_>]) -> Vec<i64> {
        hits.iter().map(|h| h.station.id).collect()
    }

    #[test]
    fn bbox_listing_filters_and_orders_by_price() {
        let (index, origin) = fixture();
        let bbox = BoundingBox::enclosing(&[origin])
            .unwrap()
            .expanded_by_m(4000.0);

        let all: Vec<i64> = index.within_bbox(&bbox, None, 100).iter().map(|s| s.id).collect();
        assert_eq!(all, vec![1, 2, 3, 4]);

        let gas: Vec<i64> = index
            .within_bbox(&bbox, Some(FuelType::Gasoline93), 100)
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(gas, vec![2, 1]);
        assert_eq!(index.within_bbox(&bbox, None, 2).len(), 2);
    }

    #[test]
    fn near_point_is_nearest_first_within_radius() {
        let (index, origin) = fixture();
        let hits = index.near_point(origin, DEFAULT_NEAR_RADIUS_M, None, false, 10);
        assert_eq!(ids(&hits), vec![1, 2, 4, 3]);
        assert!(hits.iter().all(|h| h.pump_price.is_none()));

        let promos = index.near_point(origin, DEFAULT_NEAR_RADIUS_M, None, true, 10);
        assert_eq!(ids(&promos), vec![1, 2]);

        let priced = index.near_point(origin, DEFAULT_NEAR_RADIUS_M, Some(FuelType::Gasoline93), false, 10);
        assert_eq!(ids(&priced), vec![1, 2]);
        assert_eq!(priced[0].pump_price.as_ref().unwrap().price, 1290.0);
    }

    #[test]
    fn along_route_prefers_cheapest_then_closest() {
        let (index, origin) = fixture();
        let route = vec![origin, offset_position(origin, 0.0, 2000.0)];
        let hits = index.along_route(&route, DEFAULT_ROUTE_BUFFER_M, Some(FuelType::Gasoline93), None, 10);
        // 3 is 3 km off the route; 4 has no price and sorts last.
        assert_eq!(ids(&hits), vec![2, 1, 4]);
        assert!(hits.iter().all(|h| h.distance_m <= DEFAULT_ROUTE_BUFFER_M));
    }

    #[test]
    fn along_route_applies_promotions_valid_that_day() {
        let (index, origin) = fixture();
        let route = vec![origin, offset_position(origin, 0.0, 2000.0)];

        let wednesday = index.along_route(&route, DEFAULT_ROUTE_BUFFER_M, Some(FuelType::Gasoline93), Some(Weekday::Wed), 10);
        assert_eq!(ids(&wednesday), vec![1, 2, 4]);
        let discounted = wednesday[0].pump_price.as_ref().unwrap();
        assert_eq!(discounted.price, 1230.0);
        assert_eq!(discounted.discount_per_liter, 60.0);
        assert_eq!(discounted.promotion.as_deref(), Some("Miércoles Banco"));

        let thursday = index.along_route(&route, DEFAULT_ROUTE_BUFFER_M, Some(FuelType::Gasoline93), Some(Weekday::Thu), 10);
        assert_eq!(ids(&thursday), vec![2, 1, 4]);
        assert_eq!(thursday[1].pump_price.as_ref().unwrap().price, 1290.0);
    }

    #[test]
    fn fuel_estimate_uses_cheapest_station() {
        let (index, origin) = fixture();
        let route = vec![origin, offset_position(origin, 0.0, 2000.0)];
        let hits = index.along_route(&route, DEFAULT_ROUTE_BUFFER_M, Some(FuelType::Gasoline93), None, 10);

        let estimate = estimate_fuel_cost(120_000.0, &hits, FuelType::Gasoline93, 12.0);
        assert!((estimate.liters_needed - 10.0).abs() < 1e-9);
        assert_eq!(estimate.cheapest_station, Some(2));
        assert_eq!(estimate.estimated_cost, Some(12_500.0));
        assert_eq!(estimate.savings, Some(0.0));

        let none = estimate_fuel_cost(120_000.0, &hits, FuelType::Diesel, 0.0);
        assert_eq!(none.km_per_liter, DEFAULT_KM_PER_LITER);
        assert!(none.estimated_cost.is_none());
        assert!(none.cheapest_station.is_none());
    }

    #[test]
    fn fuel_estimate_reports_promotion_savings() {
        let (index, origin) = fixture();
        let route = vec![origin, offset_position(origin, 0.0, 2000.0)];
        let hits = index.along_route(&route, DEFAULT_ROUTE_BUFFER_M, Some(FuelType::Gasoline93), Some(Weekday::Wed), 10);

        let estimate = estimate_fuel_cost(120_000.0, &hits, FuelType::Gasoline93, 12.0);
        assert_eq!(estimate.cheapest_station, Some(1));
        assert_eq!(estimate.cheapest_price, Some(1230.0));
        assert_eq!(estimate.base_price, Some(1290.0));
        assert_eq!(estimate.estimated_cost, Some(12_300.0));
        assert_eq!(estimate.savings, Some(600.0));
        assert_eq!(estimate.promotion.as_deref(), Some("Miércoles Banco"));
    }

    #[test]
    fn promotion_savings_compares_with_and_without_discount() {
        let (index, _) = fixture();
        let card = index.get(1).unwrap();

        let report = promotion_savings(card, FuelType::Gasoline93, 240_000.0, 12.0, Some(Weekday::Wed), None).unwrap();
        assert!((report.liters_needed - 20.0).abs() < 1e-9);
        assert_eq!(report.base_total_cost, 25_800.0);
        assert_eq!(report.promo_price, 1230.0);
        assert_eq!(report.promo_total_cost, 24_600.0);
        assert_eq!(report.total_savings, 1200.0);
        assert_eq!(report.promotion, "Miércoles Banco - $60 por litro");
        assert_eq!(report.station_code, "ST0001");

        let overridden = promotion_savings(card, FuelType::Gasoline93, 120_000.0, 12.0, None, Some(5000.0)).unwrap();
        assert_eq!(overridden.promo_price, 0.0);
        assert_eq!(overridden.total_savings, overridden.base_total_cost);

        assert!(promotion_savings(card, FuelType::Gasoline93, 1000.0, 12.0, Some(Weekday::Mon), None).is_none());
        assert!(promotion_savings(card, FuelType::Diesel, 1000.0, 12.0, None, None).is_none());
        let no_promo = index.get(3).unwrap();
        assert!(promotion_savings(no_promo, FuelType::Diesel, 1000.0, 12.0, None, None).is_none());
    }

    #[test]
    fn brands_compare_by_average_price() {
        let (index, _) = fixture();
        let all = index.compare_brands(FuelType::Gasoline93, None);
        let brands: Vec<&str> = all.iter().map(|b| b.brand.as_str()).collect();
        assert_eq!(brands, vec!["SHELL", "COPEC"]);
        assert_eq!(all[1].avg_price, 1270.0);
        assert_eq!(all[1].min_price, 1250.0);
        assert_eq!(all[1].max_price, 1290.0);
        assert_eq!(all[1].station_count, 2);

        let metro = index.compare_brands(FuelType::Gasoline93, Some("13"));
        assert_eq!(metro.len(), 1);
        assert_eq!(metro[0].brand, "COPEC");
        assert!(index.compare_brands(FuelType::Gasoline97, None).is_empty());
    }

    #[test]
    fn cheapest_in_region_skips_unpriced_and_other_regions() {
        let (index, _) = fixture();
        let ids = |stations: Vec<&Station>| stations.iter().map(|s| s.id).collect::<Vec<_>>();
        assert_eq!(ids(index.cheapest_in_region("13", FuelType::Gasoline93, 10)), vec![2, 1]);
        assert_eq!(ids(index.cheapest_in_region("13", FuelType::Gasoline93, 1)), vec![2]);
        assert_eq!(ids(index.cheapest_in_region("5", FuelType::Gasoline93, 10)), vec![5]);
        assert_eq!(ids(index.cheapest_in_region("13", FuelType::Diesel, 10)), vec![3]);
        assert!(index.cheapest_in_region("8", FuelType::Diesel, 10).is_empty());
    }
}
