//! GeoJSON views of routes and road edges.

use geojson::Feature;
use serde_json::json;

use crate::models::{Coordinate, Edge};
use crate::route::Route;

/// `[lon, lat]` positions. A single point is repeated so the line stays valid.
pub fn line_coordinates(points: &[Coordinate]) -> Vec<[f64; 2]> {
    let mut coords: Vec<[f64; 2]> = points.iter().map(|p| [p.lon, p.lat]).collect();
    if coords.len() == 1 {
        coords.push(coords[0]);
    }
    coords
}

fn feature_from_json(value: serde_json::Value) -> Result<Feature, geojson::Error> {
    serde_json::from_value(value).map_err(geojson::Error::from)
}

impl Route {
    /// The route as a LineString feature.
    pub fn to_feature(&self) -> Result<Feature, geojson::Error> {
        let value = json!({
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": line_coordinates(&self.geometry),
            },
            "properties": {
                "start_node": self.start_vertex,
                "end_node": self.end_vertex,
                "total_cost": self.total_cost,
                "segment_count": self.segments.len(),
            }
        });
        feature_from_json(value)
    }
}

impl Edge {
    /// Viewport feature for one road edge. Impassable directions report a
    /// `null` cost.
    pub fn to_feature(&self) -> Result<Feature, geojson::Error> {
        let cost = self.forward_cost.is_finite().then_some(self.forward_cost);
        let reverse_cost = self.reverse_cost.is_finite().then_some(self.reverse_cost);
        let value = json!({
            "type": "Feature",
            "id": self.id,
            "geometry": {
                "type": "LineString",
                "coordinates": line_coordinates(&self.geometry),
            },
            "properties": {
                "id": self.id,
                "source": self.source,
                "target": self.target,
                "cost": cost,
                "reverse_cost": reverse_cost,
                "directed": self.directed,
            }
        });
        feature_from_json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RouteSegment;
    use crate::graph::Direction;

    #[test]
    fn single_point_route_is_still_a_line() {
        let route = Route {
            start_vertex: 4,
            end_vertex: 4,
            segments: Vec::new(),
            geometry: vec![Coordinate::new(-33.4, -70.6)],
            total_cost: 0.0,
            distance_m: 0.0,
        };
        let value = serde_json::to_value(route.to_feature().unwrap()).unwrap();
        assert_eq!(
            value["geometry"]["coordinates"],
            json!([[-70.6, -33.4], [-70.6, -33.4]])
        );
        assert_eq!(value["properties"]["segment_count"], 0);
    }

    #[test]
    fn route_feature_carries_endpoints_and_cost() {
        let route = Route {
            start_vertex: 1,
            end_vertex: 2,
            segments: vec![RouteSegment {
                edge_id: 9,
                direction: Direction::Forward,
                cost: 60.0,
            }],
            geometry: vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.01)],
            total_cost: 60.0,
            distance_m: 1112.0,
        };
        let value = serde_json::to_value(route.to_feature().unwrap()).unwrap();
        assert_eq!(value["geometry"]["type"], "LineString");
        assert_eq!(value["properties"]["start_node"], 1);
        assert_eq!(value["properties"]["total_cost"], 60.0);
    }

    #[test]
    fn one_way_edge_feature_has_null_reverse_cost() {
        let edge = Edge {
            id: 77,
            source: 1,
            target: 2,
            geometry: vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.01)],
            forward_cost: 5.0,
            reverse_cost: f64::INFINITY,
            directed: true,
        };
        let value = serde_json::to_value(edge.to_feature().unwrap()).unwrap();
        assert!(value["properties"]["reverse_cost"].is_null());
        assert_eq!(value["properties"]["id"], 77);
    }

    #[test]
    fn edge_feature_parses_with_id_and_properties() {
        let edge = Edge {
            id: 12,
            source: 3,
            target: 4,
            geometry: vec![Coordinate::new(-33.4, -70.6), Coordinate::new(-33.41, -70.61)],
            forward_cost: f64::INFINITY,
            reverse_cost: 8.0,
            directed: false,
        };
        let feature = edge.to_feature().unwrap();
        assert_eq!(feature.id, Some(geojson::feature::Id::Number(12.into())));
        assert!(feature.geometry.is_some());
        let properties = feature.properties.unwrap();
        assert!(properties["cost"].is_null());
        assert_eq!(properties["reverse_cost"], 8.0);
    }
}
