//! Spatial lookup over graph vertices and edges.
//!
//! Two backends share the [`SpatialIndex`] trait: [`GridIndex`] buckets
//! vertices and edges into fixed-size lat/lon cells and is what the server
//! uses; [`LinearIndex`] scans everything and exists for tests and tiny
//! fixtures (fine below [`LINEAR_INDEX_MAX_ITEMS`], not meant for real
//! networks).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geo::{distance_m, meters_to_lat, meters_to_lon, BoundingBox};
use crate::graph::RoadGraph;
use crate::models::{Coordinate, EdgeId, VertexId};

/// Size above which a linear scan should not be used.
pub const LINEAR_INDEX_MAX_ITEMS: usize = 10_000;

pub const DEFAULT_CELL_DEG: f64 = 0.01;

/// Closest usable vertex to a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestVertex {
    /// Dense vertex index in the graph the index was built from.
    pub vertex: usize,
    pub id: VertexId,
    pub coordinate: Coordinate,
    pub distance_m: f64,
}

/// Where a bounding-box page starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageCursor {
    /// 1-based page number. Only stable while the page size stays fixed.
    Page(u32),
    /// Keyset cursor: everything with an id strictly greater than this one.
    After(EdgeId),
}

impl Default for PageCursor {
    fn default() -> Self {
        PageCursor::Page(1)
    }
}

/// One page of edges intersecting a bounding box, in ascending id order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EdgePage {
    /// Dense edge indices.
    pub edges: Vec<usize>,
    pub has_more: bool,
    /// Id of the last edge on this page, to resume with [`PageCursor::After`].
    pub next_after: Option<EdgeId>,
}

pub trait SpatialIndex: Send + Sync {
    /// Nearest indexed vertex within `max_distance_m` (inclusive). Equal
    /// distances resolve to the smallest vertex id.
    fn nearest(&self, point: Coordinate, max_distance_m: f64) -> Option<NearestVertex>;

    /// Dense indices of every edge whose geometry touches `bbox`, unordered.
    fn edges_intersecting(&self, graph: &RoadGraph, bbox: &BoundingBox) -> Vec<usize>;

    fn name(&self) -> &'static str;

    /// Page through edges intersecting `bbox` in ascending edge id order.
    fn query(
        &self,
        graph: &RoadGraph,
        bbox: &BoundingBox,
        cursor: PageCursor,
        page_size: usize,
    ) -> EdgePage {
        paginate(graph, self.edges_intersecting(graph, bbox), cursor, page_size)
    }
}

#[derive(Debug, Clone, Copy)]
struct VertexEntry {
    vertex: usize,
    id: VertexId,
    coordinate: Coordinate,
}

impl VertexEntry {
    fn closer_than(&self, distance: f64, best: &Option<NearestVertex>) -> bool {
        match best {
            None => true,
            Some(current) => {
                distance < current.distance_m
                    || (distance == current.distance_m && self.id < current.id)
            }
        }
    }
}

fn routable_vertices(graph: &RoadGraph) -> Vec<VertexEntry> {
    graph
        .vertices()
        .iter()
        .enumerate()
        .filter(|(idx, _)| graph.is_routable(*idx))
        .map(|(idx, v)| VertexEntry {
            vertex: idx,
            id: v.id,
            coordinate: v.coordinate,
        })
        .collect()
}

fn nearest_of<'a>(
    entries: impl Iterator<Item = &'a VertexEntry>,
    point: Coordinate,
    max_distance_m: f64,
) -> Option<NearestVertex> {
    if !point.is_valid() || !(max_distance_m >= 0.0) {
        return None;
    }
    let mut best: Option<NearestVertex> = None;
    for entry in entries {
        let distance = distance_m(point, entry.coordinate);
        if distance <= max_distance_m && entry.closer_than(distance, &best) {
            best = Some(NearestVertex {
                vertex: entry.vertex,
                id: entry.id,
                coordinate: entry.coordinate,
                distance_m: distance,
            });
        }
    }
    best
}

fn paginate(
    graph: &RoadGraph,
    mut matches: Vec<usize>,
    cursor: PageCursor,
    page_size: usize,
) -> EdgePage {
    // Edges are stored sorted by id, so index order is id order.
    matches.sort_unstable();
    matches.dedup();
    let page_size = page_size.max(1);

    let start = match cursor {
        PageCursor::Page(page) => (page.max(1) as usize - 1).saturating_mul(page_size),
        PageCursor::After(after) => matches.partition_point(|idx| graph.edge(*idx).id <= after),
    };
    if start >= matches.len() {
        return EdgePage::default();
    }
    let end = start.saturating_add(page_size).min(matches.len());
    let edges = matches[start..end].to_vec();
    let next_after = edges.last().map(|idx| graph.edge(*idx).id);
    EdgePage {
        edges,
        has_more: end < matches.len(),
        next_after,
    }
}

type Cell = (i32, i32);

/// Segment parameter at which coordinate `start + t * delta` first leaves
/// unit cell `cell`.
fn boundary_param(start: f64, delta: f64, cell: i32) -> f64 {
    if delta > 0.0 {
        (cell as f64 + 1.0 - start) / delta
    } else if delta < 0.0 {
        (cell as f64 - start) / delta
    } else {
        f64::INFINITY
    }
}

/// Uniform lat/lon grid. Vertices live in the cell containing them; edges are
/// registered in the cells their segments pass through, so a long diagonal
/// edge costs cells in proportion to its length rather than its bounding box.
#[derive(Debug, Clone)]
pub struct GridIndex {
    cell_deg: f64,
    vertex_cells: HashMap<Cell, Vec<VertexEntry>>,
    edge_cells: HashMap<Cell, Vec<usize>>,
    vertex_count: usize,
}

impl GridIndex {
    pub fn build(graph: &RoadGraph, cell_deg: f64) -> Self {
        let cell_deg = if cell_deg.is_finite() && cell_deg > 0.0 {
            cell_deg
        } else {
            DEFAULT_CELL_DEG
        };
        let mut index = Self {
            cell_deg,
            vertex_cells: HashMap::new(),
            edge_cells: HashMap::new(),
            vertex_count: 0,
        };

        for entry in routable_vertices(graph) {
            let cell = index.cell_of(entry.coordinate);
            index.vertex_cells.entry(cell).or_default().push(entry);
            index.vertex_count += 1;
        }

        let mut crossed = Vec::new();
        for (idx, edge) in graph.edges().iter().enumerate() {
            crossed.clear();
            for pair in edge.geometry.windows(2) {
                index.segment_cells(pair[0], pair[1], &mut crossed);
            }
            if let [only] = edge.geometry.as_slice() {
                crossed.push(index.cell_of(*only));
            }
            crossed.sort_unstable();
            crossed.dedup();
            for cell in &crossed {
                index.edge_cells.entry(*cell).or_default().push(idx);
            }
        }

        tracing::debug!(
            vertices = index.vertex_count,
            vertex_cells = index.vertex_cells.len(),
            edge_cells = index.edge_cells.len(),
            cell_deg,
            "grid index built"
        );
        index
    }

    fn cell_of(&self, point: Coordinate) -> Cell {
        (
            (point.lat / self.cell_deg).floor() as i32,
            (point.lon / self.cell_deg).floor() as i32,
        )
    }

    /// Appends every cell the straight segment `a`-`b` passes through, in
    /// traversal order. Where the segment crosses a cell corner exactly, both
    /// side cells are included.
    fn segment_cells(&self, a: Coordinate, b: Coordinate, out: &mut Vec<Cell>) {
        let (x0, y0) = (a.lon / self.cell_deg, a.lat / self.cell_deg);
        let (x1, y1) = (b.lon / self.cell_deg, b.lat / self.cell_deg);
        let (mut row, mut col) = self.cell_of(a);
        let end = self.cell_of(b);
        let mut remaining =
            (end.0 as i64 - row as i64).unsigned_abs() + (end.1 as i64 - col as i64).unsigned_abs();

        let (dx, dy) = (x1 - x0, y1 - y0);
        let step_col = if dx > 0.0 { 1 } else { -1 };
        let step_row = if dy > 0.0 { 1 } else { -1 };
        // Parametric distance along the segment to the next column/row line.
        let mut next_x = boundary_param(x0, dx, col);
        let mut next_y = boundary_param(y0, dy, row);
        let delta_x = if dx != 0.0 { (1.0 / dx).abs() } else { f64::INFINITY };
        let delta_y = if dy != 0.0 { (1.0 / dy).abs() } else { f64::INFINITY };

        out.push((row, col));
        while remaining > 0 {
            if remaining >= 2 && (next_x - next_y).abs() <= 1e-12 {
                out.push((row, col + step_col));
                out.push((row + step_row, col));
                col += step_col;
                row += step_row;
                next_x += delta_x;
                next_y += delta_y;
                remaining -= 2;
            } else if next_x < next_y {
                col += step_col;
                next_x += delta_x;
                remaining -= 1;
            } else {
                row += step_row;
                next_y += delta_y;
                remaining -= 1;
            }
            out.push((row, col));
        }
        if (row, col) != end {
            // Rounding walked off the exact line; the far cell still holds b.
            out.push(end);
        }
    }

    fn cell_span(&self, bbox: &BoundingBox) -> (Cell, Cell) {
        (
            self.cell_of(Coordinate::new(bbox.south, bbox.west)),
            self.cell_of(Coordinate::new(bbox.north, bbox.east)),
        )
    }

    /// Items from every occupied cell within the span. Walks the occupied
    /// cells instead when the span is larger than the map itself.
    fn cells_in_span<'a, T>(
        map: &'a HashMap<Cell, Vec<T>>,
        min: Cell,
        max: Cell,
    ) -> Vec<&'a Vec<T>> {
        let rows = (max.0 as i64 - min.0 as i64 + 1).max(0) as u64;
        let cols = (max.1 as i64 - min.1 as i64 + 1).max(0) as u64;
        if rows.saturating_mul(cols) > map.len() as u64 {
            map.iter()
                .filter(|(cell, _)| {
                    (min.0..=max.0).contains(&cell.0) && (min.1..=max.1).contains(&cell.1)
                })
                .map(|(_, items)| items)
                .collect()
        } else {
            let mut out = Vec::new();
            for row in min.0..=max.0 {
                for col in min.1..=max.1 {
                    if let Some(items) = map.get(&(row, col)) {
                        out.push(items);
                    }
                }
            }
            out
        }
    }
}

impl SpatialIndex for GridIndex {
    fn nearest(&self, point: Coordinate, max_distance_m: f64) -> Option<NearestVertex> {
        if !point.is_valid() || !(max_distance_m >= 0.0) {
            return None;
        }
        // Degree conversions are ellipsoidal while distances are haversine, so
        // the search box is padded to never undershoot the radius.
        let reach_m = max_distance_m * 1.01 + 1.0;
        let dlat = meters_to_lat(reach_m, point.lat);
        let dlon = if point.lat.abs() > 89.0 {
            180.0
        } else {
            meters_to_lon(reach_m, point.lat)
        };
        let search = BoundingBox {
            south: (point.lat - dlat).max(-90.0),
            west: (point.lon - dlon).max(-180.0),
            north: (point.lat + dlat).min(90.0),
            east: (point.lon + dlon).min(180.0),
        };
        let (min, max) = self.cell_span(&search);
        let buckets = Self::cells_in_span(&self.vertex_cells, min, max);
        nearest_of(buckets.into_iter().flatten(), point, max_distance_m)
    }

    fn edges_intersecting(&self, graph: &RoadGraph, bbox: &BoundingBox) -> Vec<usize> {
        let (min, max) = self.cell_span(bbox);
        let mut candidates: Vec<usize> = Self::cells_in_span(&self.edge_cells, min, max)
            .into_iter()
            .flatten()
            .copied()
            .collect();
        candidates.sort_unstable();
        candidates.dedup();
        candidates.retain(|idx| bbox.intersects_polyline(&graph.edge(*idx).geometry));
        candidates
    }

    fn name(&self) -> &'static str {
        "grid"
    }
}

/// Brute-force backend for tests.
#[derive(Debug, Clone)]
pub struct LinearIndex {
    vertices: Vec<VertexEntry>,
}

impl LinearIndex {
    pub fn build(graph: &RoadGraph) -> Self {
        let vertices = routable_vertices(graph);
        if vertices.len() + graph.edges().len() > LINEAR_INDEX_MAX_ITEMS {
            tracing::warn!(
                vertices = vertices.len(),
                edges = graph.edges().len(),
                "linear index used above its intended size"
            );
        }
        Self { vertices }
    }
}

impl SpatialIndex for LinearIndex {
    fn nearest(&self, point: Coordinate, max_distance_m: f64) -> Option<NearestVertex> {
        nearest_of(self.vertices.iter(), point, max_distance_m)
    }

    fn edges_intersecting(&self, graph: &RoadGraph, bbox: &BoundingBox) -> Vec<usize> {
        graph
            .edges()
            .iter()
            .enumerate()
            .filter(|(_, edge)| bbox.intersects_polyline(&edge.geometry))
            .map(|(idx, _)| idx)
            .collect()
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}
