//! Vector geometry, features, and analysis regions

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{BoundingBox, GridSpec, PropertyValue};

/// Map coordinate pair (x, y)
pub type Coord = (f64, f64);

/// Polygon with an exterior ring and optional holes. Rings are implicitly closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Vec<Coord>,
    #[serde(default)]
    pub holes: Vec<Vec<Coord>>,
}

impl Polygon {
    pub fn new(exterior: Vec<Coord>) -> Self {
        Self {
            exterior,
            holes: Vec::new(),
        }
    }

    /// Axis-aligned rectangle
    pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        let b = BoundingBox::new(min_x, min_y, max_x, max_y);
        Self::new(vec![
            (b.min_x, b.min_y),
            (b.max_x, b.min_y),
            (b.max_x, b.max_y),
            (b.min_x, b.max_y),
        ])
    }

    pub fn with_hole(mut self, hole: Vec<Coord>) -> Self {
        self.holes.push(hole);
        self
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        ring_bounds(&self.exterior)
    }

    /// Even-odd containment test against the exterior minus holes
    pub fn contains(&self, x: f64, y: f64) -> bool {
        ring_contains(&self.exterior, x, y) && !self.holes.iter().any(|h| ring_contains(h, x, y))
    }

    /// Shortest distance from a point to any ring edge
    pub fn distance_to_boundary(&self, x: f64, y: f64) -> f64 {
        std::iter::once(&self.exterior)
            .chain(self.holes.iter())
            .map(|ring| ring_distance(ring, x, y))
            .fold(f64::INFINITY, f64::min)
    }
}

fn ring_bounds(ring: &[Coord]) -> Option<BoundingBox> {
    let (first, rest) = ring.split_first()?;
    let init = BoundingBox::new(first.0, first.1, first.0, first.1);
    Some(rest.iter().fold(init, |b, &(x, y)| {
        b.union(&BoundingBox::new(x, y, x, y))
    }))
}

/// Ray-casting point-in-ring test
fn ring_contains(ring: &[Coord], x: f64, y: f64) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn ring_distance(ring: &[Coord], x: f64, y: f64) -> f64 {
    let n = ring.len();
    if n == 0 {
        return f64::INFINITY;
    }
    (0..n)
        .map(|i| segment_distance((x, y), ring[i], ring[(i + 1) % n]))
        .fold(f64::INFINITY, f64::min)
}

fn segment_distance(p: Coord, a: Coord, b: Coord) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}

/// Spatial region: polygons or point sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Coord),
    MultiPoint(Vec<Coord>),
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Geometry::Polygon(Polygon::rectangle(min_x, min_y, max_x, max_y))
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        match self {
            Geometry::Point(p) => Some(BoundingBox::new(p.0, p.1, p.0, p.1)),
            Geometry::MultiPoint(points) => ring_bounds(points),
            Geometry::Polygon(poly) => poly.bounds(),
            Geometry::MultiPolygon(polys) => polys
                .iter()
                .filter_map(Polygon::bounds)
                .reduce(|a, b| a.union(&b)),
        }
    }

    /// Whether a map coordinate lies inside the geometry's area. Point geometries have no area.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self {
            Geometry::Point(_) | Geometry::MultiPoint(_) => false,
            Geometry::Polygon(poly) => poly.contains(x, y),
            Geometry::MultiPolygon(polys) => polys.iter().any(|p| p.contains(x, y)),
        }
    }

    /// Distance from an interior point to the nearest polygon edge
    pub fn distance_to_boundary(&self, x: f64, y: f64) -> f64 {
        match self {
            Geometry::Point(p) => segment_distance((x, y), *p, *p),
            Geometry::MultiPoint(points) => points
                .iter()
                .map(|p| segment_distance((x, y), *p, *p))
                .fold(f64::INFINITY, f64::min),
            Geometry::Polygon(poly) => poly.distance_to_boundary(x, y),
            Geometry::MultiPolygon(polys) => polys
                .iter()
                .map(|p| p.distance_to_boundary(x, y))
                .fold(f64::INFINITY, f64::min),
        }
    }

    /// Pixels of `grid` covered by the geometry.
    ///
    /// Polygons cover the pixels whose centre lies inside them; points cover
    /// the pixel they fall in.
    pub fn coverage_mask(&self, grid: &GridSpec) -> Array2<bool> {
        let mut mask = Array2::from_elem(grid.shape(), false);
        match self {
            Geometry::Point(p) => mark_point(&mut mask, grid, *p),
            Geometry::MultiPoint(points) => {
                for p in points {
                    mark_point(&mut mask, grid, *p);
                }
            }
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => {
                let bounds = match self.bounds() {
                    Some(b) => b,
                    None => return mask,
                };
                if !bounds.intersects(&grid.bounds()) {
                    return mask;
                }
                for ((row, col), covered) in mask.indexed_iter_mut() {
                    let (x, y) = grid.pixel_center(row, col);
                    *covered = bounds.contains(x, y) && self.contains(x, y);
                }
            }
        }
        mask
    }
}

fn mark_point(mask: &mut Array2<bool>, grid: &GridSpec, p: Coord) {
    if let Some(idx) = grid.locate(p.0, p.1) {
        mask[idx] = true;
    }
}

/// Geometry with scalar properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(PropertyValue::as_number)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.bounds())
            .reduce(|a, b| a.union(&b))
    }

    /// Union of the coverage masks of every feature geometry
    pub fn coverage_mask(&self, grid: &GridSpec) -> Array2<bool> {
        let mut mask = Array2::from_elem(grid.shape(), false);
        for feature in &self.features {
            let part = feature.geometry.coverage_mask(grid);
            mask.zip_mut_with(&part, |m, &p| *m |= p);
        }
        mask
    }
}

/// Region of interest: its outline and the pixel grid all rasters of a run share
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub geometry: Geometry,
    pub grid: GridSpec,
}

impl Region {
    pub fn new(geometry: Geometry, grid: GridSpec) -> Self {
        Self { geometry, grid }
    }

    /// Rectangular region covering exactly the grid extent
    pub fn from_grid(grid: GridSpec) -> Self {
        let b = grid.bounds();
        Self::new(Geometry::rectangle(b.min_x, b.min_y, b.max_x, b.max_y), grid)
    }
}
