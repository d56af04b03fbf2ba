use std::path::Path;

use crate::geometry::{Feature, FeatureCollection, Geometry, Polygon};
use crate::raster::Raster;
use crate::types::{is_valid, PropertyValue, WaterMapError, WaterMapResult};

/// Class value of permanent water in a global surface-water transition raster
pub const PERMANENT_WATER_CLASS: f32 = 1.0;

/// Long-term water presence used to identify the water cluster
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRegion {
    features: FeatureCollection,
}

impl ReferenceRegion {
    pub fn from_features(features: FeatureCollection) -> Self {
        Self { features }
    }

    pub fn from_geometry(geometry: Geometry) -> Self {
        Self::from_features(FeatureCollection::new(vec![Feature::new(geometry)]))
    }

    /// Manually drawn polygon, the fallback when vectorization exceeds its pixel limit
    pub fn from_polygon(polygon: Polygon) -> Self {
        Self::from_geometry(Geometry::Polygon(polygon))
    }

    /// Load a JSON-serialized feature collection
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> WaterMapResult<Self> {
        log::info!("Reading reference region from: {}", path.as_ref().display());
        let text = std::fs::read_to_string(path.as_ref())?;
        let features: FeatureCollection = serde_json::from_str(&text)?;
        if features.is_empty() {
            return Err(WaterMapError::InvalidFormat(
                "Reference region contains no features".to_string(),
            ));
        }
        Ok(Self::from_features(features))
    }

    /// Vectorize the pixels of `band` equal to `class_value`.
    ///
    /// Each horizontal run of matching pixels in a row becomes one rectangle
    /// polygon. Fails with `OverPixelLimit` when more than `max_pixels` pixels
    /// match; callers then fall back to [`ReferenceRegion::from_polygon`].
    pub fn vectorize(
        raster: &Raster,
        band: &str,
        class_value: f32,
        max_pixels: usize,
    ) -> WaterMapResult<Self> {
        let data = raster.require_band(band)?;
        let is_class = |v: f32| is_valid(v) && (v - class_value).abs() < 1e-6;

        let pixels = data.iter().filter(|&&v| is_class(v)).count();
        if pixels > max_pixels {
            log::warn!(
                "Vectorization of class {} covers {} pixels (limit {})",
                class_value,
                pixels,
                max_pixels
            );
            return Err(WaterMapError::OverPixelLimit {
                pixels,
                limit: max_pixels,
            });
        }

        let t = raster.grid().transform;
        let mut features = Vec::new();
        for (row, line) in data.outer_iter().enumerate() {
            let mut col = 0;
            while col < line.len() {
                if !is_class(line[col]) {
                    col += 1;
                    continue;
                }
                let start = col;
                while col < line.len() && is_class(line[col]) {
                    col += 1;
                }
                let x0 = t.origin_x + start as f64 * t.pixel_width;
                let x1 = t.origin_x + col as f64 * t.pixel_width;
                let y0 = t.origin_y + row as f64 * t.pixel_height;
                let y1 = t.origin_y + (row + 1) as f64 * t.pixel_height;
                features.push(
                    Feature::new(Geometry::rectangle(x0, y0, x1, y1))
                        .with_property("class", PropertyValue::Number(class_value as f64)),
                );
            }
        }

        log::debug!("Vectorized {} pixels into {} polygons", pixels, features.len());
        Ok(Self::from_features(FeatureCollection::new(features)))
    }

    pub fn features(&self) -> &FeatureCollection {
        &self.features
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
