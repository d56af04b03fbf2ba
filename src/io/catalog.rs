use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use crate::geometry::Geometry;
use crate::raster::Raster;
use crate::types::{BoundingBox, DateWindow, PropertyValue, WaterMapResult};

/// Property predicate applied to catalog scenes
#[derive(Debug, Clone, PartialEq)]
pub enum SceneFilter {
    /// Property equals the value (numbers compared with a small tolerance)
    Equals { property: String, value: PropertyValue },
    /// List property contains the text value
    ListContains { property: String, value: String },
}

impl SceneFilter {
    pub fn equals(property: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        SceneFilter::Equals {
            property: property.into(),
            value: value.into(),
        }
    }

    pub fn list_contains(property: impl Into<String>, value: impl Into<String>) -> Self {
        SceneFilter::ListContains {
            property: property.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, properties: &HashMap<String, PropertyValue>) -> bool {
        match self {
            SceneFilter::Equals { property, value } => match (properties.get(property), value) {
                (Some(PropertyValue::Number(a)), PropertyValue::Number(b)) => (a - b).abs() < 1e-9,
                (Some(actual), expected) => actual == expected,
                (None, _) => false,
            },
            SceneFilter::ListContains { property, value } => match properties.get(property) {
                Some(PropertyValue::TextList(items)) => items.iter().any(|i| i == value),
                Some(PropertyValue::Text(text)) => text == value,
                _ => false,
            },
        }
    }
}

/// Collection query: scenes of `collection` intersecting `region` within `window`
#[derive(Debug, Clone)]
pub struct CatalogQuery {
    pub collection: String,
    pub region: Geometry,
    pub window: DateWindow,
    pub filters: Vec<SceneFilter>,
}

impl CatalogQuery {
    pub fn new(collection: impl Into<String>, region: Geometry, window: DateWindow) -> Self {
        Self {
            collection: collection.into(),
            region,
            window,
            filters: Vec::new(),
        }
    }

    pub fn with_filters(mut self, filters: Vec<SceneFilter>) -> Self {
        self.filters = filters;
        self
    }

    /// Whether a scene satisfies the window, region, and every filter
    pub fn accepts(&self, scene: &SceneImage) -> bool {
        if !self.window.contains(scene.acquired) {
            return false;
        }
        let overlaps = match (self.region.bounds(), scene.extent()) {
            (Some(region), Some(footprint)) => region.intersects(&footprint),
            _ => false,
        };
        overlaps && self.filters.iter().all(|f| f.matches(&scene.properties))
    }
}

/// One acquisition delivered by the catalog, resampled onto the analysis grid
#[derive(Debug, Clone)]
pub struct SceneImage {
    pub id: String,
    pub acquired: NaiveDate,
    /// Acquisition footprint in map units. `None` when the scene edge is
    /// unknown or lies outside the analysis grid.
    pub footprint: Option<Geometry>,
    pub properties: HashMap<String, PropertyValue>,
    pub raster: Raster,
}

impl SceneImage {
    /// Scene without a known acquisition footprint
    pub fn new(id: impl Into<String>, acquired: NaiveDate, raster: Raster) -> Self {
        Self {
            id: id.into(),
            acquired,
            footprint: None,
            properties: HashMap::new(),
            raster,
        }
    }

    pub fn with_footprint(mut self, footprint: Geometry) -> Self {
        self.footprint = Some(footprint);
        self
    }

    /// Footprint bounds, or the raster extent when no footprint is known
    pub fn extent(&self) -> Option<BoundingBox> {
        match &self.footprint {
            Some(footprint) => footprint.bounds(),
            None => Some(self.raster.grid().bounds()),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

/// Access to satellite image collections.
///
/// Implementations may block on remote I/O. An empty result is a valid
/// answer, not an error.
pub trait ImageCatalog {
    fn query(&self, query: &CatalogQuery) -> WaterMapResult<Vec<SceneImage>>;
}

/// In-memory catalog keyed by collection id
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    collections: BTreeMap<String, Vec<SceneImage>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, collection: impl Into<String>, scene: SceneImage) {
        self.collections.entry(collection.into()).or_default().push(scene);
    }

    pub fn with_scene(mut self, collection: impl Into<String>, scene: SceneImage) -> Self {
        self.insert(collection, scene);
        self
    }

    /// Number of scenes stored for a collection
    pub fn scene_count(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, Vec::len)
    }
}

impl ImageCatalog for MemoryCatalog {
    fn query(&self, query: &CatalogQuery) -> WaterMapResult<Vec<SceneImage>> {
        let mut scenes: Vec<SceneImage> = self
            .collections
            .get(&query.collection)
            .map(|all| all.iter().filter(|s| query.accepts(s)).cloned().collect())
            .unwrap_or_default();
        scenes.sort_by(|a, b| a.acquired.cmp(&b.acquired).then_with(|| a.id.cmp(&b.id)));

        log::debug!(
            "Catalog query {} {} matched {} scenes",
            query.collection,
            query.window,
            scenes.len()
        );
        Ok(scenes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeoTransform, GridSpec};

    fn scene(id: &str, date: (i32, u32, u32)) -> SceneImage {
        let grid = GridSpec::new(GeoTransform::new(0.0, 100.0, 10.0, -10.0), 10, 10);
        let date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
        SceneImage::new(id, date, Raster::empty(grid, "VV"))
            .with_property("instrumentMode", "IW".into())
            .with_property(
                "transmitterReceiverPolarisation",
                PropertyValue::TextList(vec!["VV".into(), "VH".into()]),
            )
            .with_property("resolution_meters", 10.0.into())
    }

    #[test]
    fn test_filters() {
        let s = scene("a", (2016, 5, 10));
        assert!(SceneFilter::equals("instrumentMode", "IW").matches(&s.properties));
        assert!(!SceneFilter::equals("instrumentMode", "EW").matches(&s.properties));
        assert!(SceneFilter::equals("resolution_meters", 10.0).matches(&s.properties));
        assert!(SceneFilter::list_contains("transmitterReceiverPolarisation", "VH").matches(&s.properties));
        assert!(!SceneFilter::list_contains("transmitterReceiverPolarisation", "HH").matches(&s.properties));
        assert!(!SceneFilter::equals("missing", 1.0).matches(&s.properties));
    }

    #[test]
    fn test_memory_catalog_window_and_region() {
        let catalog = MemoryCatalog::new()
            .with_scene("S1", scene("late", (2016, 5, 20)))
            .with_scene("S1", scene("early", (2016, 5, 1)))
            .with_scene("S1", scene("outside", (2016, 7, 1)))
            .with_scene("OTHER", scene("other", (2016, 5, 15)));

        let center = NaiveDate::from_ymd_opt(2016, 5, 15).unwrap();
        let query = CatalogQuery::new("S1", Geometry::rectangle(10.0, 10.0, 50.0, 50.0), DateWindow::new(center, 15));
        let ids: Vec<String> = catalog.query(&query).unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["early", "late"]);

        let far = CatalogQuery::new("S1", Geometry::rectangle(500.0, 500.0, 600.0, 600.0), DateWindow::new(center, 15));
        assert!(catalog.query(&far).unwrap().is_empty());

        let unknown = CatalogQuery::new("NONE", Geometry::rectangle(10.0, 10.0, 50.0, 50.0), DateWindow::new(center, 15));
        assert!(catalog.query(&unknown).unwrap().is_empty());
        assert_eq!(catalog.scene_count("S1"), 3);
        assert_eq!(catalog.scene_count("NONE"), 0);
    }

    #[test]
    fn test_footprint_bounds_region_match() {
        // Raster covers the query region but the acquisition footprint does not
        let clipped = scene("clipped", (2016, 5, 10)).with_footprint(Geometry::rectangle(60.0, 0.0, 100.0, 100.0));
        assert_eq!(clipped.extent(), Some(BoundingBox::new(60.0, 0.0, 100.0, 100.0)));
        let open = scene("open", (2016, 5, 10));
        assert_eq!(open.extent(), Some(BoundingBox::new(0.0, 0.0, 100.0, 100.0)));

        let catalog = MemoryCatalog::new().with_scene("S1", clipped).with_scene("S1", open);
        let center = NaiveDate::from_ymd_opt(2016, 5, 15).unwrap();
        let query = CatalogQuery::new("S1", Geometry::rectangle(10.0, 10.0, 50.0, 50.0), DateWindow::new(center, 15));
        let ids: Vec<String> = catalog.query(&query).unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["open"]);
    }
}
