//! Synthetic lake scene shared by the integration tests.
//!
//! A 40x40 grid of 10 m pixels; the lake is the square (100,100)-(300,300),
//! i.e. rows and columns 10..30. Land backscatter and MNDWI vary smoothly so
//! the land forms a spread of clusters while the lake stays compact.

#![allow(dead_code)]

use chrono::NaiveDate;
use ndarray::Array2;
use watermap::{
    GeoTransform, Geometry, GridSpec, MemoryCatalog, Polygon, PropertyValue, Raster, ReferenceRegion,
    Region, SceneImage,
};

pub const SIZE: usize = 40;
pub const PIXEL: f64 = 10.0;
pub const RADAR: &str = "COPERNICUS/S1_GRD";
pub const LANDSAT8: &str = "LANDSAT/LC08/C01/T1_SR";
pub const LANDSAT7: &str = "LANDSAT/LE07/C01/T1_SR";

/// QA value with the cloud bit set
pub const CLOUDY: f32 = 32.0;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn grid() -> GridSpec {
    GridSpec::new(GeoTransform::new(0.0, SIZE as f64 * PIXEL, PIXEL, -PIXEL), SIZE, SIZE)
}

pub fn region() -> Region {
    Region::new(Geometry::rectangle(0.0, 0.0, 400.0, 400.0), grid())
}

pub fn is_lake(row: usize, col: usize) -> bool {
    (10..30).contains(&row) && (10..30).contains(&col)
}

pub fn lake_reference() -> ReferenceRegion {
    ReferenceRegion::from_polygon(Polygon::rectangle(150.0, 150.0, 250.0, 250.0))
}

/// VV backscatter in dB
pub fn backscatter(row: usize, col: usize) -> f32 {
    backscatter_with_lake(row, col, -20.0)
}

/// VV backscatter with the lake surface at `lake_db`
pub fn backscatter_with_lake(row: usize, col: usize, lake_db: f32) -> f32 {
    if is_lake(row, col) {
        lake_db + ((row + col) % 3) as f32 * 0.01
    } else {
        -16.0 + (row as f32 / SIZE as f32) * 10.0 + (col % 7) as f32
    }
}

/// SWIR reflectance for a green reflectance of 0.08
pub fn swir(row: usize, col: usize) -> f32 {
    if is_lake(row, col) {
        0.02
    } else {
        0.09 + (col as f32 / SIZE as f32) * 0.15
    }
}

pub fn radar_scene_with_lake(id: &str, acquired: NaiveDate, offset_db: f32, lake_db: f32) -> SceneImage {
    let vv = Array2::from_shape_fn((SIZE, SIZE), |(r, c)| backscatter_with_lake(r, c, lake_db) + offset_db);
    let vh = vv.map(|v| v - 7.0);
    let raster = Raster::from_band(grid(), "VV", vv).unwrap().with_band("VH", vh).unwrap();
    SceneImage::new(id, acquired, raster)
        .with_property(
            "transmitterReceiverPolarisation",
            PropertyValue::TextList(vec!["VV".to_string(), "VH".to_string()]),
        )
        .with_property("instrumentMode", "IW".into())
        .with_property("resolution_meters", 10.0.into())
}

pub fn landsat_scene(id: &str, acquired: NaiveDate, green: &str, swir_band: &str, qa: Array2<f32>) -> SceneImage {
    let raster = Raster::from_band(grid(), green, Array2::from_elem((SIZE, SIZE), 0.08))
        .unwrap()
        .with_band(swir_band, Array2::from_shape_fn((SIZE, SIZE), |(r, c)| swir(r, c)))
        .unwrap()
        .with_band("pixel_qa", qa)
        .unwrap();
    SceneImage::new(id, acquired, raster)
}

/// QA band that is cloudy in rows 0..5, columns 30..40
pub fn cloudy_corner_qa() -> Array2<f32> {
    Array2::from_shape_fn((SIZE, SIZE), |(r, c)| if r < 5 && c >= 30 { CLOUDY } else { 0.0 })
}

/// Catalog with three radar passes and two Landsat 8 scenes around 2016-05-15,
/// both cloudy over the same corner, and a clear Landsat 7 scene in May 2014
pub fn lake_catalog() -> MemoryCatalog {
    lake_catalog_with(-20.0)
}

/// Lake catalog with the lake backscatter at `lake_db`
pub fn lake_catalog_with(lake_db: f32) -> MemoryCatalog {
    MemoryCatalog::new()
        .with_scene(RADAR, radar_scene_with_lake("s1_a", date(2016, 5, 3), 0.0, lake_db))
        .with_scene(RADAR, radar_scene_with_lake("s1_b", date(2016, 5, 10), 0.02, lake_db))
        .with_scene(RADAR, radar_scene_with_lake("s1_c", date(2016, 5, 22), -0.02, lake_db))
        .with_scene(LANDSAT8, landsat_scene("l8_a", date(2016, 5, 8), "B3", "B6", cloudy_corner_qa()))
        .with_scene(LANDSAT8, landsat_scene("l8_b", date(2016, 5, 24), "B3", "B6", cloudy_corner_qa()))
        .with_scene(
            LANDSAT7,
            landsat_scene("l7_2014", date(2014, 5, 12), "B2", "B5", Array2::zeros((SIZE, SIZE))),
        )
}

/// Same optical data, no radar
pub fn catalog_without_radar() -> MemoryCatalog {
    MemoryCatalog::new()
        .with_scene(LANDSAT8, landsat_scene("l8_a", date(2016, 5, 8), "B3", "B6", Array2::zeros((SIZE, SIZE))))
}
