mod common;

use std::io::Write;

use common::*;
use ndarray::Array2;
use watermap::io::PERMANENT_WATER_CLASS;
use watermap::{
    ClassifierConfig, FeatureCollection, Geometry, Polarization, Polygon, Raster, ReferenceRegion, Region,
    WaterClassifier, WaterMapError,
};

#[test]
fn test_config_from_file() {
    init_logging();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{
            "radar": {{ "polarization": "VV", "half_window_days": 12 }},
            "optical": {{ "climatology_years": 3 }},
            "clustering": {{ "cluster_count": 3, "training_sample_cap": 500 }},
            "selection": {{ "sample_cap": 200, "seed": 7 }}
        }}"#
    )
    .unwrap();

    let config = ClassifierConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.radar.polarization, Polarization::VV);
    assert_eq!(config.radar.half_window_days, 12);
    assert_eq!(config.optical.climatology_years, 3);
    assert_eq!(config.optical.fallback_half_window_days, 45);
    assert_eq!(config.clustering.cluster_count, 3);
    assert_eq!(config.selection.seed, 7);
}

#[test]
fn test_configured_cluster_count_drives_classification() {
    init_logging();
    let config = ClassifierConfig::from_json_str(r#"{ "clustering": { "cluster_count": 3 } }"#).unwrap();
    let catalog = lake_catalog();
    let classifier = WaterClassifier::new(&catalog, config).unwrap();

    let out = classifier
        .classify_detailed(date(2016, 5, 15), &region(), &lake_reference())
        .unwrap();
    let labels = out.labels.as_ref().unwrap();
    assert_eq!(labels.k(), 3);
    assert!(out.labels_one_based.as_ref().unwrap().iter().all(|&v| (1..=3).contains(&v)));
    assert_eq!(out.water_mask.water_pixel_count(), 400);

    let mask = classifier.classify(date(2016, 5, 15), &region(), &lake_reference()).unwrap();
    assert_eq!(mask.water_cluster, out.water_mask.water_cluster);
}

#[test]
fn test_missing_config_file() {
    let result = ClassifierConfig::from_json_file("/nonexistent/watermap.json");
    assert!(matches!(result, Err(WaterMapError::Io(_))));
}

#[test]
fn test_reference_from_file_drives_selection() {
    init_logging();
    let reference = FeatureCollection::new(vec![watermap::Feature::new(Geometry::rectangle(
        120.0, 120.0, 200.0, 200.0,
    ))]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("permanent_water.json");
    std::fs::write(&path, serde_json::to_string(&reference).unwrap()).unwrap();

    let reference = ReferenceRegion::from_json_file(&path).unwrap();
    let catalog = lake_catalog();
    let classifier = WaterClassifier::new(&catalog, ClassifierConfig::default()).unwrap();
    let mask = classifier
        .classify_water(date(2016, 5, 15), &region(), 5, &reference)
        .unwrap();
    assert!(mask.is_water(15, 15));
    assert!(!mask.is_water(5, 5));
}

#[test]
fn test_vectorize_with_manual_fallback() {
    init_logging();
    // Transition raster: class 1 (permanent) over the lake
    let transitions = Array2::from_shape_fn((SIZE, SIZE), |(r, c)| if is_lake(r, c) { 1.0 } else { 0.0 });
    let transitions = Raster::from_band(grid(), "transition", transitions).unwrap();

    let over = ReferenceRegion::vectorize(&transitions, "transition", PERMANENT_WATER_CLASS, 100);
    assert!(matches!(
        over,
        Err(WaterMapError::OverPixelLimit { pixels: 400, limit: 100 })
    ));
    let fallback = match over {
        Ok(reference) => reference,
        Err(_) => ReferenceRegion::from_polygon(Polygon::rectangle(150.0, 150.0, 250.0, 250.0)),
    };

    let vectorized = ReferenceRegion::vectorize(&transitions, "transition", PERMANENT_WATER_CLASS, 10_000).unwrap();
    assert_eq!(vectorized.features().len(), 20);

    let catalog = lake_catalog();
    let classifier = WaterClassifier::new(&catalog, ClassifierConfig::default()).unwrap();
    let a = classifier.classify_water(date(2016, 5, 15), &region(), 5, &fallback).unwrap();
    let b = classifier.classify_water(date(2016, 5, 15), &region(), 5, &vectorized).unwrap();
    assert_eq!(a.water_cluster, b.water_cluster);
    assert_eq!(a.water_pixel_count(), 400);
}

#[test]
fn test_training_region_with_exactly_k_pixels() {
    init_logging();
    let catalog = lake_catalog();
    let classifier = WaterClassifier::new(&catalog, ClassifierConfig::default()).unwrap();

    // Three pixels in the top row: (0, 0), (0, 1), (0, 2)
    let tiny = Region::new(Geometry::rectangle(0.0, 390.0, 30.0, 400.0), grid());
    let reference = ReferenceRegion::from_polygon(Polygon::rectangle(0.0, 390.0, 10.0, 400.0));

    let mask = classifier.classify_water(date(2016, 5, 15), &tiny, 3, &reference).unwrap();
    assert!(mask.is_water(0, 0));
    assert!(mask.water_pixel_count() >= 1 && mask.water_pixel_count() <= 3);

    let result = classifier.classify_water(date(2016, 5, 15), &tiny, 4, &reference);
    assert!(matches!(
        result,
        Err(WaterMapError::InsufficientTrainingData { available: 3, required: 4 })
    ));
}

#[test]
fn test_rejects_single_cluster() {
    let catalog = lake_catalog();
    let classifier = WaterClassifier::new(&catalog, ClassifierConfig::default()).unwrap();
    let result = classifier.classify_water(date(2016, 5, 15), &region(), 1, &lake_reference());
    assert!(matches!(result, Err(WaterMapError::Config(_))));
}
