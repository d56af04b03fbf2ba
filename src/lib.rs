//! watermap: Surface-Water Classification from Radar and Optical Composites
//!
//! This library maps surface water on a target date by compositing radar
//! backscatter and an optical water index (MNDWI) over a date window,
//! gap-filling the optical signal from multi-year climatology, clustering the
//! fused raster with k-means, and picking the water cluster by majority vote
//! over a permanent-water reference region.
//!
//! Imagery comes from an [`ImageCatalog`] implementation; [`MemoryCatalog`]
//! serves scenes already resampled onto the analysis grid.

pub mod types;
pub mod geometry;
pub mod raster;
pub mod config;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    AcquisitionMode, BoundingBox, DateWindow, GeoTransform, GridSpec, Polarization, PropertyValue,
    WaterMapError, WaterMapResult, NO_DATA,
};
pub use geometry::{Feature, FeatureCollection, Geometry, Polygon, Region};
pub use raster::Raster;
pub use config::ClassifierConfig;
pub use io::{ImageCatalog, MemoryCatalog, ReferenceRegion, SceneImage};
pub use crate::core::{ClassificationOutput, WaterClassifier, WaterMask};
