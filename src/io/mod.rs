//! Boundaries to external collaborators: image catalogs and the permanent-water reference

pub mod catalog;
pub mod reference;

pub use catalog::{CatalogQuery, ImageCatalog, MemoryCatalog, SceneFilter, SceneImage};
pub use reference::{ReferenceRegion, PERMANENT_WATER_CLASS};
