use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::compositing::median_composite;
use crate::core::masking::{BorderNoiseMasker, BorderNoiseParams};
use crate::geometry::Region;
use crate::io::catalog::{CatalogQuery, ImageCatalog, SceneFilter};
use crate::raster::Raster;
use crate::types::{AcquisitionMode, DateWindow, Polarization, PropertyValue, WaterMapError, WaterMapResult};

/// Radar compositing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarCompositeParams {
    /// Catalog collection holding the radar scenes
    pub collection_id: String,
    /// Polarization band composited
    pub polarization: Polarization,
    /// Required instrument mode
    pub instrument_mode: AcquisitionMode,
    /// Required scene resolution in meters
    pub resolution_meters: f64,
    /// Half-width of the date window in days
    pub half_window_days: i64,
    pub border_noise: BorderNoiseParams,
}

impl Default for RadarCompositeParams {
    fn default() -> Self {
        Self {
            collection_id: "COPERNICUS/S1_GRD".to_string(),
            polarization: Polarization::VV,
            instrument_mode: AcquisitionMode::IW,
            resolution_meters: 10.0,
            half_window_days: 15,
            border_noise: BorderNoiseParams::default(),
        }
    }
}

/// Builds noise-masked median backscatter composites
pub struct RadarCompositor<'a, C: ImageCatalog + ?Sized> {
    catalog: &'a C,
    params: RadarCompositeParams,
    masker: BorderNoiseMasker,
}

impl<'a, C: ImageCatalog + ?Sized> RadarCompositor<'a, C> {
    pub fn new(catalog: &'a C, params: RadarCompositeParams) -> Self {
        let masker = BorderNoiseMasker::new(params.border_noise.clone());
        Self {
            catalog,
            params,
            masker,
        }
    }

    /// Name of the composite band
    pub fn band_name(&self) -> &'static str {
        self.params.polarization.band_name()
    }

    /// Scene property filters for polarization, instrument mode, and resolution
    pub fn filters(&self) -> Vec<SceneFilter> {
        vec![
            SceneFilter::list_contains("transmitterReceiverPolarisation", self.band_name()),
            SceneFilter::equals(
                "instrumentMode",
                PropertyValue::Text(self.params.instrument_mode.to_string()),
            ),
            SceneFilter::equals("resolution_meters", self.params.resolution_meters),
        ]
    }

    /// Median backscatter composite over `date ± half_window_days`.
    ///
    /// No matching scenes yields an all no-data composite.
    pub fn composite(&self, date: NaiveDate, region: &Region) -> WaterMapResult<Raster> {
        let window = DateWindow::new(date, self.params.half_window_days);
        let query = CatalogQuery::new(&self.params.collection_id, region.geometry.clone(), window)
            .with_filters(self.filters());
        let scenes = self.catalog.query(&query)?;

        log::info!(
            "Radar composite {} {}: {} scenes from {}",
            self.band_name(),
            window,
            scenes.len(),
            self.params.collection_id
        );
        if scenes.is_empty() {
            log::warn!("No radar scenes in {}, composite is all no-data", window);
        }

        let band = self.band_name();
        let masked = scenes
            .iter()
            .map(|scene| {
                if !scene.raster.grid().aligned_with(&region.grid) {
                    return Err(WaterMapError::BandAlignment(format!(
                        "Radar scene {} is not on the analysis grid",
                        scene.id
                    )));
                }
                let data = scene.raster.require_band(band)?;
                let cleaned = self.masker.apply(data, &region.grid, scene.footprint.as_ref())?;
                Raster::from_band(region.grid, band, cleaned)
            })
            .collect::<WaterMapResult<Vec<Raster>>>()?;

        median_composite(&masked, band, &region.grid)
    }
}
