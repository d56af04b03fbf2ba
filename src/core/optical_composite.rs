//! Cloud-masked optical water-index composites with two-pass climatology gap-fill
//!
//! The direct composite over the primary window is filled, in order, from:
//! 1. the median of same-month composites over the preceding years (primary window),
//! 2. the direct composite over the wide fallback window,
//! 3. the median of same-month composites over the preceding years (wide window).
//!
//! Each source only fills pixels still no-data after the previous step.

use chrono::{Datelike, NaiveDate};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::core::compositing::median_composite;
use crate::geometry::Region;
use crate::io::catalog::{CatalogQuery, ImageCatalog, SceneImage};
use crate::raster::Raster;
use crate::types::{is_valid, BandValue, DateWindow, WaterMapError, WaterMapResult, NO_DATA};

/// Band layout of one optical sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticalSensor {
    pub name: String,
    pub collection_id: String,
    /// Green band (index numerator)
    pub green_band: String,
    /// Shortwave-infrared band (index subtrahend)
    pub swir_band: String,
    /// Bit-packed quality band
    pub qa_band: String,
    pub cloud_shadow_bit: u8,
    pub cloud_bit: u8,
}

impl OpticalSensor {
    /// Landsat 8 OLI surface reflectance
    pub fn landsat8_sr() -> Self {
        Self {
            name: "Landsat 8".to_string(),
            collection_id: "LANDSAT/LC08/C01/T1_SR".to_string(),
            green_band: "B3".to_string(),
            swir_band: "B6".to_string(),
            qa_band: "pixel_qa".to_string(),
            cloud_shadow_bit: 3,
            cloud_bit: 5,
        }
    }

    /// Landsat 7 ETM+ surface reflectance
    pub fn landsat7_sr() -> Self {
        Self {
            name: "Landsat 7".to_string(),
            collection_id: "LANDSAT/LE07/C01/T1_SR".to_string(),
            green_band: "B2".to_string(),
            swir_band: "B5".to_string(),
            qa_band: "pixel_qa".to_string(),
            cloud_shadow_bit: 3,
            cloud_bit: 5,
        }
    }

    /// Both the cloud-shadow and the cloud bit must be clear
    pub fn is_clear(&self, qa: BandValue) -> bool {
        if !is_valid(qa) || qa < 0.0 {
            return false;
        }
        let bits = qa as u32;
        let flag = |bit: u8| 1u32.checked_shl(bit as u32).unwrap_or(0);
        let flags = flag(self.cloud_shadow_bit) | flag(self.cloud_bit);
        bits & flags == 0
    }

    /// Cloud-masked normalized-difference water index for one scene
    pub fn water_index(&self, scene: &SceneImage, band_name: &str) -> WaterMapResult<Raster> {
        let raster = &scene.raster;
        let green = raster.require_band(&self.green_band)?;
        let swir = raster.require_band(&self.swir_band)?;
        let qa = raster.require_band(&self.qa_band)?;

        let mut index = Array2::from_elem(raster.shape(), NO_DATA);
        Zip::from(&mut index)
            .and(green)
            .and(swir)
            .and(qa)
            .for_each(|out, &g, &s, &q| {
                if self.is_clear(q) {
                    *out = normalized_difference(g, s);
                }
            });
        Raster::from_band(*raster.grid(), band_name, index)
    }
}

/// `(a - b) / (a + b)`, no-data when either input is no-data or the sum is zero
pub fn normalized_difference(a: BandValue, b: BandValue) -> BandValue {
    if !is_valid(a) || !is_valid(b) {
        return NO_DATA;
    }
    let sum = a + b;
    if sum.abs() < 1e-10 {
        return NO_DATA;
    }
    (a - b) / sum
}

/// Optical compositing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpticalCompositeParams {
    pub sensors: Vec<OpticalSensor>,
    /// Output band name
    pub index_band: String,
    /// Primary half-window in days
    pub half_window_days: i64,
    /// Fallback half-window in days
    pub fallback_half_window_days: i64,
    /// Number of preceding years in the climatology ensemble
    pub climatology_years: i32,
    /// Day of month the climatology windows are centred on
    pub climatology_anchor_day: u32,
}

impl Default for OpticalCompositeParams {
    fn default() -> Self {
        Self {
            sensors: vec![OpticalSensor::landsat8_sr(), OpticalSensor::landsat7_sr()],
            index_band: "MNDWI".to_string(),
            half_window_days: 15,
            fallback_half_window_days: 45,
            climatology_years: 10,
            climatology_anchor_day: 15,
        }
    }
}

/// Pixel counts per gap-fill stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GapFillReport {
    pub total_pixels: usize,
    pub direct_valid: usize,
    pub filled_by_climatology: usize,
    pub filled_by_fallback: usize,
    pub filled_by_fallback_climatology: usize,
    pub remaining_nodata: usize,
}

/// Builds the gap-filled optical water-index composite
pub struct OpticalIndexCompositor<'a, C: ImageCatalog + ?Sized> {
    catalog: &'a C,
    params: OpticalCompositeParams,
}

impl<'a, C: ImageCatalog + ?Sized> OpticalIndexCompositor<'a, C> {
    pub fn new(catalog: &'a C, params: OpticalCompositeParams) -> Self {
        Self { catalog, params }
    }

    pub fn band_name(&self) -> &str {
        &self.params.index_band
    }

    /// Median index composite of every sensor over `date ± half_window_days`
    pub fn direct_composite(&self, date: NaiveDate, region: &Region, half_window_days: i64) -> WaterMapResult<Raster> {
        let window = DateWindow::new(date, half_window_days);
        let mut stack = Vec::new();

        for sensor in &self.params.sensors {
            let query = CatalogQuery::new(&sensor.collection_id, region.geometry.clone(), window);
            let scenes = self.catalog.query(&query)?;
            log::debug!("{} {}: {} scenes", sensor.name, window, scenes.len());

            for scene in &scenes {
                if !scene.raster.grid().aligned_with(&region.grid) {
                    return Err(WaterMapError::BandAlignment(format!(
                        "Optical scene {} is not on the analysis grid",
                        scene.id
                    )));
                }
                stack.push(sensor.water_index(scene, self.band_name())?);
            }
        }

        median_composite(&stack, self.band_name(), &region.grid)
    }

    /// Centre dates of the climatology ensemble: the anchor day of the target
    /// month in each of the preceding `climatology_years` years
    pub fn climatology_dates(&self, date: NaiveDate) -> WaterMapResult<Vec<NaiveDate>> {
        let years = self.params.climatology_years;
        (date.year() - years..date.year())
            .map(|year| {
                NaiveDate::from_ymd_opt(year, date.month(), self.params.climatology_anchor_day).ok_or_else(|| {
                    WaterMapError::Config(format!(
                        "Invalid climatology anchor day {} for {}-{:02}",
                        self.params.climatology_anchor_day,
                        year,
                        date.month()
                    ))
                })
            })
            .collect()
    }

    /// Median over the historical same-month composites at the given window width
    pub fn climatology_composite(&self, date: NaiveDate, region: &Region, half_window_days: i64) -> WaterMapResult<Raster> {
        let ensemble = self
            .climatology_dates(date)?
            .into_iter()
            .map(|center| self.direct_composite(center, region, half_window_days))
            .collect::<WaterMapResult<Vec<Raster>>>()?;
        median_composite(&ensemble, self.band_name(), &region.grid)
    }

    /// Gap-filled composite for `date`, with per-stage fill counts
    pub fn composite(&self, date: NaiveDate, region: &Region) -> WaterMapResult<(Raster, GapFillReport)> {
        let primary = self.params.half_window_days;
        let fallback = self.params.fallback_half_window_days;

        let direct = self.direct_composite(date, region, primary)?;
        let mut report = GapFillReport {
            total_pixels: region.grid.len(),
            direct_valid: direct.valid_count(),
            ..Default::default()
        };
        log::info!(
            "Optical composite ±{} days: {}/{} pixels valid",
            primary,
            report.direct_valid,
            report.total_pixels
        );

        let mut filled = direct;
        let mut valid = report.direct_valid;

        let passes: [(i64, bool, &mut usize); 3] = [
            (primary, true, &mut report.filled_by_climatology),
            (fallback, false, &mut report.filled_by_fallback),
            (fallback, true, &mut report.filled_by_fallback_climatology),
        ];
        for (half_window, climatology, counter) in passes {
            if valid == region.grid.len() {
                break;
            }
            let source = if climatology {
                self.climatology_composite(date, region, half_window)?
            } else {
                self.direct_composite(date, region, half_window)?
            };
            filled = filled.unmask_from(&source)?;
            let now_valid = filled.valid_count();
            *counter = now_valid - valid;
            valid = now_valid;
            log::debug!(
                "Gap-fill from {} ±{} days filled {} pixels",
                if climatology { "climatology" } else { "direct composite" },
                half_window,
                *counter
            );
        }

        report.remaining_nodata = report.total_pixels - valid;
        if report.remaining_nodata > 0 {
            log::warn!("{} optical pixels remain no-data after gap-fill", report.remaining_nodata);
        }
        Ok((filled, report))
    }
}
