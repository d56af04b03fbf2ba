use crate::raster::Raster;
use crate::types::{WaterMapError, WaterMapResult};

/// Stacks the radar and optical composites into the clustering feature raster
#[derive(Debug, Clone)]
pub struct FeatureFuser {
    radar_band: String,
    index_band: String,
}

impl FeatureFuser {
    pub fn new(radar_band: impl Into<String>, index_band: impl Into<String>) -> Self {
        Self {
            radar_band: radar_band.into(),
            index_band: index_band.into(),
        }
    }

    /// Feature band names in fused order
    pub fn band_names(&self) -> [&str; 2] {
        [&self.radar_band, &self.index_band]
    }

    /// Fuse the composites into one two-band raster.
    ///
    /// Both inputs must be single-band rasters carrying the configured band
    /// and sharing the same pixel grid; no resampling is done.
    pub fn fuse(&self, radar: &Raster, optical: &Raster) -> WaterMapResult<Raster> {
        for (raster, band) in [(radar, &self.radar_band), (optical, &self.index_band)] {
            if raster.band_names() != [band.as_str()] {
                return Err(WaterMapError::BandAlignment(format!(
                    "Expected single band {}, found {:?}",
                    band,
                    raster.band_names()
                )));
            }
        }
        if !radar.grid().aligned_with(optical.grid()) {
            return Err(WaterMapError::BandAlignment(format!(
                "Radar grid {:?} does not match optical grid {:?}",
                radar.grid(),
                optical.grid()
            )));
        }

        let fused = radar.add_bands(optical)?;
        log::debug!(
            "Fused {:?}: {} of {} pixels valid in all bands",
            fused.band_names(),
            fused.valid_count(),
            fused.grid().len()
        );
        Ok(fused)
    }
}
