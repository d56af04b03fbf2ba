//! Aggregate configuration for a classification run

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::clustering::ClusteringParams;
use crate::core::optical_composite::OpticalCompositeParams;
use crate::core::radar_composite::RadarCompositeParams;
use crate::core::water_selection::SelectionParams;
use crate::types::{WaterMapError, WaterMapResult};

/// Parameters of every pipeline stage. Missing JSON fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub radar: RadarCompositeParams,
    pub optical: OpticalCompositeParams,
    pub clustering: ClusteringParams,
    pub selection: SelectionParams,
}

impl ClassifierConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(text: &str) -> WaterMapResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> WaterMapResult<Self> {
        log::info!("Loading classifier config from: {}", path.as_ref().display());
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> WaterMapResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check ranges and cross-field constraints
    pub fn validate(&self) -> WaterMapResult<()> {
        let fail = |msg: String| Err(WaterMapError::Config(msg));

        if self.radar.half_window_days < 1 {
            return fail(format!("Radar half-window must be >= 1 day, got {}", self.radar.half_window_days));
        }
        if !(self.radar.resolution_meters > 0.0) {
            return fail(format!("Radar resolution must be positive, got {}", self.radar.resolution_meters));
        }
        let noise = &self.radar.border_noise;
        if noise.edge_buffer < 0.0 || noise.erosion_buffer < 0.0 {
            return fail("Border-noise buffers must not be negative".to_string());
        }
        if !(noise.scale_max_db > noise.scale_min_db) {
            return fail(format!(
                "Border-noise scale [{}, {}] dB is empty",
                noise.scale_min_db, noise.scale_max_db
            ));
        }

        let optical = &self.optical;
        if optical.sensors.is_empty() {
            return fail("At least one optical sensor is required".to_string());
        }
        if optical.half_window_days < 1 {
            return fail(format!("Optical half-window must be >= 1 day, got {}", optical.half_window_days));
        }
        if optical.fallback_half_window_days < optical.half_window_days {
            return fail(format!(
                "Fallback half-window ({}) is narrower than the primary ({})",
                optical.fallback_half_window_days, optical.half_window_days
            ));
        }
        if optical.climatology_years < 1 {
            return fail(format!("Climatology span must be >= 1 year, got {}", optical.climatology_years));
        }
        if !(1..=28).contains(&optical.climatology_anchor_day) {
            return fail(format!(
                "Climatology anchor day must lie in 1..=28, got {}",
                optical.climatology_anchor_day
            ));
        }
        for sensor in &optical.sensors {
            if sensor.cloud_bit > 31 || sensor.cloud_shadow_bit > 31 {
                return fail(format!("QA bits of sensor {} exceed 31", sensor.name));
            }
        }

        let clustering = &self.clustering;
        if clustering.cluster_count < 2 {
            return fail(format!("Cluster count must be >= 2, got {}", clustering.cluster_count));
        }
        if clustering.training_sample_cap < 1 {
            return fail("Training sample cap must be >= 1".to_string());
        }
        if clustering.restarts < 1 || clustering.max_iterations < 1 {
            return fail("K-means restarts and iterations must be >= 1".to_string());
        }
        if self.selection.sample_cap < 1 {
            return fail("Selection sample cap must be >= 1".to_string());
        }
        Ok(())
    }
}
