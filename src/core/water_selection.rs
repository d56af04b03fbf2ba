//! Picks the water cluster by majority vote over the permanent-water reference

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::clustering::{ClusterLabelRaster, CLUSTER_BAND};
use crate::io::reference::ReferenceRegion;
use crate::raster::Raster;
use crate::types::{is_valid, GridSpec, WaterMapError, WaterMapResult, NO_DATA};

/// Band name of water mask rasters
pub const WATER_BAND: &str = "water";

/// Water-cluster selection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionParams {
    /// Maximum number of reference pixels voting
    pub sample_cap: usize,
    pub seed: u64,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            sample_cap: 1000,
            seed: 42,
        }
    }
}

/// Binary water mask: 1.0 where the label is the water cluster, no-data elsewhere
#[derive(Debug, Clone)]
pub struct WaterMask {
    pub raster: Raster,
    /// Selected cluster id, `None` when nothing could be classified
    pub water_cluster: Option<u32>,
    /// Sampled reference votes per cluster id
    pub votes: BTreeMap<u32, usize>,
}

impl WaterMask {
    /// Mask with no water pixels and no selected cluster
    pub fn empty(grid: GridSpec) -> Self {
        Self {
            raster: Raster::empty(grid, WATER_BAND),
            water_cluster: None,
            votes: BTreeMap::new(),
        }
    }

    pub fn is_water(&self, row: usize, col: usize) -> bool {
        self.raster
            .band(WATER_BAND)
            .and_then(|b| b.get((row, col)).copied())
            .map_or(false, is_valid)
    }

    pub fn water_pixel_count(&self) -> usize {
        self.raster.valid_count()
    }
}

/// Cluster id with the most votes; ties go to the lowest id
pub fn majority_label(votes: &BTreeMap<u32, usize>) -> Option<u32> {
    votes
        .iter()
        .fold(None, |best: Option<(u32, usize)>, (&id, &count)| match best {
            Some((_, top)) if top >= count => best,
            _ => Some((id, count)),
        })
        .map(|(id, _)| id)
}

#[derive(Debug, Clone)]
pub struct WaterClusterSelector {
    params: SelectionParams,
}

impl WaterClusterSelector {
    pub fn new(params: SelectionParams) -> Self {
        Self { params }
    }

    /// Vote over labels sampled inside the reference region and mask the winner.
    ///
    /// Fails with `NoReferenceSamples` when the reference covers no labelled pixel.
    pub fn select(&self, labels: &ClusterLabelRaster, reference: &ReferenceRegion) -> WaterMapResult<WaterMask> {
        let samples = labels
            .raster()
            .sample_collection(reference.features(), self.params.sample_cap, self.params.seed);

        let mut votes = BTreeMap::new();
        for label in samples.iter().filter_map(|f| f.number(CLUSTER_BAND)) {
            *votes.entry(label as u32).or_insert(0usize) += 1;
        }
        let water = majority_label(&votes).ok_or(WaterMapError::NoReferenceSamples)?;

        log::info!(
            "Selected water cluster {} from {} reference samples, votes {:?}",
            water,
            samples.len(),
            votes
        );

        let mask = labels.labels()?.map(|&v| {
            if is_valid(v) && v as u32 == water {
                1.0
            } else {
                NO_DATA
            }
        });
        Ok(WaterMask {
            raster: Raster::from_band(*labels.raster().grid(), WATER_BAND, mask)?,
            water_cluster: Some(water),
            votes,
        })
    }
}
