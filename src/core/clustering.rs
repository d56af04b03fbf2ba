//! Unsupervised clustering of the fused feature raster

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::core::kmeans::{ClusterModel, KMeans};
use crate::geometry::Geometry;
use crate::raster::Raster;
use crate::types::{is_valid, BandValue, WaterMapError, WaterMapResult, NO_DATA};

/// Band name of cluster label rasters
pub const CLUSTER_BAND: &str = "cluster";

/// Clustering parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringParams {
    /// Number of clusters k
    pub cluster_count: usize,
    /// Maximum number of training pixels
    pub training_sample_cap: usize,
    pub restarts: usize,
    /// Lloyd iteration cap per restart
    pub max_iterations: usize,
    pub seed: u64,
}

impl Default for ClusteringParams {
    fn default() -> Self {
        Self {
            cluster_count: 5,
            training_sample_cap: 1000,
            restarts: 10,
            max_iterations: 6,
            seed: 42,
        }
    }
}

/// Fits a k-means model on a bounded pixel sample
#[derive(Debug, Clone)]
pub struct ClusterTrainer {
    params: ClusteringParams,
}

impl ClusterTrainer {
    pub fn new(params: ClusteringParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ClusteringParams {
        &self.params
    }

    /// Train a `k`-cluster model on pixels of `fused` inside `region`.
    ///
    /// Fails with `InsufficientTrainingData` when fewer than `k` valid
    /// pixels are available.
    pub fn train(&self, fused: &Raster, region: &Geometry, k: usize) -> WaterMapResult<ClusterModel> {
        if k < 2 {
            return Err(WaterMapError::Config(format!("Cluster count must be at least 2, got {}", k)));
        }
        if fused.band_count() == 0 {
            return Err(WaterMapError::InvalidFormat("Cannot train on a raster without bands".to_string()));
        }

        let names: Vec<String> = fused.band_names().iter().map(|n| n.to_string()).collect();
        let training = fused.sample(region, self.params.training_sample_cap, self.params.seed);
        let samples = training
            .iter()
            .map(|feature| {
                names
                    .iter()
                    .map(|name| {
                        feature.number(name).ok_or_else(|| {
                            WaterMapError::Processing(format!("Training sample missing band {}", name))
                        })
                    })
                    .collect::<WaterMapResult<Vec<f64>>>()
            })
            .collect::<WaterMapResult<Vec<Vec<f64>>>>()?;

        log::info!(
            "Training {} clusters on {} samples (cap {}) over bands {:?}",
            k,
            samples.len(),
            self.params.training_sample_cap,
            names
        );
        if samples.len() < k {
            log::warn!("Only {} training samples for k={}", samples.len(), k);
        }

        KMeans::new(k, self.params.restarts, self.params.max_iterations, self.params.seed).fit(&samples, names)
    }
}

/// Per-pixel cluster ids in `[0, k)`, no-data where unclassified
#[derive(Debug, Clone)]
pub struct ClusterLabelRaster {
    raster: Raster,
    k: usize,
}

impl ClusterLabelRaster {
    pub fn k(&self) -> usize {
        self.k
    }

    /// Single-band raster named [`CLUSTER_BAND`]
    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn labels(&self) -> WaterMapResult<&Array2<BandValue>> {
        self.raster.require_band(CLUSTER_BAND)
    }

    pub fn label_at(&self, row: usize, col: usize) -> Option<u32> {
        self.raster
            .band(CLUSTER_BAND)
            .and_then(|b| b.get((row, col)).copied())
            .filter(|v| is_valid(*v))
            .map(|v| v as u32)
    }

    /// Labels shifted to `1..=k` with 0 for no-data, for display
    pub fn to_one_based(&self) -> WaterMapResult<Array2<u16>> {
        Ok(self
            .labels()?
            .map(|&v| if is_valid(v) { v as u16 + 1 } else { 0 }))
    }
}

/// Applies a trained model to every pixel of the fused raster
#[derive(Debug, Clone, Default)]
pub struct ClusterAssigner;

impl ClusterAssigner {
    pub fn new() -> Self {
        Self
    }

    /// Label every valid pixel inside `region` with its nearest cluster id.
    ///
    /// The raster must carry exactly the bands the model was trained on, in order.
    pub fn assign(&self, fused: &Raster, model: &ClusterModel, region: &Geometry) -> WaterMapResult<ClusterLabelRaster> {
        if fused.band_names() != model.feature_names() {
            return Err(WaterMapError::BandAlignment(format!(
                "Model expects bands {:?}, raster has {:?}",
                model.feature_names(),
                fused.band_names()
            )));
        }

        let layers: Vec<&Array2<BandValue>> = fused.bands().iter().map(|b| &b.data).collect();
        let inside = region.coverage_mask(fused.grid());
        let (rows, cols) = fused.shape();

        let label_row = |row: usize| -> Vec<BandValue> {
            let mut features = vec![0.0f64; layers.len()];
            (0..cols)
                .map(|col| {
                    if !inside[[row, col]] {
                        return NO_DATA;
                    }
                    for (f, layer) in features.iter_mut().zip(&layers) {
                        let v = layer[[row, col]];
                        if !is_valid(v) {
                            return NO_DATA;
                        }
                        *f = v as f64;
                    }
                    model.predict(&features) as BandValue
                })
                .collect()
        };

        #[cfg(feature = "parallel")]
        let data: Vec<BandValue> = {
            use rayon::prelude::*;
            (0..rows).into_par_iter().flat_map(label_row).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let data: Vec<BandValue> = (0..rows).flat_map(label_row).collect();

        let data = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| WaterMapError::Processing(format!("Failed to shape label raster: {}", e)))?;
        let labels = ClusterLabelRaster {
            raster: Raster::from_band(*fused.grid(), CLUSTER_BAND, data)?,
            k: model.k(),
        };

        log::info!(
            "Assigned {} of {} pixels to {} clusters",
            labels.raster.valid_count(),
            fused.grid().len(),
            labels.k
        );
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeoTransform, GridSpec};

    fn grid() -> GridSpec {
        GridSpec::new(GeoTransform::new(0.0, 100.0, 10.0, -10.0), 10, 10)
    }

    /// Left half water-like, right half land-like
    fn fused() -> Raster {
        let vv = Array2::from_shape_fn((10, 10), |(r, c)| {
            if c < 5 { -20.0 + r as f32 * 0.1 } else { -7.0 - r as f32 * 0.1 }
        });
        let mndwi = Array2::from_shape_fn((10, 10), |(_, c)| if c < 5 { 0.5 } else { -0.3 });
        Raster::from_band(grid(), "VV", vv).unwrap().with_band("MNDWI", mndwi).unwrap()
    }

    fn whole() -> Geometry {
        Geometry::rectangle(0.0, 0.0, 100.0, 100.0)
    }

    #[test]
    fn test_train_and_assign_separates_halves() {
        let model = ClusterTrainer::new(ClusteringParams::default()).train(&fused(), &whole(), 2).unwrap();
        let labels = ClusterAssigner::new().assign(&fused(), &model, &whole()).unwrap();

        assert_eq!(labels.k(), 2);
        let water = labels.label_at(3, 1).unwrap();
        let land = labels.label_at(3, 8).unwrap();
        assert_ne!(water, land);
        for r in 0..10 {
            assert_eq!(labels.label_at(r, 0), Some(water));
            assert_eq!(labels.label_at(r, 9), Some(land));
        }
    }

    #[test]
    fn test_labels_within_range_and_nodata_preserved() {
        let mut vv = fused().band("VV").unwrap().clone();
        vv[[4, 4]] = NO_DATA;
        let raster = Raster::from_band(grid(), "VV", vv)
            .unwrap()
            .with_band("MNDWI", fused().band("MNDWI").unwrap().clone())
            .unwrap();

        let model = ClusterTrainer::new(ClusteringParams::default()).train(&raster, &whole(), 5).unwrap();
        let labels = ClusterAssigner::new().assign(&raster, &model, &whole()).unwrap();

        assert!(labels.label_at(4, 4).is_none());
        let band = labels.labels().unwrap();
        assert!(band.iter().filter(|v| v.is_finite()).all(|&v| v >= 0.0 && v < 5.0 && v.fract() == 0.0));
        assert_eq!(labels.raster().valid_count(), 99);

        let one_based = labels.to_one_based().unwrap();
        assert_eq!(one_based[[4, 4]], 0);
        assert!(one_based.iter().filter(|&&v| v != 0).all(|&v| (1..=5).contains(&v)));
    }

    #[test]
    fn test_assign_clips_to_region() {
        let model = ClusterTrainer::new(ClusteringParams::default()).train(&fused(), &whole(), 2).unwrap();
        let half = Geometry::rectangle(0.0, 50.0, 100.0, 100.0);
        let labels = ClusterAssigner::new().assign(&fused(), &model, &half).unwrap();
        assert_eq!(labels.raster().valid_count(), 50);
        assert!(labels.label_at(8, 2).is_none());
    }

    #[test]
    fn test_exactly_k_training_pixels() {
        let region = Geometry::rectangle(0.0, 90.0, 30.0, 100.0);
        let model = ClusterTrainer::new(ClusteringParams::default()).train(&fused(), &region, 3).unwrap();
        assert_eq!(model.training_samples(), 3);

        let too_small = Geometry::rectangle(0.0, 90.0, 20.0, 100.0);
        let result = ClusterTrainer::new(ClusteringParams::default()).train(&fused(), &too_small, 3);
        assert!(matches!(
            result,
            Err(WaterMapError::InsufficientTrainingData { available: 2, required: 3 })
        ));
    }

    #[test]
    fn test_training_sample_cap() {
        let params = ClusteringParams {
            training_sample_cap: 20,
            ..Default::default()
        };
        let model = ClusterTrainer::new(params).train(&fused(), &whole(), 2).unwrap();
        assert_eq!(model.training_samples(), 20);
    }

    #[test]
    fn test_rejects_k_below_two() {
        let result = ClusterTrainer::new(ClusteringParams::default()).train(&fused(), &whole(), 1);
        assert!(matches!(result, Err(WaterMapError::Config(_))));
    }

    #[test]
    fn test_assign_rejects_band_mismatch() {
        let model = ClusterTrainer::new(ClusteringParams::default()).train(&fused(), &whole(), 2).unwrap();
        let swapped = fused().select(&["MNDWI", "VV"]).unwrap();
        let result = ClusterAssigner::new().assign(&swapped, &model, &whole());
        assert!(matches!(result, Err(WaterMapError::BandAlignment(_))));
    }
}
