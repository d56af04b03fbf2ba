//! End-to-end water classification for one date and region

use chrono::NaiveDate;
use ndarray::Array2;

use crate::config::ClassifierConfig;
use crate::core::clustering::{ClusterAssigner, ClusterLabelRaster, ClusterTrainer};
use crate::core::fusion::FeatureFuser;
use crate::core::optical_composite::{GapFillReport, OpticalIndexCompositor};
use crate::core::radar_composite::RadarCompositor;
use crate::core::water_selection::{WaterClusterSelector, WaterMask};
use crate::geometry::Region;
use crate::io::catalog::ImageCatalog;
use crate::io::reference::ReferenceRegion;
use crate::raster::Raster;
use crate::types::WaterMapResult;

/// Water mask plus the intermediate rasters of the run
#[derive(Debug, Clone)]
pub struct ClassificationOutput {
    pub water_mask: WaterMask,
    pub radar_composite: Raster,
    pub optical_composite: Raster,
    pub gap_fill: GapFillReport,
    pub fused: Raster,
    /// `None` when the run had no valid fused pixels
    pub labels: Option<ClusterLabelRaster>,
    /// Labels as `1..=k`, 0 for no-data
    pub labels_one_based: Option<Array2<u16>>,
}

/// Runs compositing, fusion, clustering and water selection against a catalog
pub struct WaterClassifier<'a, C: ImageCatalog + ?Sized> {
    catalog: &'a C,
    config: ClassifierConfig,
}

impl<'a, C: ImageCatalog + ?Sized> WaterClassifier<'a, C> {
    /// Create a classifier; the configuration is validated up front
    pub fn new(catalog: &'a C, config: ClassifierConfig) -> WaterMapResult<Self> {
        config.validate()?;
        Ok(Self { catalog, config })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify with the configured cluster count, returning only the mask
    pub fn classify(&self, date: NaiveDate, region: &Region, reference: &ReferenceRegion) -> WaterMapResult<WaterMask> {
        self.classify_water(date, region, self.config.clustering.cluster_count, reference)
    }

    /// Classify with the configured cluster count, keeping every intermediate raster
    pub fn classify_detailed(
        &self,
        date: NaiveDate,
        region: &Region,
        reference: &ReferenceRegion,
    ) -> WaterMapResult<ClassificationOutput> {
        self.classify_water_detailed(date, region, self.config.clustering.cluster_count, reference)
    }

    /// Classify surface water with an explicit cluster count, returning only the mask
    pub fn classify_water(
        &self,
        date: NaiveDate,
        region: &Region,
        cluster_count: usize,
        reference: &ReferenceRegion,
    ) -> WaterMapResult<WaterMask> {
        Ok(self.classify_water_detailed(date, region, cluster_count, reference)?.water_mask)
    }

    /// Classify surface water, keeping every intermediate raster.
    ///
    /// When no pixel in the region has both radar and optical data the mask
    /// is returned entirely no-data with no selected cluster.
    pub fn classify_water_detailed(
        &self,
        date: NaiveDate,
        region: &Region,
        cluster_count: usize,
        reference: &ReferenceRegion,
    ) -> WaterMapResult<ClassificationOutput> {
        log::info!(
            "🌊 Classifying water for {} on a {}x{} grid with k={}",
            date,
            region.grid.rows,
            region.grid.cols,
            cluster_count
        );

        let radar = RadarCompositor::new(self.catalog, self.config.radar.clone());
        let radar_composite = radar.composite(date, region)?;

        let optical = OpticalIndexCompositor::new(self.catalog, self.config.optical.clone());
        let (optical_composite, gap_fill) = optical.composite(date, region)?;

        let fused = FeatureFuser::new(radar.band_name(), optical.band_name()).fuse(&radar_composite, &optical_composite)?;

        let usable = fused.clip(&region.geometry).valid_count();
        if usable == 0 {
            log::warn!(
                "No pixel in the region has both {} and {} data for {}, water mask is all no-data",
                radar.band_name(),
                optical.band_name(),
                date
            );
            return Ok(ClassificationOutput {
                water_mask: WaterMask::empty(region.grid),
                radar_composite,
                optical_composite,
                gap_fill,
                fused,
                labels: None,
                labels_one_based: None,
            });
        }

        let model = ClusterTrainer::new(self.config.clustering.clone()).train(&fused, &region.geometry, cluster_count)?;
        let labels = ClusterAssigner::new().assign(&fused, &model, &region.geometry)?;
        let water_mask = WaterClusterSelector::new(self.config.selection.clone()).select(&labels, reference)?;

        log::info!(
            "✅ Water mask for {}: {} pixels in cluster {:?}",
            date,
            water_mask.water_pixel_count(),
            water_mask.water_cluster
        );

        let labels_one_based = labels.to_one_based()?;
        Ok(ClassificationOutput {
            water_mask,
            radar_composite,
            optical_composite,
            gap_fill,
            fused,
            labels: Some(labels),
            labels_one_based: Some(labels_one_based),
        })
    }
}
