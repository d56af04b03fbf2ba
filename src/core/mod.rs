//! Classification pipeline stages

pub mod compositing;
pub mod masking;
pub mod radar_composite;
pub mod optical_composite;
pub mod fusion;
pub mod kmeans;
pub mod clustering;
pub mod water_selection;
pub mod pipeline;

// Re-export main types
pub use compositing::{median, median_composite};
pub use masking::{BorderNoiseMasker, BorderNoiseParams};
pub use radar_composite::{RadarCompositeParams, RadarCompositor};
pub use optical_composite::{GapFillReport, OpticalCompositeParams, OpticalIndexCompositor, OpticalSensor};
pub use fusion::FeatureFuser;
pub use kmeans::{ClusterModel, KMeans};
pub use clustering::{ClusterAssigner, ClusterLabelRaster, ClusterTrainer, ClusteringParams};
pub use water_selection::{SelectionParams, WaterClusterSelector, WaterMask};
pub use pipeline::{ClassificationOutput, WaterClassifier};
