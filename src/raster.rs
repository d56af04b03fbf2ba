//! Masked multi-band raster
//!
//! Rasters are immutable values: every operation returns a new raster. Band
//! samples are `f32` and any non-finite sample is no-data.

use ndarray::{Array2, Zip};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::geometry::{Feature, FeatureCollection, Geometry};
use crate::types::{is_valid, BandValue, GridSpec, PropertyValue, WaterMapError, WaterMapResult, NO_DATA};

/// Named band of a raster
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub name: String,
    pub data: Array2<BandValue>,
}

/// Georeferenced grid with one or more named bands
#[derive(Debug, Clone)]
pub struct Raster {
    grid: GridSpec,
    bands: Vec<Band>,
}

impl Raster {
    /// Raster with no bands on the given grid
    pub fn new(grid: GridSpec) -> Self {
        Self {
            grid,
            bands: Vec::new(),
        }
    }

    /// Single-band raster from an array
    pub fn from_band(grid: GridSpec, name: impl Into<String>, data: Array2<BandValue>) -> WaterMapResult<Self> {
        Self::new(grid).with_band(name, data)
    }

    /// Single-band raster that is entirely no-data
    pub fn empty(grid: GridSpec, name: impl Into<String>) -> Self {
        Self {
            grid,
            bands: vec![Band {
                name: name.into(),
                data: Array2::from_elem(grid.shape(), NO_DATA),
            }],
        }
    }

    /// Return a copy with an extra band appended
    pub fn with_band(mut self, name: impl Into<String>, data: Array2<BandValue>) -> WaterMapResult<Self> {
        let name = name.into();
        if data.dim() != self.grid.shape() {
            return Err(WaterMapError::BandAlignment(format!(
                "Band {} has shape {:?}, grid is {:?}",
                name,
                data.dim(),
                self.grid.shape()
            )));
        }
        if self.band(&name).is_some() {
            return Err(WaterMapError::InvalidFormat(format!("Duplicate band name: {}", name)));
        }
        self.bands.push(Band { name, data });
        Ok(self)
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn shape(&self) -> (usize, usize) {
        self.grid.shape()
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn band(&self, name: &str) -> Option<&Array2<BandValue>> {
        self.bands.iter().find(|b| b.name == name).map(|b| &b.data)
    }

    /// Look up a band, failing with a descriptive error when absent
    pub fn require_band(&self, name: &str) -> WaterMapResult<&Array2<BandValue>> {
        self.band(name).ok_or_else(|| {
            WaterMapError::InvalidFormat(format!(
                "Band {} not found, available bands: {:?}",
                name,
                self.band_names()
            ))
        })
    }

    /// New raster holding only the named bands, in the given order
    pub fn select(&self, names: &[&str]) -> WaterMapResult<Raster> {
        let mut out = Raster::new(self.grid);
        for name in names {
            out = out.with_band(*name, self.require_band(name)?.clone())?;
        }
        Ok(out)
    }

    /// Stack the bands of `other` after the bands of `self`. Grids must align.
    pub fn add_bands(&self, other: &Raster) -> WaterMapResult<Raster> {
        if !self.grid.aligned_with(&other.grid) {
            return Err(WaterMapError::BandAlignment(format!(
                "Cannot stack rasters on different grids: {:?} vs {:?}",
                self.grid, other.grid
            )));
        }
        let mut out = self.clone();
        for band in &other.bands {
            out = out.with_band(band.name.clone(), band.data.clone())?;
        }
        Ok(out)
    }

    /// Pixels where every band carries data
    pub fn valid_mask(&self) -> Array2<bool> {
        let mut mask = Array2::from_elem(self.shape(), !self.bands.is_empty());
        for band in &self.bands {
            mask.zip_mut_with(&band.data, |m, &v| *m &= is_valid(v));
        }
        mask
    }

    /// Number of pixels where every band carries data
    pub fn valid_count(&self) -> usize {
        self.valid_mask().iter().filter(|&&v| v).count()
    }

    /// Set every band to no-data where `keep` is false
    pub fn update_mask(&self, keep: &Array2<bool>) -> WaterMapResult<Raster> {
        if keep.dim() != self.shape() {
            return Err(WaterMapError::BandAlignment(format!(
                "Mask shape {:?} does not match raster shape {:?}",
                keep.dim(),
                self.shape()
            )));
        }
        let mut out = self.clone();
        for band in out.bands.iter_mut() {
            Zip::from(&mut band.data).and(keep).for_each(|v, &k| {
                if !k {
                    *v = NO_DATA;
                }
            });
        }
        Ok(out)
    }

    /// No-data outside the geometry, same grid
    pub fn clip(&self, geometry: &Geometry) -> Raster {
        let keep = geometry.coverage_mask(&self.grid);
        let mut out = self.clone();
        for band in out.bands.iter_mut() {
            Zip::from(&mut band.data).and(&keep).for_each(|v, &k| {
                if !k {
                    *v = NO_DATA;
                }
            });
        }
        out
    }

    /// Fill no-data samples from the same-named bands of `fill`.
    ///
    /// Samples that already carry data are never replaced.
    pub fn unmask_from(&self, fill: &Raster) -> WaterMapResult<Raster> {
        if !self.grid.aligned_with(&fill.grid) {
            return Err(WaterMapError::BandAlignment(
                "Gap-fill source is on a different grid".to_string(),
            ));
        }
        let mut out = self.clone();
        for band in out.bands.iter_mut() {
            let source = fill.require_band(&band.name)?;
            Zip::from(&mut band.data).and(source).for_each(|v, &s| {
                if !is_valid(*v) && is_valid(s) {
                    *v = s;
                }
            });
        }
        Ok(out)
    }

    /// Band values at a pixel, `None` when any band is no-data
    pub fn pixel_values(&self, row: usize, col: usize) -> Option<Vec<BandValue>> {
        self.bands
            .iter()
            .map(|b| b.data.get((row, col)).copied().filter(|v| is_valid(*v)))
            .collect()
    }

    /// Sample fully valid pixels inside `region` as point features.
    ///
    /// At most `max_points` pixels are drawn uniformly without replacement
    /// using a seeded RNG; the result is in row-major order, and each
    /// feature carries one numeric property per band.
    pub fn sample(&self, region: &Geometry, max_points: usize, seed: u64) -> FeatureCollection {
        self.sample_mask(region.coverage_mask(&self.grid), max_points, seed)
    }

    /// Like [`Raster::sample`], over the union of a collection's geometries
    pub fn sample_collection(&self, region: &FeatureCollection, max_points: usize, seed: u64) -> FeatureCollection {
        self.sample_mask(region.coverage_mask(&self.grid), max_points, seed)
    }

    fn sample_mask(&self, mut candidates: Array2<bool>, max_points: usize, seed: u64) -> FeatureCollection {
        candidates.zip_mut_with(&self.valid_mask(), |c, &v| *c &= v);
        let mut pixels: Vec<(usize, usize)> = candidates
            .indexed_iter()
            .filter_map(|(idx, &c)| c.then_some(idx))
            .collect();

        if pixels.len() > max_points {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut picked = rand::seq::index::sample(&mut rng, pixels.len(), max_points).into_vec();
            picked.sort_unstable();
            pixels = picked.into_iter().map(|i| pixels[i]).collect();
        }

        let features = pixels
            .into_iter()
            .map(|(row, col)| {
                let (x, y) = self.grid.pixel_center(row, col);
                self.bands.iter().fold(Feature::new(Geometry::Point((x, y))), |f, band| {
                    f.with_property(band.name.clone(), PropertyValue::Number(band.data[[row, col]] as f64))
                })
            })
            .collect();
        FeatureCollection::new(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoTransform;

    fn grid() -> GridSpec {
        GridSpec::new(GeoTransform::new(0.0, 40.0, 10.0, -10.0), 4, 4)
    }

    #[test]
    fn test_band_shape_checked() {
        let result = Raster::from_band(grid(), "VV", Array2::zeros((3, 4)));
        assert!(matches!(result, Err(WaterMapError::BandAlignment(_))));
    }

    #[test]
    fn test_unmask_never_overwrites() {
        let mut base = Array2::from_elem((4, 4), 1.0f32);
        base[[0, 0]] = NO_DATA;
        let base = Raster::from_band(grid(), "MNDWI", base).unwrap();

        let mut fill = Array2::from_elem((4, 4), 5.0f32);
        fill[[1, 1]] = NO_DATA;
        let fill = Raster::from_band(grid(), "MNDWI", fill).unwrap();

        let out = base.unmask_from(&fill).unwrap();
        let band = out.band("MNDWI").unwrap();
        assert_eq!(band[[0, 0]], 5.0);
        assert_eq!(band[[1, 1]], 1.0);
        assert_eq!(band[[3, 3]], 1.0);
    }

    #[test]
    fn test_add_bands_requires_alignment() {
        let a = Raster::empty(grid(), "VV");
        let other_grid = GridSpec::new(GeoTransform::new(0.0, 40.0, 20.0, -20.0), 4, 4);
        let b = Raster::empty(other_grid, "MNDWI");

        assert!(matches!(a.add_bands(&b), Err(WaterMapError::BandAlignment(_))));
        let same = Raster::empty(grid(), "MNDWI");
        assert_eq!(a.add_bands(&same).unwrap().band_names(), vec!["VV", "MNDWI"]);
    }

    #[test]
    fn test_valid_mask_spans_all_bands() {
        let mut vv = Array2::from_elem((4, 4), -10.0f32);
        vv[[2, 2]] = NO_DATA;
        let mut mndwi = Array2::from_elem((4, 4), 0.3f32);
        mndwi[[0, 3]] = f32::INFINITY;

        let raster = Raster::from_band(grid(), "VV", vv)
            .unwrap()
            .with_band("MNDWI", mndwi)
            .unwrap();

        assert_eq!(raster.valid_count(), 14);
        assert!(raster.pixel_values(2, 2).is_none());
        assert_eq!(raster.pixel_values(1, 1), Some(vec![-10.0, 0.3]));
    }

    #[test]
    fn test_sample_respects_cap_and_is_deterministic() {
        let data = Array2::from_shape_fn((4, 4), |(r, c)| (r * 4 + c) as f32);
        let raster = Raster::from_band(grid(), "VV", data).unwrap();
        let region = Geometry::rectangle(0.0, 0.0, 40.0, 40.0);

        let a = raster.sample(&region, 5, 7);
        let b = raster.sample(&region, 5, 7);
        assert_eq!(a.len(), 5);
        assert_eq!(a, b);

        let all = raster.sample(&region, 100, 7);
        assert_eq!(all.len(), 16);
        assert_eq!(all.features[3].number("VV"), Some(3.0));
    }

    #[test]
    fn test_clip_masks_outside() {
        let raster = Raster::from_band(grid(), "VV", Array2::from_elem((4, 4), 1.0)).unwrap();
        let clipped = raster.clip(&Geometry::rectangle(0.0, 20.0, 20.0, 40.0));
        assert_eq!(clipped.valid_count(), 4);
    }
}
