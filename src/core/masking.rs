//! Valid-data masking for radar scenes: border-noise removal and morphological cleaning

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::geometry::Geometry;
use crate::types::{is_valid, BandValue, GridSpec, WaterMapError, WaterMapResult, NO_DATA};

/// Border-noise masking parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BorderNoiseParams {
    /// Footprint shrink distance in map units
    pub edge_buffer: f64,
    /// Final valid-mask erosion distance in map units
    pub erosion_buffer: f64,
    /// Backscatter mapped to byte 0 (dB)
    pub scale_min_db: f32,
    /// Backscatter mapped to byte 255 (dB)
    pub scale_max_db: f32,
    /// Quantized values at or below this level are low/no-signal
    pub noise_floor: u8,
    /// Signal components smaller than this are border-noise blobs
    pub min_blob_pixels: usize,
}

impl Default for BorderNoiseParams {
    fn default() -> Self {
        Self {
            edge_buffer: 5000.0,
            erosion_buffer: 20.0,
            scale_min_db: -25.0,
            scale_max_db: 5.0,
            noise_floor: 0,
            min_blob_pixels: 100,
        }
    }
}

/// Removes edge artifacts from individual radar scenes
#[derive(Debug, Clone)]
pub struct BorderNoiseMasker {
    params: BorderNoiseParams,
}

impl BorderNoiseMasker {
    pub fn new(params: BorderNoiseParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &BorderNoiseParams {
        &self.params
    }

    /// Mask border noise in one scene band.
    ///
    /// With a footprint, interior pixels (at least `edge_buffer` inside it)
    /// are kept from the original. In the border zone only signal pixels
    /// belonging to a large connected component survive, and pixels outside
    /// the footprint become no-data. Without a footprint there is no scene
    /// edge on the grid and only the erosion applies. Buffers are in the
    /// grid's map units.
    pub fn apply(
        &self,
        band: &Array2<BandValue>,
        grid: &GridSpec,
        footprint: Option<&Geometry>,
    ) -> WaterMapResult<Array2<BandValue>> {
        let valid = match footprint {
            Some(footprint) => self.border_mask(band, grid, footprint),
            None => band.map(|&v| is_valid(v)),
        };
        let valid = erode_by_distance(&valid, grid, self.params.erosion_buffer)?;
        Ok(Zip::from(band).and(&valid).map_collect(|&v, &k| if k { v } else { NO_DATA }))
    }

    /// Valid pixels after footprint shrink and border blob removal
    fn border_mask(&self, band: &Array2<BandValue>, grid: &GridSpec, footprint: &Geometry) -> Array2<bool> {
        let inside = footprint.coverage_mask(grid);
        let interior = interior_mask(grid, footprint, &inside, self.params.edge_buffer);

        let signal = band.map(|&v| {
            is_valid(v) && quantize(v, self.params.scale_min_db, self.params.scale_max_db) > self.params.noise_floor
        });
        let connected = remove_small_components(&signal, self.params.min_blob_pixels);

        let mut valid = Array2::from_elem(band.dim(), false);
        Zip::from(&mut valid)
            .and(band)
            .and(&inside)
            .and(&interior)
            .and(&connected)
            .for_each(|keep, &v, &inside, &interior, &connected| {
                *keep = is_valid(v) && inside && (interior || connected);
            });

        let border_dropped = Zip::from(&valid).and(band).and(&inside).fold(0usize, |n, &k, &v, &i| {
            n + usize::from(i && is_valid(v) && !k)
        });
        log::debug!("Border-noise masking dropped {} pixels", border_dropped);
        valid
    }
}

/// Byte quantization of a backscatter value over [min_db, max_db]
pub fn quantize(value: BandValue, min_db: f32, max_db: f32) -> u8 {
    let span = max_db - min_db;
    if !(span > 0.0) {
        return 0;
    }
    (((value - min_db) / span).clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Footprint pixels whose centre is at least `buffer` from every footprint edge
pub fn interior_mask(grid: &GridSpec, footprint: &Geometry, inside: &Array2<bool>, buffer: f64) -> Array2<bool> {
    let mut interior = inside.clone();
    if buffer <= 0.0 {
        return interior;
    }
    for ((row, col), keep) in interior.indexed_iter_mut() {
        if *keep {
            let (x, y) = grid.pixel_center(row, col);
            *keep = footprint.distance_to_boundary(x, y) >= buffer;
        }
    }
    interior
}

/// Label 8-connected components of true pixels.
///
/// Returns the label image (0 = background, components numbered from 1)
/// and the size of each component indexed by `label - 1`.
pub fn label_components(mask: &Array2<bool>) -> (Array2<u32>, Vec<usize>) {
    let (height, width) = mask.dim();
    let mut labels = Array2::<u32>::zeros((height, width));
    let mut sizes = Vec::new();
    let mut queue = VecDeque::new();

    for i in 0..height {
        for j in 0..width {
            if !mask[[i, j]] || labels[[i, j]] != 0 {
                continue;
            }
            let label = sizes.len() as u32 + 1;
            let mut size = 0usize;
            labels[[i, j]] = label;
            queue.push_back((i, j));

            while let Some((ci, cj)) = queue.pop_front() {
                size += 1;
                for di in -1i64..=1 {
                    for dj in -1i64..=1 {
                        let ni = ci as i64 + di;
                        let nj = cj as i64 + dj;
                        if ni < 0 || nj < 0 || ni >= height as i64 || nj >= width as i64 {
                            continue;
                        }
                        let (ni, nj) = (ni as usize, nj as usize);
                        if mask[[ni, nj]] && labels[[ni, nj]] == 0 {
                            labels[[ni, nj]] = label;
                            queue.push_back((ni, nj));
                        }
                    }
                }
            }
            sizes.push(size);
        }
    }

    (labels, sizes)
}

/// Keep only components with at least `min_size` pixels
pub fn remove_small_components(mask: &Array2<bool>, min_size: usize) -> Array2<bool> {
    let (labels, sizes) = label_components(mask);
    labels.map(|&l| l != 0 && sizes[(l - 1) as usize] >= min_size)
}

/// Largest erosion reach, in pixels along either axis
pub const MAX_EROSION_REACH: usize = 64;

/// Erode a valid mask: a pixel is dropped if any invalid pixel lies within
/// `distance` (pixel-centre Euclidean distance in map units). Pixels beyond
/// the grid edge do not erode. A distance reaching more than
/// [`MAX_EROSION_REACH`] pixels is a configuration error, usually a buffer
/// given in meters on a grid in degrees.
pub fn erode_by_distance(valid: &Array2<bool>, grid: &GridSpec, distance: f64) -> WaterMapResult<Array2<bool>> {
    let pw = grid.transform.pixel_width.abs();
    let ph = grid.transform.pixel_height.abs();
    if distance <= 0.0 || pw <= 0.0 || ph <= 0.0 {
        return Ok(valid.clone());
    }

    let reach_r = (distance / ph).floor();
    let reach_c = (distance / pw).floor();
    if reach_r > MAX_EROSION_REACH as f64 || reach_c > MAX_EROSION_REACH as f64 {
        return Err(WaterMapError::Config(format!(
            "Erosion buffer {} spans more than {} pixels of size {}x{}",
            distance, MAX_EROSION_REACH, pw, ph
        )));
    }
    let (reach_r, reach_c) = (reach_r as i64, reach_c as i64);
    let offsets: Vec<(i64, i64)> = (-reach_r..=reach_r)
        .flat_map(|dr| (-reach_c..=reach_c).map(move |dc| (dr, dc)))
        .filter(|&(dr, dc)| {
            (dr, dc) != (0, 0) && ((dr as f64 * ph).powi(2) + (dc as f64 * pw).powi(2)).sqrt() <= distance
        })
        .collect();
    if offsets.is_empty() {
        return Ok(valid.clone());
    }

    let (height, width) = valid.dim();
    let mut eroded = valid.clone();
    for ((i, j), keep) in eroded.indexed_iter_mut() {
        if !*keep {
            continue;
        }
        *keep = offsets.iter().all(|&(dr, dc)| {
            let ni = i as i64 + dr;
            let nj = j as i64 + dc;
            ni < 0 || nj < 0 || ni >= height as i64 || nj >= width as i64 || valid[[ni as usize, nj as usize]]
        });
    }
    Ok(eroded)
}
