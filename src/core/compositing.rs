//! Temporal compositing by per-pixel median reduction

use ndarray::Array2;

use crate::raster::Raster;
use crate::types::{is_valid, BandValue, GridSpec, WaterMapError, WaterMapResult, NO_DATA};

/// Median of the valid values, ignoring no-data. Even counts average the two middle values.
pub fn median(values: &mut Vec<BandValue>) -> Option<BandValue> {
    values.retain(|v| is_valid(*v));
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

/// Reduce a stack of rasters to one band by per-pixel median.
///
/// A pixel is no-data in the output only if it is no-data in every input.
/// An empty stack yields an entirely no-data raster on `grid`.
pub fn median_composite(stack: &[Raster], band: &str, grid: &GridSpec) -> WaterMapResult<Raster> {
    if stack.is_empty() {
        log::debug!("Empty stack for band {}, composite is all no-data", band);
        return Ok(Raster::empty(*grid, band));
    }

    let layers = stack
        .iter()
        .map(|r| {
            if !r.grid().aligned_with(grid) {
                return Err(WaterMapError::BandAlignment(format!(
                    "Composite input for band {} is not on the analysis grid",
                    band
                )));
            }
            r.require_band(band)
        })
        .collect::<WaterMapResult<Vec<&Array2<BandValue>>>>()?;

    let (rows, cols) = grid.shape();
    let reduce_row = |row: usize| -> Vec<BandValue> {
        let mut scratch = Vec::with_capacity(layers.len());
        (0..cols)
            .map(|col| {
                scratch.clear();
                scratch.extend(layers.iter().map(|l| l[[row, col]]));
                median(&mut scratch).unwrap_or(NO_DATA)
            })
            .collect()
    };

    #[cfg(feature = "parallel")]
    let data: Vec<BandValue> = {
        use rayon::prelude::*;
        (0..rows).into_par_iter().flat_map(reduce_row).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let data: Vec<BandValue> = (0..rows).flat_map(reduce_row).collect();

    let data = Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| WaterMapError::Processing(format!("Failed to shape composite: {}", e)))?;
    Raster::from_band(*grid, band, data)
}
