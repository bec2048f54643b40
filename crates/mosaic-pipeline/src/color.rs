//! Cell color sampling.

use image::RgbaImage;

use crate::types::{CellColor, Point};
use crate::voronoi::Tessellation;

/// Colors for every cell plus how they were gathered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledColors {
    /// One color per cell, in seed order.
    pub colors: Vec<CellColor>,
    /// Number of pixels read.
    pub samples: u64,
    /// Cells that no sample landed in. They come out black.
    pub unsampled_cells: usize,
}

/// Read the pixel under each seed.
///
/// Seed coordinates are floored and clamped into the image, so a seed on
/// the right or bottom edge reads the last column or row.
#[must_use = "returns the sampled colors without side effects"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn sample_seed_colors(image: &RgbaImage, seeds_px: &[Point]) -> SampledColors {
    if image.width() == 0 || image.height() == 0 {
        return SampledColors {
            colors: vec![CellColor::new(0, 0, 0, 0); seeds_px.len()],
            samples: 0,
            unsampled_cells: seeds_px.len(),
        };
    }
    let max_x = image.width() - 1;
    let max_y = image.height() - 1;

    let colors: Vec<CellColor> = seeds_px
        .iter()
        .map(|p| {
            // `as` saturates: negatives and NaN map to 0.
            let x = (p.x.floor() as u32).min(max_x);
            let y = (p.y.floor() as u32).min(max_y);
            let [r, g, b, a] = image.get_pixel(x, y).0;
            CellColor::new(r, g, b, a)
        })
        .collect();
    SampledColors {
        samples: colors.len() as u64,
        colors,
        unsampled_cells: 0,
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ChannelSums {
    r: u64,
    g: u64,
    b: u64,
    a: u64,
    count: u64,
}

impl ChannelSums {
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn mean(self) -> CellColor {
        let n = self.count.max(1) as f64;
        let channel = |sum: u64| (sum as f64 / n).round().clamp(0.0, 255.0) as u8;
        CellColor::new(channel(self.r), channel(self.g), channel(self.b), channel(self.a))
    }
}

/// Average the pixels owned by each cell.
///
/// Pixels are visited on a grid with stride `max(1, round(1 / scale))`;
/// each visited pixel is assigned to the cell whose seed is nearest.
/// A cell that receives no samples is black with zero alpha.
#[must_use = "returns the sampled colors without side effects"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn cell_average_colors(
    image: &RgbaImage,
    tessellation: &Tessellation,
    scale: f64,
) -> SampledColors {
    let step = if scale.is_finite() && scale > 0.0 {
        ((1.0 / scale).round() as usize).max(1)
    } else {
        1
    };

    let mut sums = vec![ChannelSums::default(); tessellation.len()];
    let mut samples = 0_u64;
    for y in (0..image.height()).step_by(step) {
        for x in (0..image.width()).step_by(step) {
            let Some(cell) = tessellation.locate(f64::from(x), f64::from(y)) else {
                continue;
            };
            let Some(acc) = sums.get_mut(cell) else {
                continue;
            };
            let [r, g, b, a] = image.get_pixel(x, y).0;
            acc.r += u64::from(r);
            acc.g += u64::from(g);
            acc.b += u64::from(b);
            acc.a += u64::from(a);
            acc.count += 1;
            samples += 1;
        }
    }

    SampledColors {
        unsampled_cells: sums.iter().filter(|s| s.count == 0).count(),
        colors: sums.into_iter().map(ChannelSums::mean).collect(),
        samples,
    }
}
