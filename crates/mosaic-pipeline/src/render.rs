//! Cell filtering and the merged-boundary render pass.
//!
//! Turns a [`PipelineOutput`] into what a renderer draws: the kept
//! cells with their display colors and, when same-colored cells are
//! combined, the merged boundaries before and after simplification.

use serde::{Deserialize, Serialize};

use crate::merge::{MergeOptions, MergedBoundary, merge_cells_by_color};
use crate::simplify::{SimplifyAlgorithm, SimplifyOptions, simplify_merged_boundaries};
use crate::types::{CellColor, PipelineOutput, Polygon};

/// Luminance at or above which a cell turns white in black-and-white mode.
pub const LUMINANCE_THRESHOLD: f64 = 128.0;

/// How cells are filtered and grouped for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CellRenderOptions {
    /// Quantize each cell to pure black or white by luminance.
    pub black_and_white: bool,
    /// Omit cells whose display color is pure white.
    pub skip_white: bool,
    /// Merge same-colored cells into boundary rings.
    pub combine_same_color: bool,
    /// Simplification applied to merged boundaries.
    pub simplify: SimplifyOptions,
}

/// Display color of a cell.
///
/// With `black_and_white`, the Rec. 709 luminance decides between black
/// and white; alpha is kept either way.
#[must_use]
pub fn to_rendered_color(color: CellColor, black_and_white: bool) -> CellColor {
    if !black_and_white {
        return color;
    }
    let luminance = 0.0722f64.mul_add(
        f64::from(color.b),
        0.2126f64.mul_add(f64::from(color.r), 0.7152 * f64::from(color.g)),
    );
    let v = if luminance >= LUMINANCE_THRESHOLD { 255 } else { 0 };
    CellColor::new(v, v, v, color.a)
}

/// Whether all three color channels are 255 (alpha is ignored).
#[must_use]
pub const fn is_white(color: CellColor) -> bool {
    color.r == 255 && color.g == 255 && color.b == 255
}

/// Whether a cell with this display color should be drawn.
#[must_use]
pub const fn should_render(color: CellColor, skip_white: bool) -> bool {
    !(skip_white && is_white(color))
}

/// Result of [`compute_cell_render`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRenderResult {
    /// Polygons of the kept cells, in seed order.
    pub polygons: Vec<Polygon>,
    /// Display colors of the kept cells.
    pub colors: Vec<CellColor>,
    /// Seed index of each kept cell.
    pub indices: Vec<usize>,
    /// Merged boundaries before simplification, when combining.
    pub merged_original: Option<Vec<MergedBoundary>>,
    /// Merged boundaries after simplification and size filtering, when
    /// combining.
    pub merged_optimized: Option<Vec<MergedBoundary>>,
}

impl CellRenderResult {
    /// Number of cells dropped by the white filter.
    #[must_use]
    pub fn skipped(&self, output: &PipelineOutput) -> usize {
        output.cell_polygons.len().saturating_sub(self.polygons.len())
    }
}

/// Filter cells for display and, optionally, merge and simplify them.
///
/// Each cell's color is first passed through [`to_rendered_color`], then
/// tested with [`should_render`]. Kept cells are merged by display color
/// when `combine_same_color` is set.
#[must_use = "returns the render result without side effects"]
pub fn compute_cell_render(output: &PipelineOutput, options: &CellRenderOptions) -> CellRenderResult {
    let mut polygons = Vec::new();
    let mut colors = Vec::new();
    let mut indices = Vec::new();

    for (i, (polygon, &color)) in output.cell_polygons.iter().zip(&output.cell_colors).enumerate() {
        let rendered = to_rendered_color(color, options.black_and_white);
        if !should_render(rendered, options.skip_white) {
            continue;
        }
        polygons.push(polygon.clone());
        colors.push(rendered);
        indices.push(i);
    }

    let (merged_original, merged_optimized) = if options.combine_same_color {
        let merged = merge_cells_by_color(&polygons, &colors, MergeOptions::default());
        let optimized = simplify_merged_boundaries(&merged, &options.simplify, output.dimensions);
        (Some(merged), Some(optimized))
    } else {
        (None, None)
    };

    CellRenderResult {
        polygons,
        colors,
        indices,
        merged_original,
        merged_optimized,
    }
}

/// Point totals before and after simplification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplificationPointStats {
    /// Ring vertices after merging.
    pub original_points: usize,
    /// Ring vertices after simplification and size filtering.
    pub optimized_points: usize,
}

/// Count merged ring vertices before and after simplification.
///
/// Returns `None` when cells are not combined or no algorithm is chosen.
#[must_use]
pub fn simplification_point_stats(
    render: &CellRenderResult,
    options: &CellRenderOptions,
) -> Option<SimplificationPointStats> {
    if !options.combine_same_color || options.simplify.algorithm == SimplifyAlgorithm::None {
        return None;
    }
    let count = |groups: &Option<Vec<MergedBoundary>>| {
        groups
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(MergedBoundary::point_count)
            .sum::<usize>()
    };
    Some(SimplificationPointStats {
        original_points: count(&render.merged_original),
        optimized_points: count(&render.merged_optimized),
    })
}
