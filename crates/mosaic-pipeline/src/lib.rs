//! mosaic-pipeline: Pure Voronoi mosaic pipeline (sans-IO).
//!
//! Turns a raster image into colored Voronoi cells through:
//! seed placement -> tessellation -> color sampling, then optionally
//! filters the cells, merges same-colored cells into hole-aware
//! boundary rings and simplifies those rings.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! pixel buffers and returns structured data. Reading files and writing
//! SVG live in `mosaic-cli` and `mosaic-export`.

pub mod color;
pub mod diagnostics;
pub mod merge;
pub mod pipeline;
pub mod pixels;
pub mod render;
pub mod rw;
pub mod seeds;
pub mod simplify;
pub mod types;
pub mod voronoi;
pub mod vw;

pub use diagnostics::{PipelineDiagnostics, process_with_diagnostics};
pub use merge::{MergeOptions, MergedBoundary, merge_cells_by_color};
pub use pipeline::Pipeline;
pub use pixels::{EncodedImage, PixelSource, RawPixels};
pub use render::{
    CellRenderOptions, CellRenderResult, SimplificationPointStats, compute_cell_render,
    is_white, should_render, simplification_point_stats, to_rendered_color,
};
pub use seeds::{compute_seed_count, generate_seeds, seeds_to_pixels};
pub use simplify::{SimplifyAlgorithm, SimplifyOptions, simplify_merged_boundaries};
pub use types::{
    CellColor, ColorMode, Dimensions, PipelineConfig, PipelineError, PipelineOutput, Point,
    Polygon, RgbaImage, SeedPoint, SeedStrategy,
};
pub use voronoi::{Tessellation, Tessellator, TessellatorKind};

/// Run the full mosaic pipeline.
///
/// Takes any [`PixelSource`] (an in-memory [`RgbaImage`], a
/// [`RawPixels`] buffer or an [`EncodedImage`]) and a configuration,
/// then produces a [`PipelineOutput`] with one seed, one clipped cell
/// polygon and one color per cell, plus the source dimensions. The
/// dimensions are needed by export serializers to set coordinate spaces
/// (e.g., SVG `viewBox`).
///
/// # Pipeline steps
///
/// 1. Validate the config against the source dimensions
/// 2. Compute the seed count from density, aspect ratio and strategy
/// 3. Draw normalized seeds from the stream keyed by `seed_value`
/// 4. Scale seeds to pixels and build the clipped Voronoi cells
/// 5. Read pixels once and color every cell (seed point or cell average)
///
/// Filtering, merging and simplification are render concerns; see
/// [`compute_cell_render`].
///
/// ```rust
/// # use mosaic_pipeline::{PipelineConfig, PipelineError, RgbaImage};
/// # fn run() -> Result<(), PipelineError> {
/// let image = RgbaImage::from_pixel(64, 32, image::Rgba([10, 20, 30, 255]));
/// let config = PipelineConfig {
///     seed_density: 50.0,
///     ..PipelineConfig::default()
/// };
/// let output = mosaic_pipeline::process(&image, &config)?;
/// assert_eq!(output.cell_polygons.len(), 100);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for an invalid config or a
/// zero-sized source, [`PipelineError::Tessellation`] if the cells
/// cannot be built, and any error the source raises while producing
/// pixels (for example [`PipelineError::ImageDecode`]).
pub fn process<S: PixelSource>(
    source: S,
    config: &PipelineConfig,
) -> Result<PipelineOutput, PipelineError> {
    Ok(Pipeline::new(source, config.clone())
        .seed()?
        .tessellate()?
        .sample_colors()?
        .into_output())
}
