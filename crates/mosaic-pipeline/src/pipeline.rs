//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use mosaic_pipeline::{Pipeline, PipelineConfig, PipelineError, RgbaImage};
//! # fn run(image: RgbaImage) -> Result<(), PipelineError> {
//! let output = Pipeline::new(image, PipelineConfig::default())
//!     .seed()?
//!     .tessellate()?
//!     .sample_colors()?
//!     .into_output();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying all previously computed
//! intermediates. The pixel source is held until color sampling, the
//! only stage that reads pixels.

use crate::diagnostics::StageMetrics;
use crate::pixels::PixelSource;
use crate::seeds::{compute_seed_count, generate_seeds, seeds_to_pixels};
use crate::types::{
    ColorMode, Dimensions, PipelineConfig, PipelineError, PipelineOutput, Point, Polygon,
    SeedPoint,
};
use crate::voronoi::{Tessellation, Tessellator};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// The pixel source and config are stored but not yet touched.
/// Call [`seed`](Self::seed) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing: call .seed() to continue"]
pub struct Pending<S> {
    config: PipelineConfig,
    source: S,
}

impl<S: PixelSource> Pending<S> {
    /// The configuration this run will use.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Dimensions reported by the pixel source.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        self.source.dimensions()
    }

    /// Validate the configuration, place seeds and advance to the
    /// [`Seeded`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the config fails
    /// [`PipelineConfig::validate`] or the source has a zero dimension.
    pub fn seed(self) -> Result<Seeded<S>, PipelineError> {
        self.config.validate()?;
        let dimensions = self.source.dimensions();
        if dimensions.width == 0 || dimensions.height == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "image dimensions must be non-zero, got {}x{}",
                dimensions.width, dimensions.height
            )));
        }

        let count = compute_seed_count(
            dimensions,
            self.config.seed_density,
            self.config.seed_strategy,
        );
        let seeds01 = generate_seeds(count, &self.config.seed_value);
        let seeds_px = seeds_to_pixels(&seeds01, dimensions);
        Ok(Seeded {
            config: self.config,
            source: self.source,
            dimensions,
            seeds01,
            seeds_px,
        })
    }
}

// ───────────────────────── Stage 1: Seeded ───────────────────────────

/// Pipeline state after seed placement.
///
/// Call [`tessellate`](Self::tessellate) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing: call .tessellate() to continue"]
pub struct Seeded<S> {
    config: PipelineConfig,
    source: S,
    dimensions: Dimensions,
    seeds01: Vec<SeedPoint>,
    seeds_px: Vec<Point>,
}

impl<S: PixelSource> Seeded<S> {
    /// Image dimensions the seeds were placed in.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Seeds in normalized coordinates.
    #[must_use]
    pub fn seeds01(&self) -> &[SeedPoint] {
        &self.seeds01
    }

    /// Seeds in pixel coordinates.
    #[must_use]
    pub fn seeds_px(&self) -> &[Point] {
        &self.seeds_px
    }

    /// Metrics for the seeding step.
    #[must_use]
    pub fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::Seeding {
            strategy: self.config.seed_strategy,
            density: self.config.seed_density,
            seed_count: self.seeds01.len(),
        }
    }

    /// Build the clipped Voronoi cells and advance to the
    /// [`Tessellated`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Tessellation`] if the backend rejects the
    /// seeds.
    pub fn tessellate(self) -> Result<Tessellated<S>, PipelineError> {
        let tessellation = self
            .config
            .tessellator
            .tessellate(&self.seeds_px, self.dimensions)?;
        Ok(Tessellated {
            config: self.config,
            source: self.source,
            dimensions: self.dimensions,
            seeds01: self.seeds01,
            seeds_px: self.seeds_px,
            tessellation,
        })
    }
}

// ───────────────────────── Stage 2: Tessellated ──────────────────────

/// Pipeline state after tessellation.
///
/// Call [`sample_colors`](Self::sample_colors) to advance to the final
/// stage.
#[must_use = "pipeline stages are consumed by advancing: call .sample_colors() to continue"]
pub struct Tessellated<S> {
    config: PipelineConfig,
    source: S,
    dimensions: Dimensions,
    seeds01: Vec<SeedPoint>,
    seeds_px: Vec<Point>,
    tessellation: Tessellation,
}

impl<S: PixelSource> Tessellated<S> {
    /// The clipped cells and their locator.
    #[must_use]
    pub const fn tessellation(&self) -> &Tessellation {
        &self.tessellation
    }

    /// One polygon per seed.
    #[must_use]
    pub fn cell_polygons(&self) -> &[Polygon] {
        self.tessellation.polygons()
    }

    /// Metrics for the tessellation step.
    #[must_use]
    pub fn stage_metrics(&self) -> StageMetrics {
        let polygons = self.tessellation.polygons();
        StageMetrics::Tessellation {
            backend: self.config.tessellator,
            polygon_count: polygons.len(),
            empty_polygons: polygons.iter().filter(|p| p.is_empty()).count(),
            vertex_count: polygons.iter().map(Polygon::len).sum(),
        }
    }

    /// Read pixels once, color every cell and advance to the [`Sampled`]
    /// stage.
    ///
    /// # Errors
    ///
    /// Returns whatever the pixel source raises while producing pixels
    /// (for example [`PipelineError::ImageDecode`]), or
    /// [`PipelineError::DimensionMismatch`] if the delivered pixels do
    /// not match the dimensions the seeds were placed in.
    pub fn sample_colors(self) -> Result<Sampled, PipelineError> {
        let image = self.source.image_data()?;
        let actual = Dimensions::new(image.width(), image.height());
        if actual != self.dimensions {
            return Err(PipelineError::DimensionMismatch {
                expected: self.dimensions,
                actual,
            });
        }

        let sampled = match self.config.color_mode {
            ColorMode::SeedPoint => crate::color::sample_seed_colors(&image, &self.seeds_px),
            ColorMode::CellAverage => crate::color::cell_average_colors(
                &image,
                &self.tessellation,
                self.config.render_scale,
            ),
        };
        Ok(Sampled {
            color_mode: self.config.color_mode,
            output: PipelineOutput {
                dimensions: self.dimensions,
                seeds01: self.seeds01,
                seeds_px: self.seeds_px,
                cell_polygons: self.tessellation.into_polygons(),
                cell_colors: sampled.colors,
            },
            samples: sampled.samples,
            unsampled_cells: sampled.unsampled_cells,
        })
    }
}

// ───────────────────────── Stage 3: Sampled ──────────────────────────

/// Pipeline state after color sampling: every output is computed.
///
/// Call [`into_output`](Self::into_output) to take the result.
#[must_use = "pipeline stages are consumed by advancing: call .into_output() to continue"]
pub struct Sampled {
    color_mode: ColorMode,
    output: PipelineOutput,
    samples: u64,
    unsampled_cells: usize,
}

impl Sampled {
    /// The finished output.
    #[must_use]
    pub const fn output(&self) -> &PipelineOutput {
        &self.output
    }

    /// Number of pixels read while sampling.
    #[must_use]
    pub const fn samples(&self) -> u64 {
        self.samples
    }

    /// Cells that no sample landed in.
    #[must_use]
    pub const fn unsampled_cells(&self) -> usize {
        self.unsampled_cells
    }

    /// Metrics for the color sampling step.
    #[must_use]
    pub const fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::ColorSampling {
            mode: self.color_mode,
            samples: self.samples,
            unsampled_cells: self.unsampled_cells,
        }
    }

    /// Consume the final stage and return the output.
    #[must_use]
    pub fn into_output(self) -> PipelineOutput {
        self.output
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of pipeline stages (including [`Pending`]).
pub const STAGE_COUNT: usize = 4;

/// Common interface for every pipeline stage.
///
/// Lets generic code walk the pipeline without naming each concrete
/// stage type. See [`Stage`] for the loopable form.
pub trait PipelineStage: Sized {
    /// Short machine-friendly name of the stage.
    const NAME: &str;

    /// Zero-based position in the pipeline.
    const INDEX: usize;

    /// Stage-specific metrics for diagnostics.
    ///
    /// `None` for [`Pending`], which has done no work yet.
    fn metrics(&self) -> Option<StageMetrics>;

    /// Run all remaining stages and return the output.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining stage fails.
    fn complete(self) -> Result<PipelineOutput, PipelineError>;
}

impl<S: PixelSource> PipelineStage for Pending<S> {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn complete(self) -> Result<PipelineOutput, PipelineError> {
        self.seed()?.complete()
    }
}

impl<S: PixelSource> PipelineStage for Seeded<S> {
    const NAME: &str = "seeds";
    const INDEX: usize = 1;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn complete(self) -> Result<PipelineOutput, PipelineError> {
        self.tessellate()?.complete()
    }
}

impl<S: PixelSource> PipelineStage for Tessellated<S> {
    const NAME: &str = "cells";
    const INDEX: usize = 2;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn complete(self) -> Result<PipelineOutput, PipelineError> {
        Ok(self.sample_colors()?.into_output())
    }
}

impl PipelineStage for Sampled {
    const NAME: &str = "colors";
    const INDEX: usize = 3;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn complete(self) -> Result<PipelineOutput, PipelineError> {
        Ok(self.into_output())
    }
}

/// Enum wrapping all pipeline stages for uniform, loopable access.
///
/// Use [`From`] conversions to enter the dynamic API from any typed
/// stage, then call [`advance`](Self::advance) in a loop:
///
/// ```rust
/// # use mosaic_pipeline::{Pipeline, PipelineConfig, PipelineError, RgbaImage};
/// # use mosaic_pipeline::pipeline::{Stage, Advance};
/// # fn run(image: RgbaImage) -> Result<(), PipelineError> {
/// let mut stage: Stage<_> = Pipeline::new(image, PipelineConfig::default()).into();
/// loop {
///     match stage.advance()? {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let output = stage.complete()?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub enum Stage<S> {
    /// See [`Pending`].
    Pending(Pending<S>),
    /// See [`Seeded`].
    Seeded(Seeded<S>),
    /// See [`Tessellated`].
    Tessellated(Tessellated<S>),
    /// See [`Sampled`].
    Sampled(Sampled),
}

/// Compile-time guard: if a [`Stage`] variant is added, this match becomes
/// non-exhaustive and the build fails, reminding you to bump [`STAGE_COUNT`].
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard<S>(s: &Stage<S>) {
    match s {
        Stage::Pending(_) | Stage::Seeded(_) | Stage::Tessellated(_) | Stage::Sampled(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next stage or the
/// completed final stage returned unchanged.
#[must_use]
pub enum Advance<S> {
    /// The pipeline advanced to this next stage.
    Next(Stage<S>),
    /// The pipeline was already at the final stage, returned unchanged.
    Complete(Stage<S>),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Seeded(s) => s.$method($($arg),*),
            Self::Tessellated(s) => s.$method($($arg),*),
            Self::Sampled(s) => s.$method($($arg),*),
        }
    };
}

impl<S: PixelSource> Stage<S> {
    /// Human-readable name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// Stage-specific metrics for diagnostics.
    ///
    /// Returns `None` for the initial `Pending` stage.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Sampled(_))
    }

    /// Advance to the next stage, returning `self` unchanged if
    /// already complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn advance(self) -> Result<Advance<S>, PipelineError> {
        let next = match self {
            Self::Pending(s) => Self::Seeded(s.seed()?),
            Self::Seeded(s) => Self::Tessellated(s.tessellate()?),
            Self::Tessellated(s) => Self::Sampled(s.sample_colors()?),
            Self::Sampled(s) => return Ok(Advance::Complete(Self::Sampled(s))),
        };
        Ok(Advance::Next(next))
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    pub fn complete(self) -> Result<PipelineOutput, PipelineError> {
        delegate!(self, complete)
    }
}

// Provide a private helper trait so the macro can call `.name()` and
// `.index()` on `&self`; the `PipelineStage` trait's associated
// constants aren't callable via `self.NAME`.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

impl<S> From<Pending<S>> for Stage<S> {
    fn from(s: Pending<S>) -> Self {
        Self::Pending(s)
    }
}

impl<S> From<Seeded<S>> for Stage<S> {
    fn from(s: Seeded<S>) -> Self {
        Self::Seeded(s)
    }
}

impl<S> From<Tessellated<S>> for Stage<S> {
    fn from(s: Tessellated<S>) -> Self {
        Self::Tessellated(s)
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental mosaic pipeline.
///
/// Created via [`Pipeline::new`], which stores the pixel source and
/// config without doing any processing. The caller then chains stage
/// methods to advance through the pipeline:
///
/// ```rust
/// # use mosaic_pipeline::{Pipeline, PipelineConfig, PipelineError, RgbaImage};
/// # fn run(image: RgbaImage) -> Result<(), PipelineError> {
/// let output = Pipeline::new(image, PipelineConfig::default())
///     .seed()?
///     .tessellate()?
///     .sample_colors()?
///     .into_output();
/// # Ok(())
/// # }
/// ```
///
/// Each stage method consumes the current state and returns the next,
/// making it a compile-time error to skip stages or call them out of
/// order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from a pixel source and config.
    ///
    /// No processing is performed; the source and config are simply
    /// stored. Call [`.seed()`](Pending::seed) (or convert to a
    /// [`Stage`] and loop) to begin processing.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new<S: PixelSource>(source: S, config: PipelineConfig) -> Pending<S> {
        Pending { config, source }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::pixels::{EncodedImage, RawPixels};
    use crate::types::CellColor;

    /// Left half black, right half white.
    fn halves(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, _y| {
            if x < width / 2 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        })
    }

    fn config(density: f64) -> PipelineConfig {
        PipelineConfig {
            seed_density: density,
            ..PipelineConfig::default()
        }
    }

    /// A source whose pixels disagree with its advertised size.
    struct Liar(RgbaImage);

    impl PixelSource for Liar {
        fn dimensions(&self) -> Dimensions {
            Dimensions::new(self.0.width() + 1, self.0.height())
        }

        fn image_data(&self) -> Result<std::borrow::Cow<'_, RgbaImage>, PipelineError> {
            Ok(std::borrow::Cow::Borrowed(&self.0))
        }
    }

    // ─────────── Typed API tests ─────────────────────────────────

    #[test]
    fn pending_exposes_dimensions() {
        let pending = Pipeline::new(halves(30, 10), config(5.0));
        assert_eq!(pending.dimensions(), Dimensions::new(30, 10));
        assert!((pending.config().seed_density - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn seed_rejects_invalid_config() {
        let result = Pipeline::new(halves(10, 10), config(-1.0)).seed();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn seed_rejects_zero_dimensions() {
        let result = Pipeline::new(RgbaImage::new(0, 10), config(5.0)).seed();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn seeded_places_seeds_inside_image() {
        let seeded = Pipeline::new(halves(30, 10), config(5.0)).seed().unwrap();
        // 5 * 30 / 10 = 15.
        assert_eq!(seeded.seeds01().len(), 15);
        assert_eq!(seeded.seeds_px().len(), 15);
        for (s, p) in seeded.seeds01().iter().zip(seeded.seeds_px()) {
            assert!((p.x - s.x01 * 30.0).abs() < 1e-12);
            assert!((p.y - s.y01 * 10.0).abs() < 1e-12);
        }
    }

    #[test]
    fn tessellated_has_one_cell_per_seed() {
        let tessellated = Pipeline::new(halves(30, 10), config(5.0))
            .seed()
            .unwrap()
            .tessellate()
            .unwrap();
        assert_eq!(tessellated.cell_polygons().len(), 15);
        assert!(matches!(
            tessellated.stage_metrics(),
            StageMetrics::Tessellation { polygon_count: 15, .. }
        ));
    }

    #[test]
    fn seed_point_colors_match_pixels_under_seeds() {
        let output = Pipeline::new(halves(40, 20), config(20.0))
            .seed()
            .unwrap()
            .tessellate()
            .unwrap()
            .sample_colors()
            .unwrap()
            .into_output();
        for (p, c) in output.seeds_px.iter().zip(&output.cell_colors) {
            let expected = if p.x.floor() < 20.0 { 0 } else { 255 };
            assert_eq!(*c, CellColor::new(expected, expected, expected, 255));
        }
    }

    #[test]
    fn cell_average_mode_samples_every_pixel() {
        let cfg = PipelineConfig {
            color_mode: ColorMode::CellAverage,
            ..config(10.0)
        };
        let sampled = Pipeline::new(halves(20, 20), cfg)
            .seed()
            .unwrap()
            .tessellate()
            .unwrap()
            .sample_colors()
            .unwrap();
        assert_eq!(sampled.samples(), 400);
        assert_eq!(sampled.output().cell_colors.len(), 10);
    }

    #[test]
    fn mismatched_pixels_are_rejected() {
        let result = Pipeline::new(Liar(halves(10, 10)), config(5.0))
            .seed()
            .unwrap()
            .tessellate()
            .unwrap()
            .sample_colors();
        assert!(matches!(
            result,
            Err(PipelineError::DimensionMismatch {
                expected: Dimensions { width: 11, height: 10 },
                actual: Dimensions { width: 10, height: 10 },
            })
        ));
    }

    #[test]
    fn encoded_source_decodes_at_sampling() {
        let mut buf = Vec::new();
        let img = halves(16, 16);
        image::ImageEncoder::write_image(
            image::codecs::png::PngEncoder::new(&mut buf),
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        let encoded = EncodedImage::new(buf).unwrap();
        let raw = RawPixels::new(16, 16, img.into_raw()).unwrap();

        let a = Pipeline::new(encoded, config(8.0)).seed().unwrap().complete().unwrap();
        let b = Pipeline::new(raw, config(8.0)).seed().unwrap().complete().unwrap();
        assert_eq!(a, b);
    }

    // ─────────── Dynamic API tests ───────────────────────────────

    #[test]
    fn stage_loop_visits_every_stage_in_order() {
        let mut stage: Stage<_> = Pipeline::new(halves(20, 10), config(4.0)).into();
        let mut names = vec![stage.name()];
        let mut indices = vec![stage.index()];
        loop {
            match stage.advance().unwrap() {
                Advance::Next(next) => {
                    names.push(next.name());
                    indices.push(next.index());
                    stage = next;
                }
                Advance::Complete(done) => {
                    stage = done;
                    break;
                }
            }
        }
        assert!(stage.is_complete());
        assert_eq!(names, vec!["source", "seeds", "cells", "colors"]);
        assert_eq!(indices, (0..STAGE_COUNT).collect::<Vec<_>>());
        let output = stage.complete().unwrap();
        assert_eq!(output.cell_colors.len(), 8);
    }

    #[test]
    fn pending_has_no_metrics() {
        let stage: Stage<_> = Pipeline::new(halves(20, 10), config(4.0)).into();
        assert!(stage.metrics().is_none());
    }

    #[test]
    fn complete_from_any_stage_matches_typed_chain() {
        let typed = Pipeline::new(halves(20, 10), config(6.0))
            .seed()
            .unwrap()
            .tessellate()
            .unwrap()
            .sample_colors()
            .unwrap()
            .into_output();

        let from_pending = Stage::from(Pipeline::new(halves(20, 10), config(6.0)))
            .complete()
            .unwrap();
        let from_seeded = Stage::from(Pipeline::new(halves(20, 10), config(6.0)).seed().unwrap())
            .complete()
            .unwrap();
        assert_eq!(from_pending, typed);
        assert_eq!(from_seeded, typed);
    }

    #[test]
    fn stage_constants_are_ordered() {
        assert_eq!(<Pending<RgbaImage> as PipelineStage>::INDEX, 0);
        assert_eq!(<Seeded<RgbaImage> as PipelineStage>::INDEX, 1);
        assert_eq!(<Tessellated<RgbaImage> as PipelineStage>::INDEX, 2);
        assert_eq!(Sampled::INDEX, STAGE_COUNT - 1);
        assert_eq!(Sampled::NAME, "colors");
    }
}
