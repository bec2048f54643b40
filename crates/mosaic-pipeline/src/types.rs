//! Shared types for the mosaic pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::voronoi::TessellatorKind;

/// Re-export `RgbaImage` so downstream crates can hand pixel buffers to
/// the pipeline without depending on `image` directly.
pub use image::RgbaImage;

/// A seed position in normalized `[0, 1]` coordinates.
///
/// The index of a seed in its vector is the canonical cell index used
/// by every later stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeedPoint {
    /// Horizontal position as a fraction of the image width.
    pub x01: f64,
    /// Vertical position as a fraction of the image height.
    pub y01: f64,
}

/// A 2D point in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// An RGBA cell color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellColor {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl CellColor {
    /// Create a new color.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// An ordered, implicitly closed sequence of vertices.
///
/// The first vertex is not repeated at the end. Cell polygons may be
/// empty when the tessellation produced no cell for their seed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon(Vec<Point>);

impl Polygon {
    /// Create a new polygon from its vertices.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polygon has no vertices.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of vertices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all vertices.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polygon and returns the underlying vertices.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` when empty.
    #[must_use]
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let first = *self.0.first()?;
        Some(self.0.iter().fold((first, first), |(lo, hi), p| {
            (
                Point::new(lo.x.min(p.x), lo.y.min(p.y)),
                Point::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        }))
    }
}

impl From<Vec<Point>> for Polygon {
    fn from(points: Vec<Point>) -> Self {
        Self(points)
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The smaller of width and height.
    #[must_use]
    pub fn min_side(self) -> u32 {
        self.width.min(self.height)
    }
}

/// How the normalized area driving the seed count is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SeedStrategy {
    /// Normalized area is the aspect ratio `width / height`.
    #[default]
    #[serde(rename = "aspect")]
    Aspect,
    /// Normalized area is `max(aspect, 1 / aspect)`, so portrait and
    /// landscape images of the same proportions get the same count.
    #[serde(rename = "maxAspect")]
    MaxAspect,
}

/// How each cell's color is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorMode {
    /// Nearest pixel under the seed.
    #[default]
    #[serde(rename = "seedPoint")]
    SeedPoint,
    /// Mean color of every (strided) pixel owned by the cell.
    #[serde(rename = "cellAverage")]
    CellAverage,
}

impl FromStr for SeedStrategy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aspect" => Ok(Self::Aspect),
            "maxAspect" => Ok(Self::MaxAspect),
            other => Err(PipelineError::InvalidConfig(format!(
                "unknown seed strategy '{other}' (expected aspect or maxAspect)"
            ))),
        }
    }
}

impl FromStr for ColorMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seedPoint" => Ok(Self::SeedPoint),
            "cellAverage" => Ok(Self::CellAverage),
            other => Err(PipelineError::InvalidConfig(format!(
                "unknown color mode '{other}' (expected seedPoint or cellAverage)"
            ))),
        }
    }
}

impl fmt::Display for SeedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Aspect => "aspect",
            Self::MaxAspect => "maxAspect",
        })
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SeedPoint => "seedPoint",
            Self::CellAverage => "cellAverage",
        })
    }
}

/// Configuration for one pipeline run.
///
/// Image dimensions come from the [`PixelSource`](crate::PixelSource);
/// everything else that shapes the tessellation lives here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seeds per unit of normalized area. Must be finite and positive.
    pub seed_density: f64,

    /// String keying the deterministic seed stream.
    pub seed_value: String,

    /// How the seed count scales with the image aspect ratio.
    pub seed_strategy: SeedStrategy,

    /// How cell colors are sampled.
    pub color_mode: ColorMode,

    /// Sampling resolution for [`ColorMode::CellAverage`], in `(0, 1]`.
    /// Pixels are visited with a stride of `round(1 / render_scale)`.
    pub render_scale: f64,

    /// Which tessellation backend builds the cell polygons.
    pub tessellator: TessellatorKind,
}

impl PipelineConfig {
    /// Default seed density.
    pub const DEFAULT_SEED_DENSITY: f64 = 80_000.0;

    /// Default seed string.
    pub const DEFAULT_SEED_VALUE: &'static str = "12345";

    /// Default cell-average sampling scale.
    pub const DEFAULT_RENDER_SCALE: f64 = 1.0;

    /// Check every field before any geometry work begins.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the seed density is not
    /// a finite positive number or the render scale is outside `(0, 1]`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.seed_density.is_finite() || self.seed_density <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "seed density must be a finite number > 0, got {}",
                self.seed_density
            )));
        }
        if !self.render_scale.is_finite() || self.render_scale <= 0.0 || self.render_scale > 1.0
        {
            return Err(PipelineError::InvalidConfig(format!(
                "render scale must be in (0, 1], got {}",
                self.render_scale
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed_density: Self::DEFAULT_SEED_DENSITY,
            seed_value: Self::DEFAULT_SEED_VALUE.to_owned(),
            seed_strategy: SeedStrategy::default(),
            color_mode: ColorMode::default(),
            render_scale: Self::DEFAULT_RENDER_SCALE,
            tessellator: TessellatorKind::default(),
        }
    }
}

/// Everything a renderer or exporter needs from one pipeline run.
///
/// `seeds01`, `seeds_px`, `cell_polygons` and `cell_colors` are
/// index-aligned: entry `i` of each describes cell `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    /// Source image dimensions in pixels.
    pub dimensions: Dimensions,
    /// Seeds in normalized coordinates, in generation order.
    pub seeds01: Vec<SeedPoint>,
    /// Seeds in pixel coordinates.
    pub seeds_px: Vec<Point>,
    /// One clipped Voronoi polygon per seed (possibly empty).
    pub cell_polygons: Vec<Polygon>,
    /// One sampled color per seed.
    pub cell_colors: Vec<CellColor>,
}

/// Errors that can occur during pipeline processing.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the source image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The encoded image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// The pixel buffer does not match the advertised dimensions.
    #[error("pixel source is {actual:?} but {expected:?} was expected")]
    DimensionMismatch {
        /// Dimensions the run was configured with.
        expected: Dimensions,
        /// Dimensions of the pixel data actually delivered.
        actual: Dimensions,
    },

    /// The tessellation backend could not build a diagram.
    #[error("tessellation failed: {0}")]
    Tessellation(String),
}

/// Serde-compatible proxy for `PipelineError`.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    ImageDecode(String),
    EmptyInput,
    InvalidConfig(String),
    DimensionMismatch {
        expected: Dimensions,
        actual: Dimensions,
    },
    Tessellation(String),
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::InvalidConfig(s) => PipelineErrorProxy::InvalidConfig(s.clone()),
            Self::DimensionMismatch { expected, actual } => PipelineErrorProxy::DimensionMismatch {
                expected: *expected,
                actual: *actual,
            },
            Self::Tessellation(s) => PipelineErrorProxy::Tessellation(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            // The original image::ImageError cannot be rebuilt; keep its message.
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::InvalidConfig(format!("image decode error: {msg}"))
            }
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            PipelineErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
            PipelineErrorProxy::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            PipelineErrorProxy::Tessellation(s) => Self::Tessellation(s),
        })
    }
}
