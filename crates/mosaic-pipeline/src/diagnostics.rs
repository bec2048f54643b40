//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter experimentation. [`process_with_diagnostics`] runs the
//! pipeline and the cell render pass, collecting diagnostics alongside
//! the results.
//!
//! Duration measurements use [`std::time::Duration`] (platform-agnostic).
//! Timestamps are captured via the `web-time` crate, which uses
//! `performance.now()` on WASM and `std::time::Instant` on native.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::merge::MergedBoundary;
use crate::pipeline::Pipeline;
use crate::pixels::PixelSource;
use crate::render::{CellRenderOptions, CellRenderResult, compute_cell_render};
use crate::simplify::SimplifyAlgorithm;
use crate::types::{ColorMode, PipelineConfig, PipelineError, PipelineOutput, SeedStrategy};
use crate::voronoi::TessellatorKind;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
///
/// Merge and simplification only run when same-colored cells are
/// combined; their fields are `None` otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Seed count and generation.
    pub seeding: StageDiagnostics,
    /// Voronoi tessellation.
    pub tessellation: StageDiagnostics,
    /// Cell color sampling (includes decoding for encoded sources).
    pub color_sampling: StageDiagnostics,
    /// Black-and-white transform and white-cell filter.
    pub cell_filter: StageDiagnostics,
    /// Same-color boundary merge.
    pub merge: Option<StageDiagnostics>,
    /// Ring simplification and size filter.
    pub simplification: Option<StageDiagnostics>,
    /// Total wall-clock duration of the entire run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Seed generation metrics.
    Seeding {
        /// How the seed count was derived from the aspect ratio.
        strategy: SeedStrategy,
        /// Configured seed density.
        density: f64,
        /// Number of seeds generated.
        seed_count: usize,
    },
    /// Tessellation metrics.
    Tessellation {
        /// Backend that built the cells.
        backend: TessellatorKind,
        /// One polygon per seed.
        polygon_count: usize,
        /// Polygons left empty (duplicate seeds or fully clipped cells).
        empty_polygons: usize,
        /// Total vertices across all polygons.
        vertex_count: usize,
    },
    /// Color sampling metrics.
    ColorSampling {
        /// Sampling mode.
        mode: ColorMode,
        /// Pixels read.
        samples: u64,
        /// Cells that no sample landed in.
        unsampled_cells: usize,
    },
    /// Cell filter metrics.
    CellFilter {
        /// Cells kept for rendering.
        kept: usize,
        /// Cells dropped as white.
        skipped: usize,
    },
    /// Boundary merge metrics.
    Merge {
        /// Distinct color groups with at least one ring.
        group_count: usize,
        /// Rings across all groups.
        ring_count: usize,
        /// Vertices across all rings.
        point_count: usize,
    },
    /// Ring simplification metrics.
    Simplification {
        /// Algorithm applied.
        algorithm: SimplifyAlgorithm,
        /// Clamped strength.
        strength: f64,
        /// Vertices before simplification.
        points_before: usize,
        /// Vertices after simplification and the size filter.
        points_after: usize,
        /// Rings removed by the size filter.
        rings_dropped: usize,
        /// Reduction ratio: `1.0 - (after / before)`.
        reduction_ratio: f64,
    },
}

/// High-level summary counts for the entire run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Seeds generated.
    pub seed_count: usize,
    /// Cells that survived the render filter.
    pub rendered_cells: usize,
    /// Vertices in the final merged rings, when cells were combined.
    pub final_point_count: Option<usize>,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        let mut stages: Vec<(&str, &StageDiagnostics)> = vec![
            ("Seeding", &self.seeding),
            ("Tessellation", &self.tessellation),
            ("Color Sampling", &self.color_sampling),
            ("Cell Filter", &self.cell_filter),
        ];
        if let Some(ref m) = self.merge {
            stages.push(("Merge", m));
        }
        if let Some(ref s) = self.simplification {
            stages.push(("Simplification", s));
        }

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        let final_points = self
            .summary
            .final_point_count
            .map_or_else(|| "-".to_owned(), |n| n.to_string());
        lines.push(format!(
            "Seeds: {}  |  Rendered cells: {}  |  Final ring points: {final_points}",
            self.summary.seed_count, self.summary.rendered_cells,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Seeding {
            strategy,
            density,
            seed_count,
        } => format!("{strategy} density={density} -> {seed_count} seeds"),
        StageMetrics::Tessellation {
            polygon_count,
            empty_polygons,
            vertex_count,
            ..
        } => format!("{polygon_count} cells ({empty_polygons} empty), {vertex_count} vertices"),
        StageMetrics::ColorSampling {
            mode,
            samples,
            unsampled_cells,
        } => format!("{mode} {samples} samples, {unsampled_cells} unsampled cells"),
        StageMetrics::CellFilter { kept, skipped } => {
            format!("kept={kept} skipped={skipped}")
        }
        StageMetrics::Merge {
            group_count,
            ring_count,
            point_count,
        } => format!("{group_count} groups, {ring_count} rings, {point_count} pts"),
        StageMetrics::Simplification {
            algorithm,
            strength,
            points_before,
            points_after,
            rings_dropped,
            reduction_ratio,
        } => format!(
            "{algorithm} s={strength:.2} {points_before}->{points_after} pts ({:.1}% reduction), {rings_dropped} rings dropped",
            reduction_ratio * 100.0,
        ),
    }
}

/// Rings and vertices across a set of merged boundaries.
pub(crate) fn boundary_counts(groups: &[MergedBoundary]) -> (usize, usize) {
    let rings = groups.iter().map(|g| g.rings.len()).sum();
    let points = groups.iter().map(MergedBoundary::point_count).sum();
    (rings, points)
}

/// Run the pipeline and the cell render pass, timing every stage.
///
/// Produces the same output as [`crate::process`] followed by
/// [`compute_cell_render`], plus a [`PipelineDiagnostics`] record.
///
/// # Errors
///
/// Returns the first [`PipelineError`] raised by any stage.
pub fn process_with_diagnostics<S: PixelSource>(
    source: S,
    config: &PipelineConfig,
    render_options: &CellRenderOptions,
) -> Result<(PipelineOutput, CellRenderResult, PipelineDiagnostics), PipelineError> {
    let total_start = Instant::now();

    let start = Instant::now();
    let seeded = Pipeline::new(source, config.clone()).seed()?;
    let seeding = StageDiagnostics {
        duration: start.elapsed(),
        metrics: seeded.stage_metrics(),
    };

    let start = Instant::now();
    let tessellated = seeded.tessellate()?;
    let tessellation = StageDiagnostics {
        duration: start.elapsed(),
        metrics: tessellated.stage_metrics(),
    };

    let start = Instant::now();
    let sampled = tessellated.sample_colors()?;
    let color_sampling = StageDiagnostics {
        duration: start.elapsed(),
        metrics: sampled.stage_metrics(),
    };

    let output = sampled.into_output();

    let start = Instant::now();
    let render = compute_cell_render(
        &output,
        &CellRenderOptions {
            combine_same_color: false,
            ..*render_options
        },
    );
    let cell_filter = StageDiagnostics {
        duration: start.elapsed(),
        metrics: StageMetrics::CellFilter {
            kept: render.polygons.len(),
            skipped: render.skipped(&output),
        },
    };

    let (render, merge, simplification) = if render_options.combine_same_color {
        let start = Instant::now();
        let merged = crate::merge::merge_cells_by_color(
            &render.polygons,
            &render.colors,
            crate::merge::MergeOptions::default(),
        );
        let (ring_count, point_count) = boundary_counts(&merged);
        let merge = StageDiagnostics {
            duration: start.elapsed(),
            metrics: StageMetrics::Merge {
                group_count: merged.len(),
                ring_count,
                point_count,
            },
        };

        let start = Instant::now();
        let simplify = &render_options.simplify;
        let optimized =
            crate::simplify::simplify_merged_boundaries(&merged, simplify, output.dimensions);
        let (rings_after, points_after) = boundary_counts(&optimized);
        #[allow(clippy::cast_precision_loss)]
        let reduction_ratio = if point_count > 0 {
            1.0 - (points_after as f64 / point_count as f64)
        } else {
            0.0
        };
        let simplification = StageDiagnostics {
            duration: start.elapsed(),
            metrics: StageMetrics::Simplification {
                algorithm: simplify.algorithm,
                strength: simplify.clamped_strength(),
                points_before: point_count,
                points_after,
                rings_dropped: ring_count.saturating_sub(rings_after),
                reduction_ratio,
            },
        };

        let render = CellRenderResult {
            merged_original: Some(merged),
            merged_optimized: Some(optimized),
            ..render
        };
        (render, Some(merge), Some(simplification))
    } else {
        (render, None, None)
    };

    let final_point_count = render
        .merged_optimized
        .as_deref()
        .map(|groups| boundary_counts(groups).1);
    let summary = PipelineSummary {
        image_width: output.dimensions.width,
        image_height: output.dimensions.height,
        pixel_count: u64::from(output.dimensions.width) * u64::from(output.dimensions.height),
        seed_count: output.seeds01.len(),
        rendered_cells: render.polygons.len(),
        final_point_count,
    };

    let diagnostics = PipelineDiagnostics {
        seeding,
        tessellation,
        color_sampling,
        cell_filter,
        merge,
        simplification,
        total_duration: total_start.elapsed(),
        summary,
    };
    Ok((output, render, diagnostics))
}
