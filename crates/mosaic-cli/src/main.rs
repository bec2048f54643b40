//! mosaic: turn an image into a Voronoi mosaic SVG.
//!
//! Reads an image file, scatters deterministic seeds over it, colors one
//! Voronoi cell per seed, and writes the layered SVG next to the input
//! (or wherever `--output` points).
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin mosaic -- --input photo.jpg [OPTIONS]
//! ```
//!
//! Boolean layer and filter flags take an explicit value, e.g.
//! `--show-voronoi false --combine-same-color-cells true`.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use clap::{ArgAction, Parser};
use mosaic_export::{RenderStyle, SvgMetadata, SvgOptions};
use mosaic_pipeline::{
    CellRenderOptions, ColorMode, EncodedImage, PipelineConfig, SeedStrategy, SimplifyAlgorithm,
    SimplifyOptions,
};

/// Render an image as a mosaic of flat-colored Voronoi cells.
#[derive(Parser)]
#[command(name = "mosaic", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    #[arg(long)]
    input: PathBuf,

    /// Path of the SVG to write. Defaults to the input path with an
    /// `.svg` extension.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Seeds per unit of normalized area.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SEED_DENSITY, value_parser = positive)]
    seed_density: f64,

    /// String keying the deterministic seed stream.
    #[arg(long, default_value = PipelineConfig::DEFAULT_SEED_VALUE)]
    seed_value: String,

    /// Seed count strategy (aspect, maxAspect).
    #[arg(long, default_value_t = SeedStrategy::default(), value_parser = token::<SeedStrategy>)]
    seed_strategy: SeedStrategy,

    /// Cell color sampling mode (seedPoint, cellAverage).
    #[arg(long, default_value_t = ColorMode::default(), value_parser = token::<ColorMode>)]
    color_mode: ColorMode,

    /// Sampling resolution for cellAverage, in (0, 1].
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_RENDER_SCALE)]
    render_scale: f64,

    /// Draw the source image underneath the cells.
    #[arg(long, action = ArgAction::Set, default_value_t = false)]
    show_original: bool,

    /// Draw filled cells.
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    show_cells: bool,

    /// Draw cell outlines.
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    show_voronoi: bool,

    /// Draw seed markers.
    #[arg(long, action = ArgAction::Set, default_value_t = false)]
    show_seeds: bool,

    /// Quantize cell colors to black or white by luminance.
    #[arg(long, action = ArgAction::Set, default_value_t = false)]
    black_and_white_cells: bool,

    /// Omit pure white cells.
    #[arg(long, action = ArgAction::Set, default_value_t = false)]
    skip_white_cells: bool,

    /// Merge same-colored neighbors into single filled paths.
    #[arg(long, action = ArgAction::Set, default_value_t = false)]
    combine_same_color_cells: bool,

    /// Simplification applied to merged boundaries (none, rdp, vw, rw).
    #[arg(long, default_value_t = SimplifyAlgorithm::default(), value_parser = token::<SimplifyAlgorithm>)]
    path_simplification_algorithm: SimplifyAlgorithm,

    /// Simplification strength in [0, 1].
    #[arg(long, default_value_t = 0.0, value_parser = unit_fraction)]
    path_simplification_strength: f64,

    /// Scale simplification per ring relative to the average ring size.
    #[arg(long, action = ArgAction::Set, default_value_t = false)]
    path_simplification_size_compensation: bool,

    /// Drop simplified rings smaller than this fraction of the short side.
    #[arg(long, default_value_t = 0.0, value_parser = unit_fraction)]
    path_simplification_min_path_size01: f64,

    /// Seed marker radius as a fraction of the short side, in [0, 1].
    #[arg(long, default_value_t = RenderStyle::DEFAULT_SEED_RADIUS, value_parser = unit_fraction)]
    seed_point_radius: f64,

    /// Output size relative to the source image.
    #[arg(long, default_value_t = 1.0, value_parser = positive)]
    scale: f64,

    /// Print per-stage diagnostics as a human-readable report.
    #[arg(long)]
    report: bool,

    /// Print per-stage diagnostics as JSON.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, the seed, color and render-scale flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Parse a pipeline token such as `maxAspect` or `rdp`.
fn token<T: FromStr>(s: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    s.parse().map_err(|e: T::Err| e.to_string())
}

/// Parse a finite number greater than zero.
fn positive(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("must be greater than 0, got {value}"))
    }
}

/// Parse a number in `[0, 1]`.
fn unit_fraction(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("must be between 0 and 1, got {value}"))
    }
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual pipeline flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        seed_density: cli.seed_density,
        seed_value: cli.seed_value.clone(),
        seed_strategy: cli.seed_strategy,
        color_mode: cli.color_mode,
        render_scale: cli.render_scale,
        ..PipelineConfig::default()
    })
}

const fn render_options_from_cli(cli: &Cli) -> CellRenderOptions {
    CellRenderOptions {
        black_and_white: cli.black_and_white_cells,
        skip_white: cli.skip_white_cells,
        combine_same_color: cli.combine_same_color_cells,
        simplify: SimplifyOptions {
            algorithm: cli.path_simplification_algorithm,
            strength: cli.path_simplification_strength,
            size_compensation: cli.path_simplification_size_compensation,
            min_path_size01: cli.path_simplification_min_path_size01,
        },
    }
}

/// `<dir>/<stem>.svg` beside the input unless `--output` says otherwise.
fn output_path(cli: &Cli) -> PathBuf {
    cli.output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("svg"))
}

fn write_svg(path: &Path, svg: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, svg)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let render_options = render_options_from_cli(&cli);
    let output_path = output_path(&cli);

    let image_bytes = match std::fs::read(&cli.input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.input.display());
            return ExitCode::FAILURE;
        }
    };
    let source = match EncodedImage::new(image_bytes) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error decoding {}: {e}", cli.input.display());
            return ExitCode::FAILURE;
        }
    };

    let original_href = cli
        .show_original
        .then(|| mosaic_export::image_data_uri(&source));

    let (output, render, diagnostics) =
        match mosaic_pipeline::process_with_diagnostics(&source, &config, &render_options) {
            Ok(result) => result,
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        };

    let title = cli
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mosaic");
    let config_json = match serde_json::to_string(&config) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error serializing config: {e}");
            return ExitCode::FAILURE;
        }
    };
    let metadata = SvgMetadata {
        title: Some(title),
        description: None,
        config_json: Some(&config_json),
    };
    let svg_options = SvgOptions {
        scale: cli.scale,
        show_original: cli.show_original,
        original_href: original_href.as_deref(),
        show_cells: cli.show_cells,
        show_voronoi: cli.show_voronoi,
        show_seeds: cli.show_seeds,
        style: RenderStyle {
            seed_radius: cli.seed_point_radius,
            ..RenderStyle::default()
        },
    };
    let svg = mosaic_export::to_svg(&output, &render, &svg_options, &metadata);

    if let Err(e) = write_svg(&output_path, &svg) {
        eprintln!("Error writing SVG to {}: {e}", output_path.display());
        return ExitCode::FAILURE;
    }

    // Keep stdout clean for the JSON document.
    let summary = [
        format!("Input: {}", cli.input.display()),
        format!("Output: {}", output_path.display()),
        format!("Seeds: {}", output.seeds_px.len()),
    ];
    let stats = mosaic_pipeline::simplification_point_stats(&render, &render_options);
    let stats_lines = stats.map(|s| {
        [
            format!("Original Points: {}", s.original_points),
            format!("Optimized Points: {}", s.optimized_points),
        ]
    });
    for line in summary.iter().chain(stats_lines.iter().flatten()) {
        if cli.json {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }

    if cli.json {
        match serde_json::to_string_pretty(&diagnostics) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing diagnostics: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else if cli.report {
        println!();
        println!("{}", diagnostics.report());
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("mosaic").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_match_pipeline_defaults() {
        let cli = parse(&["--input", "photo.jpg"]).unwrap();
        assert_eq!(config_from_cli(&cli).unwrap(), PipelineConfig::default());
        assert_eq!(render_options_from_cli(&cli), CellRenderOptions::default());
        assert!(cli.show_cells);
        assert!(cli.show_voronoi);
        assert!(!cli.show_seeds);
        assert!(!cli.show_original);
        assert!((cli.scale - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn default_output_sits_beside_input() {
        let cli = parse(&["--input", "pictures/photo.jpg"]).unwrap();
        assert_eq!(output_path(&cli), PathBuf::from("pictures/photo.svg"));

        let cli = parse(&["--input", "photo.jpg", "--output", "out/m.svg"]).unwrap();
        assert_eq!(output_path(&cli), PathBuf::from("out/m.svg"));
    }

    #[test]
    fn flags_build_config_and_render_options() {
        let cli = parse(&[
            "--input",
            "a.png",
            "--seed-density",
            "500",
            "--seed-value",
            "abc",
            "--seed-strategy",
            "maxAspect",
            "--color-mode",
            "cellAverage",
            "--combine-same-color-cells",
            "true",
            "--skip-white-cells",
            "true",
            "--path-simplification-algorithm",
            "vw",
            "--path-simplification-strength",
            "0.4",
            "--show-voronoi",
            "false",
        ])
        .unwrap();

        let config = config_from_cli(&cli).unwrap();
        assert!((config.seed_density - 500.0).abs() < f64::EPSILON);
        assert_eq!(config.seed_value, "abc");
        assert_eq!(config.seed_strategy, SeedStrategy::MaxAspect);
        assert_eq!(config.color_mode, ColorMode::CellAverage);

        let options = render_options_from_cli(&cli);
        assert!(options.combine_same_color);
        assert!(options.skip_white);
        assert!(!options.black_and_white);
        assert_eq!(options.simplify.algorithm, SimplifyAlgorithm::Vw);
        assert!((options.simplify.strength - 0.4).abs() < f64::EPSILON);
        assert!(!cli.show_voronoi);
    }

    #[test]
    fn config_json_overrides_pipeline_flags() {
        let cli = parse(&[
            "--input",
            "a.png",
            "--seed-density",
            "500",
            "--config-json",
            r#"{"seed_density": 42.0, "seed_value": "x"}"#,
        ])
        .unwrap();
        let config = config_from_cli(&cli).unwrap();
        assert!((config.seed_density - 42.0).abs() < f64::EPSILON);
        assert_eq!(config.seed_value, "x");
        assert!((config.render_scale - PipelineConfig::DEFAULT_RENDER_SCALE).abs() < f64::EPSILON);
    }

    #[test]
    fn malformed_config_json_is_reported() {
        let cli = parse(&["--input", "a.png", "--config-json", "{not json"]).unwrap();
        let err = config_from_cli(&cli).unwrap_err();
        assert!(err.starts_with("Error parsing --config-json"));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for args in [
            ["--seed-density", "0"],
            ["--seed-density", "-3"],
            ["--scale", "0"],
            ["--path-simplification-strength", "1.5"],
            ["--path-simplification-min-path-size01", "-0.1"],
            ["--seed-point-radius", "2"],
            ["--seed-strategy", "square"],
            ["--path-simplification-algorithm", "chaikin"],
        ] {
            let mut full = vec!["--input", "a.png"];
            full.extend(args);
            assert!(parse(&full).is_err(), "{args:?} should be rejected");
        }
    }

    #[test]
    fn boolean_flags_take_explicit_values() {
        assert!(parse(&["--input", "a.png", "--show-seeds"]).is_err());
        let cli = parse(&["--input", "a.png", "--show-seeds", "true"]).unwrap();
        assert!(cli.show_seeds);
    }
}
