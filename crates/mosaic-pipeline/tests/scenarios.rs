//! End-to-end behavior of the public pipeline API.

#![allow(clippy::unwrap_used)]

use mosaic_pipeline::simplify::simplify_rdp_closed;
use mosaic_pipeline::{
    CellColor, CellRenderOptions, Dimensions, MergeOptions, Point, Polygon, RgbaImage,
    SeedStrategy, SimplifyAlgorithm, SimplifyOptions, compute_cell_render, compute_seed_count,
    merge_cells_by_color, process, should_render, simplify_merged_boundaries, to_rendered_color,
};

const RED: CellColor = CellColor::new(200, 40, 40, 255);
const BLUE: CellColor = CellColor::new(30, 60, 220, 255);
const WHITE: CellColor = CellColor::new(255, 255, 255, 255);

fn unit_square(x: f64, y: f64) -> Polygon {
    Polygon::new(vec![
        Point::new(x, y),
        Point::new(x + 1.0, y),
        Point::new(x + 1.0, y + 1.0),
        Point::new(x, y + 1.0),
    ])
}

#[test]
fn seed_count_is_resolution_independent() {
    let hd = compute_seed_count(Dimensions::new(1920, 1080), 100.0, SeedStrategy::Aspect);
    let uhd = compute_seed_count(Dimensions::new(3840, 2160), 100.0, SeedStrategy::Aspect);
    assert_eq!(hd, uhd);
    assert_eq!(hd, 178);
}

#[test]
fn two_cells_merge_into_a_rectangle() {
    let merged = merge_cells_by_color(
        &[unit_square(0.0, 0.0), unit_square(1.0, 0.0)],
        &[RED, RED],
        MergeOptions::default(),
    );
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].rings.len(), 1);
    assert_eq!(merged[0].rings[0].len(), 6);
    assert!((merged[0].area() - 2.0).abs() < 1e-9);
}

#[test]
fn surrounded_cell_leaves_a_matching_hole() {
    let mut cells = Vec::new();
    let mut colors = Vec::new();
    for row in 0..3 {
        for col in 0..3 {
            cells.push(unit_square(f64::from(col), f64::from(row)));
            colors.push(if row == 1 && col == 1 { BLUE } else { RED });
        }
    }
    let merged = merge_cells_by_color(&cells, &colors, MergeOptions::default());
    assert_eq!(merged.len(), 2);

    let center = merged.iter().find(|m| m.color == BLUE).unwrap();
    assert_eq!(center.rings.len(), 1);
    assert_eq!(center.rings[0].len(), 4);

    let frame = merged.iter().find(|m| m.color == RED).unwrap();
    assert_eq!(frame.rings.len(), 2);
    let hole = frame.rings.iter().find(|r| r.len() == 4).unwrap();
    let mut hole_points: Vec<(f64, f64)> = hole.points().iter().map(|p| (p.x, p.y)).collect();
    let mut center_points: Vec<(f64, f64)> =
        center.rings[0].points().iter().map(|p| (p.x, p.y)).collect();
    hole_points.sort_by(|a, b| a.partial_cmp(b).unwrap());
    center_points.sort_by(|a, b| a.partial_cmp(b).unwrap());
    for (h, c) in hole_points.iter().zip(&center_points) {
        assert!((h.0 - c.0).abs() < 1e-9 && (h.1 - c.1).abs() < 1e-9);
    }
    assert!((frame.area() - 8.0).abs() < 1e-9);
}

/// Ring as lattice points, counter-clockwise, starting at its smallest point.
fn normalized_ring(points: &[Point]) -> Vec<(i64, i64)> {
    #[allow(clippy::cast_possible_truncation)]
    let mut keys: Vec<(i64, i64)> = points
        .iter()
        .map(|p| ((p.x * 1e6).round() as i64, (p.y * 1e6).round() as i64))
        .collect();
    let twice_area: i128 = keys
        .iter()
        .zip(keys.iter().cycle().skip(1))
        .map(|(a, b)| i128::from(a.0) * i128::from(b.1) - i128::from(b.0) * i128::from(a.1))
        .sum();
    if twice_area < 0 {
        keys.reverse();
    }
    let start = keys
        .iter()
        .enumerate()
        .min_by_key(|(_, k)| **k)
        .map_or(0, |(i, _)| i);
    keys.rotate_left(start);
    keys
}

fn polygon(points: &[(f64, f64)]) -> Polygon {
    Polygon::new(points.iter().map(|&(x, y)| Point::new(x, y)).collect())
}

#[test]
fn different_tilings_merge_to_the_same_ring() {
    // Two 1x2 halves carrying the midpoints of their long sides.
    let halves = [
        polygon(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (1.0, 2.0), (0.0, 2.0), (0.0, 1.0)]),
        polygon(&[(1.0, 0.0), (2.0, 0.0), (2.0, 1.0), (2.0, 2.0), (1.0, 2.0), (1.0, 1.0)]),
    ];
    let quarters = [
        unit_square(0.0, 0.0),
        unit_square(1.0, 0.0),
        unit_square(0.0, 1.0),
        unit_square(1.0, 1.0),
    ];
    let mut reversed = quarters.clone();
    reversed.reverse();

    let merge_one_color = |cells: &[Polygon]| {
        let merged = merge_cells_by_color(cells, &vec![RED; cells.len()], MergeOptions::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].rings.len(), 1);
        assert!((merged[0].area() - 4.0).abs() < 1e-9);
        normalized_ring(merged[0].rings[0].points())
    };

    let coarse = merge_one_color(&halves);
    let fine = merge_one_color(&quarters);
    let fine_reversed = merge_one_color(&reversed);
    assert_eq!(coarse.len(), 8);
    assert_eq!(coarse, fine);
    assert_eq!(fine, fine_reversed);
}

#[test]
fn rdp_extremes() {
    let ring = vec![
        Point::new(0.0, 0.0),
        Point::new(5.0, 0.0),
        Point::new(5.0, 0.0),
        Point::new(10.0, 0.0),
        Point::new(10.0, 10.0),
        Point::new(5.0, 11.0),
        Point::new(0.0, 10.0),
    ];
    let mut deduped = ring.clone();
    deduped.dedup();
    assert_eq!(simplify_rdp_closed(&ring, 0.0), deduped);

    let diagonal = 10.0_f64.hypot(11.0);
    assert_eq!(simplify_rdp_closed(&ring, diagonal).len(), 3);
}

#[test]
fn white_filter_and_black_and_white() {
    assert!(!should_render(WHITE, true));
    assert!(should_render(WHITE, false));
    assert_eq!(
        to_rendered_color(CellColor::new(200, 200, 200, 255), true),
        WHITE
    );
}

#[test]
fn full_run_merges_two_color_image() {
    let image = RgbaImage::from_fn(60, 30, |x, _| {
        if x < 30 {
            image::Rgba([0, 0, 0, 255])
        } else {
            image::Rgba([255, 255, 255, 255])
        }
    });
    let output = process(
        &image,
        &mosaic_pipeline::PipelineConfig {
            seed_density: 40.0,
            ..mosaic_pipeline::PipelineConfig::default()
        },
    )
    .unwrap();

    let options = CellRenderOptions {
        combine_same_color: true,
        simplify: SimplifyOptions {
            algorithm: SimplifyAlgorithm::Vw,
            strength: 0.3,
            ..SimplifyOptions::default()
        },
        ..CellRenderOptions::default()
    };
    let render = compute_cell_render(&output, &options);
    let merged = render.merged_original.as_ref().unwrap();
    assert!(merged.len() <= 2);

    // Merged groups tile the image exactly.
    let total: f64 = merged.iter().map(mosaic_pipeline::MergedBoundary::area).sum();
    assert!((total - 1800.0).abs() < 1e-3, "total area {total}");

    let optimized = render.merged_optimized.as_ref().unwrap();
    for group in optimized {
        for ring in &group.rings {
            assert!(ring.len() >= 3);
        }
    }
}

#[test]
fn skipped_white_cells_contribute_no_edges() {
    let image = RgbaImage::from_fn(40, 40, |_, y| {
        if y < 20 {
            image::Rgba([255, 255, 255, 255])
        } else {
            image::Rgba([10, 10, 10, 255])
        }
    });
    let output = process(
        &image,
        &mosaic_pipeline::PipelineConfig {
            seed_density: 200.0,
            ..mosaic_pipeline::PipelineConfig::default()
        },
    )
    .unwrap();
    let options = CellRenderOptions {
        skip_white: true,
        combine_same_color: true,
        ..CellRenderOptions::default()
    };
    let render = compute_cell_render(&output, &options);
    for group in render.merged_original.as_ref().unwrap() {
        assert_ne!(group.color, WHITE);
    }
    assert!(render.colors.iter().all(|c| *c != WHITE));
}

#[test]
fn simplifying_merged_cells_twice_never_adds_points() {
    // A dark disc on a light background gives wiggly merged boundaries.
    let image = RgbaImage::from_fn(80, 60, |x, y| {
        let (dx, dy) = (f64::from(x) - 40.0, f64::from(y) - 30.0);
        if dx.hypot(dy) < 20.0 {
            image::Rgba([20, 20, 20, 255])
        } else {
            image::Rgba([240, 240, 240, 255])
        }
    });
    let output = process(
        &image,
        &mosaic_pipeline::PipelineConfig {
            seed_density: 300.0,
            ..mosaic_pipeline::PipelineConfig::default()
        },
    )
    .unwrap();
    let merged = merge_cells_by_color(
        &output.cell_polygons,
        &output.cell_colors,
        MergeOptions::default(),
    );
    assert!(merged.len() >= 2);

    for algorithm in [SimplifyAlgorithm::Rdp, SimplifyAlgorithm::Vw, SimplifyAlgorithm::Rw] {
        for size_compensation in [false, true] {
            let options = SimplifyOptions {
                algorithm,
                strength: 0.5,
                size_compensation,
                ..SimplifyOptions::default()
            };
            let once = simplify_merged_boundaries(&merged, &options, output.dimensions);
            let twice = simplify_merged_boundaries(&once, &options, output.dimensions);
            assert_eq!(once.len(), twice.len());
            for (a, b) in once.iter().zip(&twice) {
                assert_eq!(a.rings.len(), b.rings.len());
                for (ring_a, ring_b) in a.rings.iter().zip(&b.rings) {
                    assert!(ring_b.len() <= ring_a.len(), "{algorithm} grew a ring");
                    assert!(ring_b.len() >= 3, "{algorithm} left {} vertices", ring_b.len());
                }
            }
        }
    }
}
