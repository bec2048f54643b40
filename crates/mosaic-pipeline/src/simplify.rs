//! Simplification of merged boundary rings.
//!
//! Each ring gets thresholds derived from its own bounding-box diagonal
//! (optionally normalized against the mean ring size across all groups)
//! and is reduced by one of three closed-ring algorithms:
//! Ramer-Douglas-Peucker (here), Visvalingam-Whyatt ([`crate::vw`]) or
//! Reumann-Witkam ([`crate::rw`]). A final size filter drops rings whose
//! bounding box is smaller than a fraction of the image.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::merge::MergedBoundary;
use crate::types::{Dimensions, PipelineError, Point, Polygon};

/// Which ring simplification algorithm to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimplifyAlgorithm {
    /// Leave rings untouched.
    #[default]
    None,
    /// Ramer-Douglas-Peucker: distance tolerance, keeps extreme points.
    Rdp,
    /// Visvalingam-Whyatt: removes the smallest-area vertices first.
    Vw,
    /// Reumann-Witkam: single pass along a moving strip.
    Rw,
}

impl FromStr for SimplifyAlgorithm {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "rdp" => Ok(Self::Rdp),
            "vw" => Ok(Self::Vw),
            "rw" => Ok(Self::Rw),
            other => Err(PipelineError::InvalidConfig(format!(
                "unknown simplification algorithm '{other}' (expected none, rdp, vw or rw)"
            ))),
        }
    }
}

impl fmt::Display for SimplifyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Rdp => "rdp",
            Self::Vw => "vw",
            Self::Rw => "rw",
        })
    }
}

/// Options controlling boundary simplification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplifyOptions {
    /// Algorithm to apply.
    pub algorithm: SimplifyAlgorithm,
    /// Simplification strength, clamped to `[0, 1]`. Zero disables
    /// simplification.
    pub strength: f64,
    /// Scale thresholds so small and large rings simplify alike
    /// relative to the average ring.
    pub size_compensation: bool,
    /// Minimum ring extent as a fraction of `min(width, height)`,
    /// clamped to `[0, 1]`.
    pub min_path_size01: f64,
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        Self {
            algorithm: SimplifyAlgorithm::None,
            strength: 0.0,
            size_compensation: false,
            min_path_size01: 0.0,
        }
    }
}

impl SimplifyOptions {
    /// Strength clamped to `[0, 1]`; NaN counts as zero.
    #[must_use]
    pub fn clamped_strength(&self) -> f64 {
        clamp01(self.strength)
    }

    /// Whether rings will actually be simplified.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.clamped_strength() > 0.0 && self.algorithm != SimplifyAlgorithm::None
    }

    /// Absolute minimum ring extent in pixels for an image.
    #[must_use]
    pub fn min_path_size(&self, dimensions: Dimensions) -> f64 {
        clamp01(self.min_path_size01) * f64::from(dimensions.min_side())
    }
}

fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Per-ring thresholds handed to the algorithms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Distance tolerance for RDP and RW.
    pub epsilon: f64,
    /// Triangle-area tolerance for VW.
    pub area: f64,
}

impl Thresholds {
    /// Derive thresholds for one ring.
    ///
    /// `scale` is the ring's [`ring_scale`]; `reference_scale` is the mean
    /// scale over every ring being simplified, used only with
    /// `size_compensation`.
    #[must_use]
    pub fn for_ring(
        algorithm: SimplifyAlgorithm,
        strength: f64,
        scale: f64,
        reference_scale: f64,
        size_compensation: bool,
    ) -> Self {
        let multiplier = if algorithm == SimplifyAlgorithm::Vw {
            4.0
        } else {
            1.0
        };
        let tuned = strength * multiplier;
        let raw_epsilon = scale * tuned * 0.05;
        let raw_area = (scale * tuned * 0.02).powi(2);
        let compensation = if size_compensation {
            reference_scale / scale
        } else {
            1.0
        };
        Self {
            epsilon: raw_epsilon * compensation,
            area: raw_area * compensation * compensation,
        }
    }
}

fn extent(ring: &[Point]) -> (f64, f64) {
    let Some(&first) = ring.first() else {
        return (0.0, 0.0);
    };
    let (lo, hi) = ring.iter().fold((first, first), |(lo, hi), p| {
        (
            Point::new(lo.x.min(p.x), lo.y.min(p.y)),
            Point::new(hi.x.max(p.x), hi.y.max(p.y)),
        )
    });
    (hi.x - lo.x, hi.y - lo.y)
}

/// Bounding-box diagonal of a ring, floored at 1.
#[must_use]
pub fn ring_scale(ring: &[Point]) -> f64 {
    let (dx, dy) = extent(ring);
    dx.hypot(dy).max(1.0)
}

/// Larger side of a ring's bounding box.
#[must_use]
pub fn ring_max_dimension(ring: &[Point]) -> f64 {
    let (dx, dy) = extent(ring);
    dx.max(dy)
}

/// Simplify one closed ring with the given algorithm.
///
/// Rings of three or fewer vertices are returned unchanged, as is any
/// ring the algorithm would reduce below three vertices.
#[must_use = "returns the simplified ring"]
pub fn simplify_ring(ring: &[Point], algorithm: SimplifyAlgorithm, thresholds: Thresholds) -> Vec<Point> {
    if ring.len() <= 3 {
        return ring.to_vec();
    }
    let simplified = match algorithm {
        SimplifyAlgorithm::None => return ring.to_vec(),
        SimplifyAlgorithm::Rdp => simplify_rdp_closed(ring, thresholds.epsilon),
        SimplifyAlgorithm::Vw => crate::vw::simplify_vw_closed(ring, thresholds.area),
        SimplifyAlgorithm::Rw => crate::rw::simplify_rw_closed(ring, thresholds.epsilon),
    };
    if simplified.len() >= 3 {
        simplified
    } else {
        ring.to_vec()
    }
}

/// Simplify every ring of every group, then drop rings below the
/// minimum size.
///
/// Groups left without rings are omitted. The minimum size filter
/// applies even when simplification itself is disabled.
#[must_use = "returns the simplified boundaries"]
pub fn simplify_merged_boundaries(
    groups: &[MergedBoundary],
    options: &SimplifyOptions,
    dimensions: Dimensions,
) -> Vec<MergedBoundary> {
    let strength = options.clamped_strength();
    let active = options.is_active();
    let min_path_size = options.min_path_size(dimensions);

    let reference_scale = if active {
        let scales: Vec<f64> = groups
            .iter()
            .flat_map(|g| g.rings.iter().map(|r| ring_scale(r.points())))
            .collect();
        if scales.is_empty() {
            1.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let n = scales.len() as f64;
            scales.iter().sum::<f64>() / n
        }
    } else {
        1.0
    };

    groups
        .iter()
        .filter_map(|group| {
            let rings: Vec<Polygon> = group
                .rings
                .iter()
                .map(|ring| {
                    if !active {
                        return ring.clone();
                    }
                    let points = ring.points();
                    let thresholds = Thresholds::for_ring(
                        options.algorithm,
                        strength,
                        ring_scale(points),
                        reference_scale,
                        options.size_compensation,
                    );
                    Polygon::new(simplify_ring(points, options.algorithm, thresholds))
                })
                .filter(|ring| ring_max_dimension(ring.points()) >= min_path_size)
                .collect();
            (!rings.is_empty()).then(|| MergedBoundary {
                color: group.color,
                rings,
            })
        })
        .collect()
}

/// Ramer-Douglas-Peucker on a closed ring.
///
/// The ring is closed by appending its first vertex, simplified as an
/// open path, and reopened. A non-positive `epsilon` only removes exact
/// consecutive duplicates.
///
/// Once `epsilon` reaches the ring's extent every vertex lies within
/// `epsilon` of the zero-length closing chord, so the open-path pass
/// always collapses to the start vertex. Reverting to the input there
/// would turn every large `epsilon` into a no-op. Instead the ring
/// collapses to its most significant triangle: the start vertex, the
/// vertex farthest from it, and the vertex farthest from that chord,
/// kept in ring order. The triangle is made of input vertices only, so
/// the result still never has fewer than three vertices. Fully
/// collinear rings have no such triangle and are returned unchanged.
#[must_use = "returns the simplified ring"]
pub fn simplify_rdp_closed(ring: &[Point], epsilon: f64) -> Vec<Point> {
    if ring.len() <= 3 {
        return ring.to_vec();
    }
    if epsilon <= 0.0 || epsilon.is_nan() {
        let mut deduped = ring.to_vec();
        deduped.dedup();
        if deduped.len() > 1 && deduped.first() == deduped.last() {
            deduped.pop();
        }
        return if deduped.len() >= 3 {
            deduped
        } else {
            ring.to_vec()
        };
    }

    let mut open = ring.to_vec();
    open.push(ring[0]);

    let mut kept = vec![false; open.len()];
    kept[0] = true;
    kept[open.len() - 1] = true;
    rdp_recurse(&open, 0, open.len() - 1, epsilon, &mut kept);

    let mut simplified: Vec<Point> = open
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect();
    simplified.pop();

    if simplified.len() >= 3 {
        simplified
    } else {
        minimal_triangle(ring).unwrap_or_else(|| ring.to_vec())
    }
}

/// Start vertex, the vertex farthest from it, and the vertex farthest
/// from their chord, in ring order. `None` if the ring is collinear.
fn minimal_triangle(ring: &[Point]) -> Option<Vec<Point>> {
    let start = ring[0];
    let (far, far_dist) = ring
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, &p)| (i, p.distance(start)))
        .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });
    if far_dist <= 0.0 {
        return None;
    }
    let (apex, apex_dist) = ring
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != 0 && i != far)
        .map(|(i, &p)| (i, perpendicular_distance(p, start, ring[far])))
        .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });
    if apex_dist <= 0.0 {
        return None;
    }
    let mut indices = [0, far, apex];
    indices.sort_unstable();
    Some(indices.iter().map(|&i| ring[i]).collect())
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line segment between them. If that distance exceeds `tolerance`, the
/// point is kept and both sub-segments are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Distance from `p` to the line through `a` and `b`.
///
/// Uses the formula: |cross(b-a, p-a)| / |b-a|.
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
pub(crate) fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}
