//! Merge same-colored cells into boundary rings.
//!
//! Cells of one color are stitched along shared edges: vertices are
//! snapped to an integer lattice, every polygon edge is counted with a
//! sign for its direction, and edges used in both directions (interior
//! edges between two cells of the group) cancel. What survives is the
//! group's boundary, which is then walked into closed rings. Outer
//! boundaries and holes come out with opposite orientation, so the
//! rings render correctly under the even-odd fill rule.

use std::collections::HashMap;

use geo::{Area, LineString};
use serde::{Deserialize, Serialize};

use crate::types::{CellColor, Point, Polygon};

/// Options for [`merge_cells_by_color`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeOptions {
    /// Lattice spacing used to decide whether two vertices coincide.
    pub tolerance: f64,
}

impl MergeOptions {
    /// Default vertex snapping tolerance.
    pub const DEFAULT_TOLERANCE: f64 = 1e-6;
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            tolerance: Self::DEFAULT_TOLERANCE,
        }
    }
}

/// The merged boundary of every cell sharing one color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedBoundary {
    /// The shared color, alpha included.
    pub color: CellColor,
    /// Closed rings (outer boundaries and holes), each with at least
    /// three vertices and no repeated closing vertex.
    pub rings: Vec<Polygon>,
}

impl MergedBoundary {
    /// Area covered by the rings under the even-odd rule.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.rings
            .iter()
            .map(|ring| {
                let exterior: LineString<f64> =
                    ring.points().iter().map(|p| (p.x, p.y)).collect::<Vec<_>>().into();
                geo::Polygon::new(exterior, Vec::new()).signed_area()
            })
            .sum::<f64>()
            .abs()
    }

    /// Total vertex count across all rings.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.rings.iter().map(Polygon::len).sum()
    }
}

/// A vertex snapped to the tolerance lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct VertexKey {
    x: i64,
    y: i64,
}

impl VertexKey {
    #[allow(clippy::cast_possible_truncation)]
    fn quantize(p: Point, tolerance: f64) -> Self {
        // `as` saturates, so far-off coordinates clamp instead of wrapping.
        Self {
            x: (p.x / tolerance).round() as i64,
            y: (p.y / tolerance).round() as i64,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn dequantize(self, tolerance: f64) -> Point {
        Point::new(self.x as f64 * tolerance, self.y as f64 * tolerance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Edge {
    from: VertexKey,
    to: VertexKey,
}

impl Edge {
    #[allow(clippy::cast_precision_loss)]
    fn direction(self) -> (f64, f64) {
        (
            (self.to.x - self.from.x) as f64,
            (self.to.y - self.from.y) as f64,
        )
    }
}

/// Snap a polygon to the lattice and clean it up.
///
/// Drops consecutive duplicates and a closing vertex equal to the first,
/// then orients the ring so its lattice area is non-negative. Returns
/// `None` if fewer than three vertices remain.
fn sanitize(points: &[Point], tolerance: f64) -> Option<Vec<VertexKey>> {
    let mut keys: Vec<VertexKey> = points
        .iter()
        .map(|&p| VertexKey::quantize(p, tolerance))
        .collect();
    keys.dedup();
    if keys.len() > 1 && keys.first() == keys.last() {
        keys.pop();
    }
    if keys.len() < 3 {
        return None;
    }
    if lattice_area2(&keys) < 0 {
        keys.reverse();
    }
    Some(keys)
}

/// Twice the signed shoelace area of a lattice ring.
fn lattice_area2(keys: &[VertexKey]) -> i128 {
    let n = keys.len();
    (0..n)
        .map(|i| {
            let (a, b) = (keys[i], keys[(i + 1) % n]);
            i128::from(a.x) * i128::from(b.y) - i128::from(b.x) * i128::from(a.y)
        })
        .sum()
}

/// Boundary edges of a group of rings.
///
/// Each undirected edge accumulates +1 when seen in canonical direction
/// (smaller key first) and -1 otherwise. An edge with net count `c`
/// contributes `|c|` directed copies oriented by the sign of `c`.
/// Output order follows first appearance, so results are reproducible.
fn boundary_edges(rings: &[Vec<VertexKey>]) -> Vec<Edge> {
    let mut index: HashMap<(VertexKey, VertexKey), usize> = HashMap::new();
    let mut counts: Vec<((VertexKey, VertexKey), i64)> = Vec::new();

    for ring in rings {
        for (i, &from) in ring.iter().enumerate() {
            let to = ring[(i + 1) % ring.len()];
            let (key, sign) = if from <= to {
                ((from, to), 1)
            } else {
                ((to, from), -1)
            };
            let slot = *index.entry(key).or_insert_with(|| {
                counts.push((key, 0));
                counts.len() - 1
            });
            counts[slot].1 += sign;
        }
    }

    let mut edges = Vec::new();
    for ((a, b), count) in counts {
        let edge = if count > 0 {
            Edge { from: a, to: b }
        } else {
            Edge { from: b, to: a }
        };
        for _ in 0..count.unsigned_abs() {
            edges.push(edge);
        }
    }
    edges
}

/// Walk boundary edges into closed rings.
///
/// From each unused edge, keep taking the unused outgoing edge with the
/// largest signed turn until the walk returns to its start vertex.
fn trace_rings(edges: &[Edge]) -> Vec<Vec<VertexKey>> {
    let mut outgoing: HashMap<VertexKey, Vec<usize>> = HashMap::new();
    for (i, edge) in edges.iter().enumerate() {
        outgoing.entry(edge.from).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let max_steps = edges.len() * 4;
    let mut rings = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        let origin = edges[start].from;
        let mut ring = vec![origin];
        let mut current = start;
        for _ in 0..max_steps {
            if used[current] {
                break;
            }
            used[current] = true;
            let edge = edges[current];
            ring.push(edge.to);
            if edge.to == origin {
                break;
            }
            let (px, py) = edge.direction();
            let next = outgoing.get(&edge.to).and_then(|candidates| {
                let mut best: Option<(usize, f64)> = None;
                for &c in candidates {
                    if used[c] {
                        continue;
                    }
                    let (nx, ny) = edges[c].direction();
                    let turn = px.mul_add(ny, -(py * nx)).atan2(px.mul_add(nx, py * ny));
                    if best.is_none_or(|(_, t)| turn > t) {
                        best = Some((c, turn));
                    }
                }
                best.map(|(c, _)| c)
            });
            match next {
                Some(c) => current = c,
                None => break,
            }
        }

        if ring.len() < 4 || ring.last() != Some(&origin) {
            continue;
        }
        ring.pop();
        rings.push(ring);
    }
    rings
}

/// Merge cells of identical color into boundary rings.
///
/// `polygons[i]` is paired with `colors[i]`. Groups are keyed by the
/// full RGBA color and emitted in order of first appearance. Polygons
/// with fewer than three vertices are ignored, and a group whose edges
/// all cancel or whose walk closes no ring is omitted.
#[must_use = "returns the merged boundaries without side effects"]
pub fn merge_cells_by_color(
    polygons: &[Polygon],
    colors: &[CellColor],
    options: MergeOptions,
) -> Vec<MergedBoundary> {
    let tolerance = if options.tolerance.is_finite() && options.tolerance > 0.0 {
        options.tolerance
    } else {
        MergeOptions::DEFAULT_TOLERANCE
    };

    let mut group_index: HashMap<CellColor, usize> = HashMap::new();
    let mut groups: Vec<(CellColor, Vec<Vec<VertexKey>>)> = Vec::new();
    for (polygon, &color) in polygons.iter().zip(colors) {
        if polygon.len() < 3 {
            continue;
        }
        let Some(ring) = sanitize(polygon.points(), tolerance) else {
            continue;
        };
        let slot = *group_index.entry(color).or_insert_with(|| {
            groups.push((color, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(ring);
    }

    groups
        .into_iter()
        .filter_map(|(color, rings)| {
            let edges = boundary_edges(&rings);
            if edges.is_empty() {
                return None;
            }
            let traced = trace_rings(&edges);
            if traced.is_empty() {
                return None;
            }
            Some(MergedBoundary {
                color,
                rings: traced
                    .into_iter()
                    .map(|keys| {
                        Polygon::new(keys.into_iter().map(|k| k.dequantize(tolerance)).collect())
                    })
                    .collect(),
            })
        })
        .collect()
}
