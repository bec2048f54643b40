//! Visvalingam-Whyatt simplification of closed rings.
//!
//! Vertices live in an index arena linked into a circular list. The
//! vertex whose triangle with its neighbors has the smallest area is
//! removed repeatedly until that area exceeds the threshold or three
//! vertices remain. A min-heap with per-vertex version stamps finds the
//! smallest area; entries made stale by a neighbor's removal are skipped.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::types::Point;

#[derive(Debug, Clone, Copy)]
struct Node {
    point: Point,
    prev: usize,
    next: usize,
    removed: bool,
    version: u32,
}

/// Heap entry ordered so the smallest area (then lowest index) pops first.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    area: f64,
    index: usize,
    version: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .area
            .total_cmp(&self.area)
            .then_with(|| other.index.cmp(&self.index))
    }
}

fn triangle_area(a: Point, b: Point, c: Point) -> f64 {
    (a.x.mul_add(b.y - c.y, b.x.mul_add(c.y - a.y, c.x * (a.y - b.y))) / 2.0).abs()
}

fn node_area(nodes: &[Node], i: usize) -> f64 {
    let node = nodes[i];
    triangle_area(nodes[node.prev].point, node.point, nodes[node.next].point)
}

/// Simplify a closed ring by effective-area elimination.
///
/// Rings of three or fewer vertices, and non-positive thresholds, leave
/// the ring unchanged. Surviving vertices keep their original order.
#[must_use = "returns the simplified ring"]
pub fn simplify_vw_closed(ring: &[Point], area_threshold: f64) -> Vec<Point> {
    let n = ring.len();
    if n <= 3 || area_threshold <= 0.0 || area_threshold.is_nan() {
        return ring.to_vec();
    }

    let mut nodes: Vec<Node> = ring
        .iter()
        .enumerate()
        .map(|(i, &point)| Node {
            point,
            prev: (i + n - 1) % n,
            next: (i + 1) % n,
            removed: false,
            version: 0,
        })
        .collect();

    let mut heap: BinaryHeap<Candidate> = (0..n)
        .map(|index| Candidate {
            area: node_area(&nodes, index),
            index,
            version: 0,
        })
        .collect();

    let mut active = n;
    while active > 3 {
        let Some(best) = heap.pop() else {
            break;
        };
        let node = nodes[best.index];
        if node.removed || node.version != best.version {
            continue;
        }
        if best.area > area_threshold {
            break;
        }

        let (prev, next) = (node.prev, node.next);
        nodes[prev].next = next;
        nodes[next].prev = prev;
        nodes[best.index].removed = true;
        active -= 1;

        for neighbor in [prev, next] {
            nodes[neighbor].version += 1;
            heap.push(Candidate {
                area: node_area(&nodes, neighbor),
                index: neighbor,
                version: nodes[neighbor].version,
            });
        }
    }

    nodes
        .iter()
        .filter(|node| !node.removed)
        .map(|node| node.point)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(coords: &[(f64, f64)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn triangle_area_of_right_triangle() {
        let a = triangle_area(Point::new(0.0, 0.0), Point::new(4.0, 0.0), Point::new(0.0, 3.0));
        assert!((a - 6.0).abs() < 1e-12);
    }

    #[test]
    fn zero_threshold_is_identity() {
        let input = ring(&[(0.0, 0.0), (5.0, 0.1), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        assert_eq!(simplify_vw_closed(&input, 0.0), input);
    }

    #[test]
    fn removes_nearly_collinear_vertex() {
        let input = ring(&[(0.0, 0.0), (5.0, 0.1), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        // Triangle at (5, 0.1) has area 0.5; every other vertex has 25 or more.
        let out = simplify_vw_closed(&input, 1.0);
        assert_eq!(out, ring(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]));
    }

    #[test]
    fn stops_at_three_vertices() {
        let input = ring(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (5.0, 12.0), (0.0, 10.0)]);
        let out = simplify_vw_closed(&input, f64::MAX);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn neighbor_areas_are_refreshed() {
        // Removing (1, 0.5) leaves (2, 0) collinear with its neighbors;
        // its stale area of 4.5 would otherwise stop the loop.
        let input = ring(&[
            (0.0, 0.0),
            (1.0, 0.5),
            (2.0, 0.0),
            (20.0, 0.0),
            (20.0, 20.0),
            (0.0, 20.0),
        ]);
        let out = simplify_vw_closed(&input, 1.0);
        assert_eq!(out, ring(&[(0.0, 0.0), (20.0, 0.0), (20.0, 20.0), (0.0, 20.0)]));
    }

    #[test]
    fn second_pass_changes_nothing() {
        let input = ring(&[
            (0.0, 0.0),
            (3.0, 0.4),
            (6.0, 0.0),
            (9.0, 1.5),
            (12.0, 0.0),
            (12.0, 6.0),
            (11.2, 9.0),
            (12.0, 12.0),
            (6.0, 11.0),
            (0.0, 12.0),
            (0.8, 6.0),
        ]);
        for threshold in [1.5, 3.0, 8.0, 40.0] {
            let once = simplify_vw_closed(&input, threshold);
            assert!(once.len() < input.len());
            assert_eq!(simplify_vw_closed(&once, threshold), once);
        }
    }

    #[test]
    fn small_rings_pass_through() {
        let input = ring(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
        assert_eq!(simplify_vw_closed(&input, 100.0), input);
    }
}
