//! Reumann-Witkam simplification of closed rings.

use crate::simplify::perpendicular_distance;
use crate::types::Point;

/// Single-pass strip simplification of an open path.
///
/// Walking from an anchor, point `i` is kept (and becomes the new
/// anchor) when it lies farther than `epsilon` from the line through
/// the anchor and point `i + 1`. Endpoints are always kept.
fn simplify_open(points: &[Point], epsilon: f64) -> Vec<Point> {
    let n = points.len();
    if n <= 2 {
        return points.to_vec();
    }

    let mut simplified = vec![points[0]];
    let mut anchor = points[0];
    for i in 1..n - 1 {
        if perpendicular_distance(points[i], anchor, points[i + 1]) > epsilon {
            simplified.push(points[i]);
            anchor = points[i];
        }
    }
    simplified.push(points[n - 1]);
    simplified
}

/// Reumann-Witkam on a closed ring.
///
/// The ring is closed by repeating its first vertex, simplified as an
/// open path and reopened. Small rings, non-positive `epsilon`, and
/// results under three vertices all return the ring unchanged.
#[must_use = "returns the simplified ring"]
pub fn simplify_rw_closed(ring: &[Point], epsilon: f64) -> Vec<Point> {
    if ring.len() <= 3 || epsilon <= 0.0 || epsilon.is_nan() {
        return ring.to_vec();
    }

    let mut open = ring.to_vec();
    open.push(ring[0]);
    let mut simplified = simplify_open(&open, epsilon);
    simplified.pop();

    if simplified.len() < 3 {
        return ring.to_vec();
    }
    simplified
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(coords: &[(f64, f64)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn drops_points_inside_strip() {
        let input = ring(&[
            (0.0, 0.0),
            (4.0, 0.1),
            (8.0, 0.0),
            (8.0, 8.0),
            (0.0, 8.0),
        ]);
        let out = simplify_rw_closed(&input, 0.5);
        assert_eq!(out, ring(&[(0.0, 0.0), (8.0, 0.0), (8.0, 8.0), (0.0, 8.0)]));
    }

    #[test]
    fn zero_epsilon_is_identity() {
        let input = ring(&[(0.0, 0.0), (4.0, 0.1), (8.0, 0.0), (8.0, 8.0)]);
        assert_eq!(simplify_rw_closed(&input, 0.0), input);
    }

    #[test]
    fn collapse_reverts_to_original() {
        let input = ring(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]);
        assert_eq!(simplify_rw_closed(&input, 10.0), input);
    }

    #[test]
    fn second_pass_never_adds_points() {
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
        for epsilon in [0.3, 0.6, 1.0, 2.0] {
            let once = simplify_rw_closed(&input, epsilon);
            let twice = simplify_rw_closed(&once, epsilon);
            assert!(twice.len() <= once.len());
            assert!(twice.len() >= 3);
            assert!(twice.iter().all(|p| once.contains(p)));
        }
        let once = simplify_rw_closed(&input, 0.6);
        assert_eq!(simplify_rw_closed(&once, 0.6), once);
    }

    #[test]
    fn open_path_keeps_endpoints() {
        let path = ring(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        let out = simplify_open(&path, 0.5);
        assert_eq!(out, ring(&[(0.0, 0.0), (2.0, 0.0)]));
    }
}
