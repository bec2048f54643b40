//! Voronoi tessellation of the image rectangle.
//!
//! The Delaunay backend triangulates the seeds with `delaunator`, reads
//! each Voronoi cell off as the circumcenters of the triangles around
//! its site, and clips the cell to `[0, width] x [0, height]`. An
//! R-tree over the sites answers "which cell owns this pixel".

use std::collections::HashSet;

use delaunator::{EMPTY, Triangulation, next_halfedge};
use rstar::RTree;
use rstar::primitives::GeomWithData;
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, PipelineError, Point, Polygon};

/// Helper sites are placed this many image extents from the center so
/// every real cell is bounded before clipping.
const HELPER_DISTANCE: f64 = 10.0;

/// Selects which tessellation backend builds the cell polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TessellatorKind {
    /// Delaunay triangulation via `delaunator`, dualized into Voronoi
    /// cells and clipped to the image rectangle.
    #[default]
    #[serde(rename = "delaunay")]
    Delaunay,
}

/// Trait for tessellation strategies.
///
/// Input: seed positions in pixel space and the image size.
/// Output: one clipped polygon per seed plus a point locator.
pub trait Tessellator {
    /// Build the Voronoi diagram of `sites` over the image rectangle.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Tessellation`] if a site is not finite or
    /// the backend cannot triangulate the input.
    fn tessellate(
        &self,
        sites: &[Point],
        dimensions: Dimensions,
    ) -> Result<Tessellation, PipelineError>;
}

impl Tessellator for TessellatorKind {
    fn tessellate(
        &self,
        sites: &[Point],
        dimensions: Dimensions,
    ) -> Result<Tessellation, PipelineError> {
        match *self {
            Self::Delaunay => tessellate_delaunay(sites, dimensions),
        }
    }
}

type SiteEntry = GeomWithData<[f64; 2], usize>;

/// Clipped Voronoi cells, index-aligned with the sites they came from.
#[derive(Debug, Clone)]
pub struct Tessellation {
    polygons: Vec<Polygon>,
    locator: RTree<SiteEntry>,
}

impl Tessellation {
    /// A tessellation with no cells.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            polygons: Vec::new(),
            locator: RTree::new(),
        }
    }

    /// Number of cells (equal to the number of sites).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.polygons.len()
    }

    /// Returns `true` if there are no cells.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// All cell polygons in site order.
    #[must_use]
    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    /// The polygon of cell `index`, if it exists.
    #[must_use]
    pub fn polygon(&self, index: usize) -> Option<&Polygon> {
        self.polygons.get(index)
    }

    /// Consumes the tessellation and returns the cell polygons.
    #[must_use]
    pub fn into_polygons(self) -> Vec<Polygon> {
        self.polygons
    }

    /// Index of the cell containing `(x, y)`, i.e. the nearest site.
    ///
    /// Only sites that own a cell are candidates: coincident sites
    /// resolve to the first of them, and near-duplicates the
    /// triangulation skipped resolve to the site it kept. Returns `None`
    /// only when there are no sites.
    #[must_use]
    pub fn locate(&self, x: f64, y: f64) -> Option<usize> {
        self.locator.nearest_neighbor(&[x, y]).map(|entry| entry.data)
    }
}

fn tessellate_delaunay(
    sites: &[Point],
    dimensions: Dimensions,
) -> Result<Tessellation, PipelineError> {
    if sites.is_empty() {
        return Ok(Tessellation::empty());
    }
    if let Some(bad) = sites.iter().position(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(PipelineError::Tessellation(format!(
            "site {bad} has a non-finite coordinate"
        )));
    }

    // Only the first of several coincident sites gets a cell.
    let mut seen: HashSet<(u64, u64)> = HashSet::with_capacity(sites.len());
    let unique: Vec<usize> = sites
        .iter()
        .enumerate()
        .filter(|(_, p)| seen.insert((p.x.to_bits(), p.y.to_bits())))
        .map(|(i, _)| i)
        .collect();

    let w = f64::from(dimensions.width);
    let h = f64::from(dimensions.height);
    let (cx, cy) = (w / 2.0, h / 2.0);
    let reach = HELPER_DISTANCE * w.max(h).max(1.0);

    let mut points: Vec<delaunator::Point> = unique
        .iter()
        .map(|&i| delaunator::Point {
            x: sites[i].x,
            y: sites[i].y,
        })
        .collect();
    points.extend([
        delaunator::Point { x: cx - reach, y: cy },
        delaunator::Point { x: cx + reach, y: cy },
        delaunator::Point { x: cx, y: cy - reach },
        delaunator::Point { x: cx, y: cy + reach },
    ]);

    let delaunay = delaunator::triangulate(&points);
    if delaunay.triangles.is_empty() {
        return Err(PipelineError::Tessellation(
            "triangulation produced no triangles".to_string(),
        ));
    }

    let centers = circumcenters(&delaunay, &points);
    let inedges = incoming_edges(&delaunay, points.len());

    let mut polygons = vec![Polygon::default(); sites.len()];
    for (k, &site) in unique.iter().enumerate() {
        let ring = cell_ring(&delaunay, &centers, inedges[k]);
        polygons[site] = Polygon::new(clip_to_rect(ring, w, h));
    }

    // Sites the triangulation dropped as near-duplicates own no cell;
    // the surviving neighbor within float tolerance answers for them.
    let locator = RTree::bulk_load(
        unique
            .iter()
            .zip(&inedges)
            .filter(|&(_, &edge)| edge != EMPTY)
            .map(|(&i, _)| SiteEntry::new([sites[i].x, sites[i].y], i))
            .collect(),
    );

    Ok(Tessellation { polygons, locator })
}

/// Circumcenter of every triangle, indexed by triangle.
fn circumcenters(delaunay: &Triangulation, points: &[delaunator::Point]) -> Vec<Point> {
    delaunay
        .triangles
        .chunks_exact(3)
        .map(|t| {
            let (a, b, c) = (&points[t[0]], &points[t[1]], &points[t[2]]);
            let (dx, dy) = (b.x - a.x, b.y - a.y);
            let (ex, ey) = (c.x - a.x, c.y - a.y);
            let bl = dx.mul_add(dx, dy * dy);
            let cl = ex.mul_add(ex, ey * ey);
            let d = 0.5 / dx.mul_add(ey, -(dy * ex));
            let x = a.x + (ey * bl - dy * cl) * d;
            let y = a.y + (dx * cl - ex * bl) * d;
            if x.is_finite() && y.is_finite() {
                Point::new(x, y)
            } else {
                // Degenerate sliver: fall back to the centroid.
                Point::new((a.x + b.x + c.x) / 3.0, (a.y + b.y + c.y) / 3.0)
            }
        })
        .collect()
}

/// For each point, one halfedge that ends at it (or `EMPTY`).
fn incoming_edges(delaunay: &Triangulation, point_count: usize) -> Vec<usize> {
    let mut inedges = vec![EMPTY; point_count];
    for e in 0..delaunay.triangles.len() {
        let end = delaunay.triangles[next_halfedge(e)];
        if inedges[end] == EMPTY || delaunay.halfedges[e] == EMPTY {
            inedges[end] = e;
        }
    }
    inedges
}

/// Circumcenters of the triangles around a site, in rotational order.
fn cell_ring(delaunay: &Triangulation, centers: &[Point], start: usize) -> Vec<Point> {
    if start == EMPTY {
        return Vec::new();
    }
    let mut ring = Vec::new();
    let mut incoming = start;
    for _ in 0..delaunay.halfedges.len() {
        ring.push(centers[incoming / 3]);
        incoming = delaunay.halfedges[next_halfedge(incoming)];
        if incoming == EMPTY || incoming == start {
            break;
        }
    }
    ring
}

#[derive(Clone, Copy)]
enum ClipEdge {
    Left,
    Right,
    Top,
    Bottom,
}

impl ClipEdge {
    fn inside(self, p: Point, w: f64, h: f64) -> bool {
        match self {
            Self::Left => p.x >= 0.0,
            Self::Right => p.x <= w,
            Self::Top => p.y >= 0.0,
            Self::Bottom => p.y <= h,
        }
    }

    /// Where segment `a`-`b` crosses this edge.
    ///
    /// Endpoints are put in a canonical order first, so neighboring
    /// cells that share the segment compute bit-identical crossings.
    fn intersect(self, a: Point, b: Point, w: f64, h: f64) -> Point {
        let (a, b) = if (a.x, a.y) <= (b.x, b.y) {
            (a, b)
        } else {
            (b, a)
        };
        match self {
            Self::Left | Self::Right => {
                let x = if matches!(self, Self::Left) { 0.0 } else { w };
                let t = (x - a.x) / (b.x - a.x);
                Point::new(x, t.mul_add(b.y - a.y, a.y))
            }
            Self::Top | Self::Bottom => {
                let y = if matches!(self, Self::Top) { 0.0 } else { h };
                let t = (y - a.y) / (b.y - a.y);
                Point::new(t.mul_add(b.x - a.x, a.x), y)
            }
        }
    }
}

/// Sutherland-Hodgman clip of a convex ring to `[0, w] x [0, h]`.
fn clip_to_rect(ring: Vec<Point>, w: f64, h: f64) -> Vec<Point> {
    let mut output = ring;
    for edge in [ClipEdge::Left, ClipEdge::Right, ClipEdge::Top, ClipEdge::Bottom] {
        let Some(&last) = output.last() else {
            break;
        };
        let input = std::mem::take(&mut output);
        let mut prev = last;
        for &cur in &input {
            let cur_in = edge.inside(cur, w, h);
            let prev_in = edge.inside(prev, w, h);
            if cur_in {
                if !prev_in {
                    output.push(edge.intersect(prev, cur, w, h));
                }
                output.push(cur);
            } else if prev_in {
                output.push(edge.intersect(prev, cur, w, h));
            }
            prev = cur;
        }
    }
    output.dedup();
    if output.len() > 1 && output.first() == output.last() {
        output.pop();
    }
    if output.len() < 3 {
        output.clear();
    }
    output
}
