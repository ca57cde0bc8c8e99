//! Pure 2D geometry used by the snake simulation and the room.
//!
//! Polygons are open rings of [`Point`]s (the closing edge from the last
//! point back to the first is implied). Boolean operations go through `geo`
//! and return every outer ring of the result; holes are dropped.

use crate::state::Point;
use geo::{BooleanOps, LineString, MultiPolygon, Polygon};

/// Tolerance for parallel segments and coincident points.
pub const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }
}

fn cross(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    ax * by - ay * bx
}

/// Parametric intersection of segments `a1→a2` and `b1→b2`.
///
/// Returns `None` for zero-length or parallel segments, and when the
/// intersection lies outside `[0, 1]` on either segment.
pub fn segment_intersection(a1: Point, a2: Point, b1: Point, b2: Point) -> Option<Point> {
    let (rx, ry) = (a2.x - a1.x, a2.y - a1.y);
    let (sx, sy) = (b2.x - b1.x, b2.y - b1.y);

    if (rx.abs() < EPSILON && ry.abs() < EPSILON) || (sx.abs() < EPSILON && sy.abs() < EPSILON) {
        return None;
    }

    let denom = cross(rx, ry, sx, sy);
    if denom.abs() < EPSILON {
        return None;
    }

    let (qx, qy) = (b1.x - a1.x, b1.y - a1.y);
    let t = cross(qx, qy, sx, sy) / denom;
    let u = cross(qx, qy, rx, ry) / denom;

    if !(0.0..=1.0).contains(&t) || !(0.0..=1.0).contains(&u) {
        return None;
    }

    Some(Point::new(a1.x + rx * t, a1.y + ry * t))
}

/// Even-odd ray casting. Points exactly on an edge may land either way.
pub fn point_in_polygon(p: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > p.y) != (pj.y > p.y) && p.x < (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

pub fn point_on_segment(p: Point, a: Point, b: Point) -> bool {
    let (abx, aby) = (b.x - a.x, b.y - a.y);
    let (apx, apy) = (p.x - a.x, p.y - a.y);
    if cross(abx, aby, apx, apy).abs() > EPSILON * (1.0 + abx.abs() + aby.abs()) {
        return false;
    }
    p.x >= a.x.min(b.x) - EPSILON
        && p.x <= a.x.max(b.x) + EPSILON
        && p.y >= a.y.min(b.y) - EPSILON
        && p.y <= a.y.max(b.y) + EPSILON
}

/// Like [`point_in_polygon`] but points on the boundary count as inside.
pub fn point_in_polygon_inclusive(p: Point, polygon: &[Point]) -> bool {
    polygon_edges(polygon).any(|(a, b)| point_on_segment(p, a, b)) || point_in_polygon(p, polygon)
}

/// Edges of a ring including the implied closing edge.
pub fn polygon_edges(polygon: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let n = polygon.len();
    let count = if n < 2 { 0 } else { n };
    (0..count).map(move |i| (polygon[i], polygon[(i + 1) % n]))
}

/// Shoelace sum; positive for counter-clockwise rings in y-up coordinates.
pub fn signed_area(polygon: &[Point]) -> f64 {
    polygon_edges(polygon)
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum::<f64>()
        / 2.0
}

pub fn polygon_area(polygon: &[Point]) -> f64 {
    signed_area(polygon).abs()
}

pub fn polygon_perimeter(polygon: &[Point]) -> f64 {
    polygon_edges(polygon).map(|(a, b)| a.distance(&b)).sum()
}

pub fn bounding_rect(polygon: &[Point]) -> Option<Rect> {
    let first = polygon.first()?;
    let init = Rect {
        min_x: first.x,
        min_y: first.y,
        max_x: first.x,
        max_y: first.y,
    };
    Some(polygon.iter().fold(init, |r, p| Rect {
        min_x: r.min_x.min(p.x),
        min_y: r.min_y.min(p.y),
        max_x: r.max_x.max(p.x),
        max_y: r.max_y.max(p.y),
    }))
}

fn to_geo(ring: &[Point]) -> Polygon<f64> {
    let coords: Vec<(f64, f64)> = ring.iter().map(|p| (p.x, p.y)).collect();
    Polygon::new(LineString::from(coords), vec![])
}

fn to_multi(rings: &[Vec<Point>]) -> MultiPolygon<f64> {
    MultiPolygon::new(
        rings
            .iter()
            .filter(|ring| ring.len() >= 3)
            .map(|ring| to_geo(ring))
            .collect(),
    )
}

fn outer_rings(result: MultiPolygon<f64>) -> Vec<Vec<Point>> {
    result
        .into_iter()
        .filter_map(|polygon| {
            let (exterior, _holes) = polygon.into_inner();
            let mut ring: Vec<Point> = exterior
                .into_iter()
                .map(|c| Point::new(c.x, c.y))
                .collect();
            if ring.len() > 1 && ring.first() == ring.last() {
                ring.pop();
            }
            (ring.len() >= 3).then_some(ring)
        })
        .collect()
}

/// Union of all rings. Disjoint input yields several rings.
pub fn polygon_union(polygons: &[Vec<Point>]) -> Vec<Vec<Point>> {
    let mut valid = polygons.iter().filter(|ring| ring.len() >= 3);
    let Some(first) = valid.next() else {
        return Vec::new();
    };

    let rest: Vec<Vec<Point>> = valid.cloned().collect();
    if rest.is_empty() {
        return vec![first.clone()];
    }

    let mut acc = MultiPolygon::new(vec![to_geo(first)]);
    for ring in &rest {
        acc = acc.union(&MultiPolygon::new(vec![to_geo(ring)]));
    }
    outer_rings(acc)
}

/// `subject` minus every ring in `clips`.
pub fn polygon_difference(subject: &[Point], clips: &[Vec<Point>]) -> Vec<Vec<Point>> {
    if subject.len() < 3 {
        return Vec::new();
    }
    let clip = to_multi(clips);
    let subject = MultiPolygon::new(vec![to_geo(subject)]);
    if clip.0.is_empty() {
        return outer_rings(subject);
    }
    outer_rings(subject.difference(&clip))
}

/// Parts of `subject` covered by any ring in `clips`.
pub fn polygon_intersection(subject: &[Point], clips: &[Vec<Point>]) -> Vec<Vec<Point>> {
    let clip = to_multi(clips);
    if subject.len() < 3 || clip.0.is_empty() {
        return Vec::new();
    }
    outer_rings(MultiPolygon::new(vec![to_geo(subject)]).intersection(&clip))
}
