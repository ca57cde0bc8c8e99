//! Snake movement, tail maintenance, turning and territory capture.
//!
//! The room runs this every tick and the client reconciler re-runs the head
//! projection and tail trim during extrapolation, so both sides agree on
//! where a snake's body lies for a given head.

use crate::config::SnakeConfig;
use crate::geometry::{
    bounding_rect, point_in_polygon, point_in_polygon_inclusive, polygon_area, polygon_difference,
    polygon_edges, polygon_intersection, polygon_union, segment_intersection, EPSILON,
};
use crate::state::{Direction, PlayerId, Point, SnakePoint, TerritoryRegion};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claimed pieces below this area are slivers from clipping and get dropped.
pub const MIN_REGION_AREA: f64 = 1.0;

/// Why a territory claim produced nothing this tick. Always recoverable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClaimError {
    #[error("snake owns no territory")]
    NoTerritory,
    #[error("path never crosses the territory boundary")]
    NoEntry,
    #[error("excursion has not returned to the territory")]
    NoExit,
    #[error("entry and exit lie on different territory pieces")]
    DisjointPieces,
    #[error("loop polygon is degenerate (area {0:.3})")]
    Degenerate(f64),
    #[error("loop lies entirely inside existing territory")]
    EmptyClip,
}

/// Where the snake's path crosses a territory edge.
#[derive(Debug, Clone, Copy)]
struct Crossing {
    ring: usize,
    edge: usize,
    segment: usize,
    along: f64,
    edge_offset: f64,
    point: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnakeState {
    /// Head first. Consecutive points are axis-aligned.
    pub points: Vec<SnakePoint>,
    pub regions: Vec<TerritoryRegion>,
    pub direction: Direction,
    /// Target path length; the tail is trimmed to match.
    pub length: f64,
    pub speed: f64,
    pub extra_speed: f64,
    pub boosting: bool,
    pub frozen: bool,
    pub hue: u16,
    pub score: u32,
    pub kills: u32,
    /// Enemy whose territory currently contains the head.
    pub head_territory_owner: Option<PlayerId>,
    pub spawned_at: f64,
}

impl SnakeState {
    /// Two coincident points and a square of territory around `position`.
    pub fn spawn(position: Point, hue: u16, now: f64, config: &SnakeConfig) -> Self {
        let direction = Direction::Up;
        Self {
            points: vec![
                SnakePoint::new(position, 1, direction, now),
                SnakePoint::new(position, 0, direction, now),
            ],
            regions: vec![TerritoryRegion {
                created_at: now,
                polygon: square_around(position, config.start_territory_margin),
            }],
            direction,
            length: config.start_length,
            speed: config.base_speed,
            extra_speed: 0.0,
            boosting: false,
            frozen: false,
            hue,
            score: 0,
            kills: 0,
            head_territory_owner: None,
            spawned_at: now,
        }
    }

    /// Structural check for states that arrive over the wire.
    pub fn is_well_formed(&self) -> bool {
        self.points.len() >= 2
            && self.length.is_finite()
            && self.speed.is_finite()
            && self
                .points
                .iter()
                .all(|p| p.x.is_finite() && p.y.is_finite())
    }

    /// # Panics
    /// If the snake has no points. Every constructor creates two.
    pub fn head(&self) -> &SnakePoint {
        &self.points[0]
    }

    pub fn head_position(&self) -> Point {
        self.head().position()
    }

    /// Segments from head to tail.
    pub fn segments(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.points
            .windows(2)
            .map(|pair| (pair[0].position(), pair[1].position()))
    }

    pub fn path_length(&self) -> f64 {
        self.segments().map(|(a, b)| a.distance(&b)).sum()
    }

    /// Head position after `delta_ms` at `speed` along `direction`. Movement
    /// is whole units on one axis only.
    pub fn project_head(head: Point, direction: Direction, speed: f64, delta_ms: f64) -> Point {
        let step = (speed * delta_ms / 1000.0).round();
        let (dx, dy) = direction.unit();
        Point::new(head.x + dx * step, head.y + dy * step)
    }

    pub fn advance_head(&mut self, delta_ms: f64) {
        let next = Self::project_head(
            self.head_position(),
            self.direction,
            self.speed + self.extra_speed,
            delta_ms,
        );
        let head = &mut self.points[0];
        head.x = next.x;
        head.y = next.y;
    }

    /// Cuts the path so it is exactly `length` long. The point where the
    /// budget runs out is pulled in along its segment and everything past it
    /// is dropped. Paths shorter than `length` are left alone.
    pub fn trim_tail(&mut self) {
        let mut travelled = 0.0;
        for i in 1..self.points.len() {
            let prev = self.points[i - 1].position();
            let current = self.points[i].position();
            let segment = prev.distance(&current);

            if travelled + segment > self.length {
                let remaining = (self.length - travelled).max(0.0);
                let cut = prev.lerp(&current, remaining / segment);
                let tail = &mut self.points[i];
                tail.x = cut.x;
                tail.y = cut.y;
                self.points.truncate(i + 1);
                return;
            }

            travelled += segment;
        }
    }

    pub fn grow(&mut self, amount: f64) {
        self.length += amount;
        self.trim_tail();
    }

    /// Records the current head as a turn point and starts a new head with
    /// the next sequence number. Repeating the heading or reversing it is
    /// refused.
    pub fn turn(&mut self, direction: Direction, now: f64) -> bool {
        if direction == self.direction || direction.is_opposite(self.direction) {
            return false;
        }

        self.direction = direction;
        let head = &mut self.points[0];
        head.direction = direction;
        head.created_at = now;
        let new_head = SnakePoint {
            sequence: head.sequence + 1,
            ..*head
        };
        self.points.insert(0, new_head);
        true
    }

    pub fn region_polygons(&self) -> Vec<Vec<Point>> {
        self.regions.iter().map(|r| r.polygon.clone()).collect()
    }

    pub fn is_point_in_territory(&self, point: Point) -> bool {
        self.regions
            .iter()
            .any(|region| point_in_polygon(point, &region.polygon))
    }

    pub fn territory_area(&self) -> f64 {
        self.regions.iter().map(|r| polygon_area(&r.polygon)).sum()
    }

    pub fn territory_points(&self) -> impl Iterator<Item = Point> + '_ {
        self.regions
            .iter()
            .flat_map(|region| region.polygon.iter().copied())
    }

    /// True if some body point behind the head is off the territory.
    fn has_excursion(&self) -> bool {
        self.points.iter().skip(1).any(|p| {
            !self
                .regions
                .iter()
                .any(|region| point_in_polygon_inclusive(p.position(), &region.polygon))
        })
    }

    /// Per-tick territory pass: refreshes the speed bonus and, when the head
    /// has come back inside after an excursion, tries to close a new region.
    /// Returns the regions added this tick.
    pub fn update_territory(&mut self, now: f64, config: &SnakeConfig) -> Vec<TerritoryRegion> {
        let head_inside = self.is_point_in_territory(self.head_position());
        self.extra_speed = if head_inside {
            config.territory_speed_bonus
        } else {
            0.0
        };

        if !head_inside || !self.has_excursion() {
            return Vec::new();
        }

        match self.try_claim_region(now) {
            Ok(claimed) => {
                self.regions.extend(claimed.iter().cloned());
                claimed
            }
            Err(err) => {
                debug!("Territory claim skipped: {}", err);
                Vec::new()
            }
        }
    }

    /// Builds the loop closed by the current excursion without mutating the
    /// snake: entry point, territory boundary up to the exit point, then the
    /// snake's own path back to the entry. Already-owned area is removed.
    pub fn try_claim_region(&self, now: f64) -> Result<Vec<TerritoryRegion>, ClaimError> {
        let owned = self.region_polygons();
        let rings = polygon_union(&owned);
        if rings.is_empty() {
            return Err(ClaimError::NoTerritory);
        }

        let crossings = self.boundary_crossings(&rings);
        let entry = *crossings.first().ok_or(ClaimError::NoEntry)?;
        let exit = *crossings
            .iter()
            .skip(1)
            .find(|c| c.point.distance(&entry.point) > EPSILON)
            .ok_or(ClaimError::NoExit)?;
        if exit.ring != entry.ring {
            return Err(ClaimError::DisjointPieces);
        }

        let mut polygon = vec![entry.point];
        polygon.extend(boundary_arc(&rings[entry.ring], &entry, &exit));
        polygon.push(exit.point);
        polygon.extend(
            self.points[entry.segment + 1..=exit.segment]
                .iter()
                .rev()
                .map(|p| p.position()),
        );

        let area = polygon_area(&polygon);
        if area < MIN_REGION_AREA {
            return Err(ClaimError::Degenerate(area));
        }

        let claimed: Vec<TerritoryRegion> = polygon_difference(&polygon, &owned)
            .into_iter()
            .filter(|piece| polygon_area(piece) >= MIN_REGION_AREA)
            .map(|piece| TerritoryRegion {
                created_at: now,
                polygon: piece,
            })
            .collect();

        if claimed.is_empty() {
            return Err(ClaimError::EmptyClip);
        }
        Ok(claimed)
    }

    /// Every boundary crossing ordered by distance along the path from the head.
    fn boundary_crossings(&self, rings: &[Vec<Point>]) -> Vec<Crossing> {
        let mut crossings = Vec::new();
        for (segment, (a, b)) in self.segments().enumerate() {
            let mut on_segment = Vec::new();
            for (ring, polygon) in rings.iter().enumerate() {
                for (edge, (e0, e1)) in polygon_edges(polygon).enumerate() {
                    if let Some(point) = segment_intersection(a, b, e0, e1) {
                        on_segment.push(Crossing {
                            ring,
                            edge,
                            segment,
                            along: a.distance(&point),
                            edge_offset: e0.distance(&point),
                            point,
                        });
                    }
                }
            }
            on_segment.sort_by(|x, y| x.along.total_cmp(&y.along));
            crossings.extend(on_segment);
        }
        crossings
    }

    /// Removes `claimed` from this snake's regions. Returns the area lost.
    pub fn clip_territory(&mut self, claimed: &[Point]) -> f64 {
        let Some(bounds) = bounding_rect(claimed) else {
            return 0.0;
        };
        let clip = [claimed.to_vec()];
        let mut lost = 0.0;
        let mut kept = Vec::with_capacity(self.regions.len());

        for region in std::mem::take(&mut self.regions) {
            let touches = bounding_rect(&region.polygon).is_some_and(|r| r.intersects(&bounds));
            if !touches {
                kept.push(region);
                continue;
            }

            let overlap: f64 = polygon_intersection(&region.polygon, &clip)
                .iter()
                .map(|piece| polygon_area(piece))
                .sum();
            if overlap < MIN_REGION_AREA {
                kept.push(region);
                continue;
            }

            lost += overlap;
            kept.extend(
                polygon_difference(&region.polygon, &clip)
                    .into_iter()
                    .filter(|piece| polygon_area(piece) >= MIN_REGION_AREA)
                    .map(|polygon| TerritoryRegion {
                        created_at: region.created_at,
                        polygon,
                    }),
            );
        }

        self.regions = kept;
        lost
    }
}

fn square_around(center: Point, margin: f64) -> Vec<Point> {
    vec![
        Point::new(center.x - margin, center.y - margin),
        Point::new(center.x + margin, center.y - margin),
        Point::new(center.x + margin, center.y + margin),
        Point::new(center.x - margin, center.y + margin),
    ]
}

/// Ring vertices walked forward from the entry edge to the exit edge,
/// wrapping past the end of the ring when the exit edge comes first.
fn boundary_arc(ring: &[Point], entry: &Crossing, exit: &Crossing) -> Vec<Point> {
    let m = ring.len();
    let steps = if exit.edge > entry.edge {
        exit.edge - entry.edge
    } else if exit.edge < entry.edge {
        exit.edge + m - entry.edge
    } else if exit.edge_offset >= entry.edge_offset {
        0
    } else {
        m
    };
    (1..=steps).map(|k| ring[(entry.edge + k) % m]).collect()
}
