//! Per-tick collision checks and score computation.
//!
//! Checks run in a fixed order for each snake: wall, self, other players.
//! The first hit ends the snake. Food is handled separately and never kills.

use shared::config::ScoreConfig;
use shared::geometry::{segment_intersection, EPSILON};
use shared::{DeathCause, Food, PlayerId, Point, SnakeState};

/// Result of a fatal collision check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    Wall,
    SelfCollision,
    Player { killer: PlayerId },
}

impl Collision {
    pub fn cause(&self) -> DeathCause {
        match self {
            Collision::Wall => DeathCause::Wall,
            Collision::SelfCollision => DeathCause::SelfCollision,
            Collision::Player { .. } => DeathCause::Player,
        }
    }

    pub fn killer(&self) -> Option<PlayerId> {
        match self {
            Collision::Player { killer } => Some(*killer),
            _ => None,
        }
    }
}

pub fn hits_wall(snake: &SnakeState, half_size: f64) -> bool {
    let head = snake.head_position();
    head.x < -half_size || head.x > half_size || head.y < -half_size || head.y > half_size
}

/// Leading segment against the body beyond the neck. Hits inside the
/// snake's own territory are expected when closing a loop and don't count.
pub fn hits_self(snake: &SnakeState) -> bool {
    let Some((head, neck)) = snake.segments().next() else {
        return false;
    };

    snake.segments().skip(2).any(|(a, b)| {
        segment_intersection(head, neck, a, b).is_some_and(|hit| {
            hit.distance(&neck) > EPSILON && !snake.is_point_in_territory(hit)
        })
    })
}

/// Owner of the first body crossed by the snake's leading segment.
pub fn find_player_hit<'a>(
    snake: &SnakeState,
    others: impl IntoIterator<Item = (PlayerId, &'a SnakeState)>,
) -> Option<PlayerId> {
    let (head, neck) = snake.segments().next()?;

    others.into_iter().find_map(|(id, other)| {
        other
            .segments()
            .any(|(a, b)| segment_intersection(head, neck, a, b).is_some())
            .then_some(id)
    })
}

/// Fatal collision for this tick, if any, in wall/self/player order.
pub fn check_collisions<'a>(
    snake: &SnakeState,
    half_size: f64,
    others: impl IntoIterator<Item = (PlayerId, &'a SnakeState)>,
) -> Option<Collision> {
    if hits_wall(snake, half_size) {
        return Some(Collision::Wall);
    }
    if hits_self(snake) {
        return Some(Collision::SelfCollision);
    }
    find_player_hit(snake, others).map(|killer| Collision::Player { killer })
}

/// Removes every food item within `radius` of `head`. Returns how many.
pub fn consume_food(head: Point, food: &mut Vec<Food>, radius: f64) -> usize {
    let before = food.len();
    food.retain(|item| item.position.distance(&head) > radius);
    before - food.len()
}

pub fn compute_score(snake: &SnakeState, weights: &ScoreConfig) -> u32 {
    let raw = snake.territory_area() * weights.territory_weight
        + snake.length * weights.length_weight
        + snake.kills as f64 * weights.kill_weight
        - weights.baseline;
    raw.max(0.0).round() as u32
}
