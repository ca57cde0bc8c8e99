//! Plain data carried between the room, the snake simulation and the wire.

use crate::snake::SnakeState;
use serde::{Deserialize, Serialize};

/// Identifier assigned to a player by the server's client manager.
pub type PlayerId = u32;

pub const MAX_PLAYER_NAME_LENGTH: usize = 16;
pub const DEFAULT_PLAYER_NAME: &str = "Player";

pub const TERRITORY_SKINS: [&str; 5] = [
    "pattern_squares",
    "pattern_dots",
    "pattern_grid",
    "pattern_smiley",
    "pattern_question",
];
pub const DEFAULT_TERRITORY_SKIN: &str = "pattern_squares";

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Linear interpolation towards `other`; `t` is not clamped.
    pub fn lerp(&self, other: &Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

/// Heading of a snake. The arena uses screen coordinates, so `Up` is -y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
        }
    }

    pub fn is_opposite(self, other: Direction) -> bool {
        self.opposite() == other
    }

    /// Unit step along the heading.
    pub fn unit(self) -> (f64, f64) {
        match self {
            Direction::Up => (0.0, -1.0),
            Direction::Right => (1.0, 0.0),
            Direction::Down => (0.0, 1.0),
            Direction::Left => (-1.0, 0.0),
        }
    }

    /// The heading a clockwise quarter turn away, used by the client autopilot.
    pub fn clockwise(self) -> Direction {
        match self {
            Direction::Up => Direction::Right,
            Direction::Right => Direction::Down,
            Direction::Down => Direction::Left,
            Direction::Left => Direction::Up,
        }
    }
}

/// A vertex of a snake's path.
///
/// `direction` is the heading the snake travelled when leaving this point
/// towards the point before it (closer to the head). `sequence` only grows on
/// turns, so a turn point keeps the same sequence on server and client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnakePoint {
    pub x: f64,
    pub y: f64,
    pub sequence: u32,
    pub direction: Direction,
    /// Simulation time (ms) at which the snake was at this point. For the
    /// head this is the time of the most recent turn.
    pub created_at: f64,
}

impl SnakePoint {
    pub fn new(position: Point, sequence: u32, direction: Direction, created_at: f64) -> Self {
        Self {
            x: position.x,
            y: position.y,
            sequence,
            direction,
            created_at,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// One claimed polygon of a snake's territory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerritoryRegion {
    pub created_at: f64,
    pub polygon: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub snake: Option<SnakeState>,
    pub display_name: String,
    pub skin: String,
}

impl PlayerState {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            snake: None,
            display_name: DEFAULT_PLAYER_NAME.to_string(),
            skin: DEFAULT_TERRITORY_SKIN.to_string(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.snake.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Food {
    pub position: Point,
    pub hue: u16,
    pub spawned_at: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCause {
    Wall,
    SelfCollision,
    Player,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathStats {
    pub kills: u32,
    pub score: u32,
    pub time_alive_ms: f64,
}

/// Sent to the victim only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathRecord {
    pub victim: PlayerId,
    pub cause: DeathCause,
    pub killer: Option<PlayerId>,
    pub stats: DeathStats,
}

/// Collapses whitespace, truncates and falls back to a default name.
pub fn sanitize_player_name(name: &str) -> String {
    let cleaned = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return DEFAULT_PLAYER_NAME.to_string();
    }
    cleaned.chars().take(MAX_PLAYER_NAME_LENGTH).collect()
}

pub fn sanitize_skin(skin: &str) -> String {
    if TERRITORY_SKINS.contains(&skin) {
        skin.to_string()
    } else {
        DEFAULT_TERRITORY_SKIN.to_string()
    }
}
