//! Game configuration, built once and passed to the room and the reconciler.

use log::warn;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct SnakeConfig {
    /// Units per second.
    pub base_speed: f64,
    pub start_length: f64,
    /// Half-width of the square territory granted on spawn.
    pub start_territory_margin: f64,
    /// Extra speed while the head is inside the snake's own territory.
    pub territory_speed_bonus: f64,
    pub boost_multiplier: f64,
    pub allow_freezing: bool,
}

impl Default for SnakeConfig {
    fn default() -> Self {
        Self {
            base_speed: 100.0,
            start_length: 150.0,
            start_territory_margin: 100.0,
            territory_speed_bonus: 30.0,
            boost_multiplier: 1.5,
            allow_freezing: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArenaConfig {
    pub min_area: f64,
    pub per_snake_area: f64,
    /// Time taken to ease from the current half-size to a new target.
    pub resize_period_ms: f64,
    /// Heads and territory must stay this far inside a shrinking wall.
    pub shrink_padding: f64,
    /// Distance kept between a spawn territory and the wall.
    pub spawn_margin: f64,
    pub spawn_attempts: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            min_area: 1_000_000.0,
            per_snake_area: 360_000.0,
            resize_period_ms: 4000.0,
            shrink_padding: 50.0,
            spawn_margin: 50.0,
            spawn_attempts: 32,
        }
    }
}

impl ArenaConfig {
    /// Half the side length of a square arena with the given area.
    pub fn target_half_size(&self, active_snakes: usize) -> f64 {
        let area = self.min_area.max(active_snakes as f64 * self.per_snake_area);
        area.sqrt() / 2.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FoodConfig {
    pub spawn_interval_ms: f64,
    pub max_count: usize,
    pub collision_radius: f64,
    pub grow_amount: f64,
    pub avoid_territories: bool,
    pub spawn_attempts: usize,
}

impl Default for FoodConfig {
    fn default() -> Self {
        Self {
            spawn_interval_ms: 250.0,
            max_count: 200,
            collision_radius: 15.0,
            grow_amount: 20.0,
            avoid_territories: true,
            spawn_attempts: 16,
        }
    }
}

/// `score = max(0, area * territory + length * length_weight + kills * kill - baseline)`
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreConfig {
    pub territory_weight: f64,
    pub length_weight: f64,
    pub kill_weight: f64,
    pub baseline: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            territory_weight: 0.001,
            length_weight: 0.1,
            kill_weight: 50.0,
            baseline: 55.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetConfig {
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Snapshot broadcasts per second.
    pub patch_rate: u32,
    pub interpolation_delay_ms: f64,
    pub frame_history: usize,
    pub clock_samples: usize,
    pub ping_interval_ms: u64,
    pub client_timeout_ms: u64,
    pub max_clients: usize,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            patch_rate: 20,
            interpolation_delay_ms: 50.0,
            frame_history: 64,
            clock_samples: 15,
            ping_interval_ms: 2000,
            client_timeout_ms: 5000,
            max_clients: 50,
        }
    }
}

impl NetConfig {
    pub fn snapshot_interval_ms(&self) -> f64 {
        1000.0 / self.patch_rate.max(1) as f64
    }

    /// Never shorter than one snapshot interval, so two frames bracket the
    /// interpolation target in steady state.
    pub fn interpolation_delay(&self) -> f64 {
        self.interpolation_delay_ms.max(self.snapshot_interval_ms())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameConfig {
    pub snake: SnakeConfig,
    pub arena: ArenaConfig,
    pub food: FoodConfig,
    pub score: ScoreConfig,
    pub net: NetConfig,
}

impl GameConfig {
    /// Defaults with overrides from `TICK_RATE`, `PATCH_RATE`, `MAX_CLIENTS`
    /// and `ALLOW_FREEZING`.
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Some(rate) = env_override::<u32>("TICK_RATE").filter(|r| (1..=240).contains(r)) {
            config.net.tick_rate = rate;
        }
        if let Some(rate) = env_override::<u32>("PATCH_RATE").filter(|r| (1..=120).contains(r)) {
            config.net.patch_rate = rate;
        }
        if let Some(max) = env_override::<usize>("MAX_CLIENTS").filter(|m| *m > 0) {
            config.net.max_clients = max;
        }
        if let Some(allow) = env_override::<bool>("ALLOW_FREEZING") {
            config.snake.allow_freezing = allow;
        }

        config
    }
}

fn env_override<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Invalid {} '{}', using default", key, raw);
            None
        }
    }
}
