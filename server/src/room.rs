//! Authoritative simulation for one game room.
//!
//! The room owns every player, snake and food item. Commands from the
//! transport are queued and drained at the start of each tick, then snakes
//! are stepped one at a time in ascending player id order. A snake killed
//! earlier in a tick is already gone when later snakes are checked.

use crate::arena::{shrink_is_safe, ArenaResizer};
use crate::collision::{check_collisions, compute_score, consume_food, Collision};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::geometry::polygon_area;
use shared::{
    sanitize_player_name, sanitize_skin, DeathRecord, DeathStats, Direction, Food, GameConfig,
    Packet, PlayerId, PlayerState, Point, SnakeState,
};
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;

/// How far a client's claimed turn point may sit off the axis of travel.
const AXIS_TOLERANCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("player {0} is not in the room")]
    UnknownPlayer(PlayerId),
    #[error("player {0} has no living snake")]
    NoSnake(PlayerId),
    #[error("player {0} already has a living snake")]
    AlreadyAlive(PlayerId),
    #[error("turn refers to sequence {got}, head is at {expected}")]
    SequenceMismatch { expected: u32, got: u32 },
    #[error("turn point ({x}, {y}) is off the axis of travel")]
    OffAxis { x: f64, y: f64 },
    #[error("cannot turn {0:?} from the current heading")]
    InvalidTurn(Direction),
    #[error("freezing is disabled")]
    FreezingDisabled,
}

/// Player input waiting for the next tick.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomCommand {
    Join {
        player_id: PlayerId,
        name: String,
        skin: String,
    },
    Turn {
        player_id: PlayerId,
        direction: Direction,
        x: f64,
        y: f64,
        sequence: u32,
    },
    StartBoost {
        player_id: PlayerId,
    },
    StopBoost {
        player_id: PlayerId,
    },
    Freeze {
        player_id: PlayerId,
    },
    Unfreeze {
        player_id: PlayerId,
    },
}

/// Things that happened during a tick, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    Spawned {
        player_id: PlayerId,
        snake: SnakeState,
    },
    Died(DeathRecord),
    RegionClaimed {
        player_id: PlayerId,
        area: f64,
    },
}

/// Checks a client-predicted turn against the authoritative head.
pub fn validate_turn(
    snake: &SnakeState,
    direction: Direction,
    x: f64,
    y: f64,
    sequence: u32,
) -> Result<(), CommandError> {
    let head = snake.head();
    if sequence != head.sequence {
        return Err(CommandError::SequenceMismatch {
            expected: head.sequence,
            got: sequence,
        });
    }

    let off_axis = if snake.direction.is_horizontal() {
        (y - head.y).abs() > AXIS_TOLERANCE
    } else {
        (x - head.x).abs() > AXIS_TOLERANCE
    };
    if off_axis {
        return Err(CommandError::OffAxis { x, y });
    }

    if direction == snake.direction || direction.is_opposite(snake.direction) {
        return Err(CommandError::InvalidTurn(direction));
    }
    Ok(())
}

pub struct Room {
    config: GameConfig,
    players: BTreeMap<PlayerId, PlayerState>,
    food: Vec<Food>,
    half_size: f64,
    resizer: ArenaResizer,
    simulation_time: f64,
    tick: u32,
    food_timer_ms: f64,
    commands: VecDeque<RoomCommand>,
    rng: StdRng,
}

impl Room {
    pub fn new(config: GameConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic spawn and food placement.
    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, rng: StdRng) -> Self {
        let half_size = config.arena.target_half_size(0);
        Self {
            config,
            players: BTreeMap::new(),
            food: Vec::new(),
            half_size,
            resizer: ArenaResizer::new(half_size),
            simulation_time: 0.0,
            tick: 0,
            food_timer_ms: 0.0,
            commands: VecDeque::new(),
            rng,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    /// Milliseconds simulated since the room was created.
    pub fn simulation_time(&self) -> f64 {
        self.simulation_time
    }

    pub fn half_size(&self) -> f64 {
        self.half_size
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn living_count(&self) -> usize {
        self.players.values().filter(|p| p.is_alive()).count()
    }

    pub fn food(&self) -> &[Food] {
        &self.food
    }

    /// Registers a connected player without a snake. Returns false if the id
    /// is already present.
    pub fn add_player(&mut self, id: PlayerId) -> bool {
        if self.players.contains_key(&id) {
            return false;
        }
        self.players.insert(id, PlayerState::new(id));
        info!("Player {} entered the room", id);
        true
    }

    pub fn remove_player(&mut self, id: PlayerId) -> Option<PlayerState> {
        let removed = self.players.remove(&id);
        if removed.is_some() {
            info!("Player {} left the room", id);
        }
        removed
    }

    pub fn enqueue(&mut self, command: RoomCommand) {
        self.commands.push_back(command);
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// Advances the room by `delta_ms` and returns what happened.
    pub fn tick(&mut self, delta_ms: f64) -> Vec<RoomEvent> {
        self.tick = self.tick.wrapping_add(1);

        // Turns are stamped with the time the head stood at the turn point.
        let mut events = Vec::new();
        self.apply_commands(&mut events);
        self.simulation_time += delta_ms;

        let ids: Vec<PlayerId> = self.players.keys().copied().collect();
        for id in ids {
            self.step_snake(id, delta_ms, &mut events);
        }

        self.spawn_food(delta_ms);
        self.resize_arena(delta_ms);
        events
    }

    /// Full authoritative snapshot for broadcast.
    pub fn snapshot(&self) -> Packet {
        Packet::GameState {
            tick: self.tick,
            timestamp: self.simulation_time,
            half_size: self.half_size,
            players: self.players.values().cloned().collect(),
            food: self.food.clone(),
        }
    }

    pub fn time_sync_reply(&self, id: u32) -> Packet {
        Packet::TimeSyncReply {
            id,
            server_time: self.simulation_time,
        }
    }

    fn apply_commands(&mut self, events: &mut Vec<RoomEvent>) {
        while let Some(command) = self.commands.pop_front() {
            if let Err(e) = self.apply_command(command, events) {
                debug!("Command rejected: {}", e);
            }
        }
    }

    fn apply_command(
        &mut self,
        command: RoomCommand,
        events: &mut Vec<RoomEvent>,
    ) -> Result<(), CommandError> {
        let now = self.simulation_time;
        let base_speed = self.config.snake.base_speed;
        let boost_speed = base_speed * self.config.snake.boost_multiplier;
        let allow_freezing = self.config.snake.allow_freezing;

        match command {
            RoomCommand::Join {
                player_id,
                name,
                skin,
            } => self.join(player_id, &name, &skin, events),
            RoomCommand::Turn {
                player_id,
                direction,
                x,
                y,
                sequence,
            } => {
                let snake = self.snake_mut(player_id)?;
                validate_turn(snake, direction, x, y, sequence)?;
                if !snake.turn(direction, now) {
                    return Err(CommandError::InvalidTurn(direction));
                }
                Ok(())
            }
            RoomCommand::StartBoost { player_id } => {
                let snake = self.snake_mut(player_id)?;
                snake.boosting = true;
                snake.speed = boost_speed;
                Ok(())
            }
            RoomCommand::StopBoost { player_id } => {
                let snake = self.snake_mut(player_id)?;
                snake.boosting = false;
                snake.speed = base_speed;
                Ok(())
            }
            RoomCommand::Freeze { player_id } => {
                if !allow_freezing {
                    return Err(CommandError::FreezingDisabled);
                }
                self.snake_mut(player_id)?.frozen = true;
                Ok(())
            }
            RoomCommand::Unfreeze { player_id } => {
                self.snake_mut(player_id)?.frozen = false;
                Ok(())
            }
        }
    }

    fn snake_mut(&mut self, id: PlayerId) -> Result<&mut SnakeState, CommandError> {
        let player = self
            .players
            .get_mut(&id)
            .ok_or(CommandError::UnknownPlayer(id))?;
        player.snake.as_mut().ok_or(CommandError::NoSnake(id))
    }

    fn join(
        &mut self,
        id: PlayerId,
        name: &str,
        skin: &str,
        events: &mut Vec<RoomEvent>,
    ) -> Result<(), CommandError> {
        {
            let player = self
                .players
                .get_mut(&id)
                .ok_or(CommandError::UnknownPlayer(id))?;
            if player.is_alive() {
                return Err(CommandError::AlreadyAlive(id));
            }
            player.display_name = sanitize_player_name(name);
            player.skin = sanitize_skin(skin);
        }

        let position = self.spawn_position();
        let hue = self.rng.gen_range(0..360);
        let snake = SnakeState::spawn(position, hue, self.simulation_time, &self.config.snake);
        for region in &snake.regions {
            self.clip_others(id, &region.polygon);
        }

        info!(
            "Player {} spawned at ({:.0}, {:.0})",
            id, position.x, position.y
        );
        events.push(RoomEvent::Spawned {
            player_id: id,
            snake: snake.clone(),
        });
        if let Some(player) = self.players.get_mut(&id) {
            player.snake = Some(snake);
        }
        Ok(())
    }

    /// Movement, food, tail, collisions, territory and score for one snake.
    fn step_snake(&mut self, id: PlayerId, delta_ms: f64, events: &mut Vec<RoomEvent>) {
        let Some(mut snake) = self.players.get_mut(&id).and_then(|p| p.snake.take()) else {
            return;
        };

        if !snake.frozen {
            snake.advance_head(delta_ms);
        }

        let eaten = consume_food(
            snake.head_position(),
            &mut self.food,
            self.config.food.collision_radius,
        );
        if eaten > 0 {
            snake.grow(eaten as f64 * self.config.food.grow_amount);
        } else {
            snake.trim_tail();
        }

        // The snake being stepped is out of the map, so this is everyone else.
        let others = self
            .players
            .iter()
            .filter_map(|(&other_id, p)| p.snake.as_ref().map(|s| (other_id, s)));
        if let Some(collision) = check_collisions(&snake, self.half_size, others) {
            self.kill(id, snake, collision, events);
            return;
        }

        let claimed = snake.update_territory(self.simulation_time, &self.config.snake);
        if !claimed.is_empty() {
            let area: f64 = claimed.iter().map(|r| polygon_area(&r.polygon)).sum();
            for region in &claimed {
                self.clip_others(id, &region.polygon);
            }
            info!("Player {} claimed {:.0} units of territory", id, area);
            events.push(RoomEvent::RegionClaimed {
                player_id: id,
                area,
            });
        }

        snake.head_territory_owner = self.territory_owner_at(snake.head_position(), Some(id));
        snake.score = compute_score(&snake, &self.config.score);

        if let Some(player) = self.players.get_mut(&id) {
            player.snake = Some(snake);
        }
    }

    fn kill(
        &mut self,
        id: PlayerId,
        snake: SnakeState,
        collision: Collision,
        events: &mut Vec<RoomEvent>,
    ) {
        let killer = collision.killer();
        if let Some(killer_id) = killer {
            if let Some(other) = self
                .players
                .get_mut(&killer_id)
                .and_then(|p| p.snake.as_mut())
            {
                other.kills += 1;
                other.score = compute_score(other, &self.config.score);
            }
        }

        let record = DeathRecord {
            victim: id,
            cause: collision.cause(),
            killer,
            stats: DeathStats {
                kills: snake.kills,
                score: compute_score(&snake, &self.config.score),
                time_alive_ms: self.simulation_time - snake.spawned_at,
            },
        };
        info!(
            "Player {} died: {:?} (killer {:?})",
            id, record.cause, record.killer
        );
        events.push(RoomEvent::Died(record));
    }

    /// Newer claims win: removes `polygon` from every other owner.
    fn clip_others(&mut self, owner: PlayerId, polygon: &[Point]) {
        for (&other_id, player) in self.players.iter_mut() {
            if other_id == owner {
                continue;
            }
            if let Some(snake) = player.snake.as_mut() {
                let lost = snake.clip_territory(polygon);
                if lost > 0.0 {
                    snake.score = compute_score(snake, &self.config.score);
                    debug!("Player {} lost {:.0} territory to {}", other_id, lost, owner);
                }
            }
        }
    }

    /// First owner in id order whose territory contains `point`.
    fn territory_owner_at(&self, point: Point, exclude: Option<PlayerId>) -> Option<PlayerId> {
        self.players
            .iter()
            .filter(|&(&id, _)| Some(id) != exclude)
            .find_map(|(&id, p)| {
                p.snake
                    .as_ref()
                    .filter(|s| s.is_point_in_territory(point))
                    .map(|_| id)
            })
    }

    fn random_point(&mut self, limit: f64) -> Point {
        if limit <= 0.0 {
            return Point::new(0.0, 0.0);
        }
        Point::new(
            self.rng.gen_range(-limit..=limit).round(),
            self.rng.gen_range(-limit..=limit).round(),
        )
    }

    fn spawn_position(&mut self) -> Point {
        let limit = self.half_size
            - self.config.arena.spawn_margin
            - self.config.snake.start_territory_margin;
        let mut candidate = Point::new(0.0, 0.0);
        for _ in 0..self.config.arena.spawn_attempts.max(1) {
            candidate = self.random_point(limit);
            if self.territory_owner_at(candidate, None).is_none() {
                return candidate;
            }
        }
        candidate
    }

    fn spawn_food(&mut self, delta_ms: f64) {
        let interval = self.config.food.spawn_interval_ms;
        if interval <= 0.0 {
            return;
        }

        self.food_timer_ms += delta_ms;
        while self.food_timer_ms >= interval {
            self.food_timer_ms -= interval;
            if self.food.len() >= self.config.food.max_count {
                continue;
            }
            if let Some(position) = self.food_position() {
                let hue = self.rng.gen_range(0..360);
                self.food.push(Food {
                    position,
                    hue,
                    spawned_at: self.simulation_time,
                });
            }
        }
    }

    fn food_position(&mut self) -> Option<Point> {
        let limit = self.half_size - self.config.arena.spawn_margin;
        for _ in 0..self.config.food.spawn_attempts {
            let candidate = self.random_point(limit);
            if !self.config.food.avoid_territories
                || self.territory_owner_at(candidate, None).is_none()
            {
                return Some(candidate);
            }
        }
        None
    }

    fn resize_arena(&mut self, delta_ms: f64) {
        let target = self.config.arena.target_half_size(self.living_count());
        self.resizer.retarget(self.half_size, target);

        let padding = self.config.arena.shrink_padding;
        let players = &self.players;
        self.half_size = self
            .resizer
            .step(self.half_size, delta_ms, &self.config.arena, |next| {
                shrink_is_safe(
                    players.values().filter_map(|p| p.snake.as_ref()),
                    next,
                    padding,
                )
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::geometry::point_in_polygon;
    use shared::{DeathCause, SnakePoint, TerritoryRegion};

    const TICK: f64 = 1000.0 / 60.0;

    fn square(x: f64, y: f64, half: f64) -> Vec<Point> {
        vec![
            Point::new(x - half, y - half),
            Point::new(x + half, y - half),
            Point::new(x + half, y + half),
            Point::new(x - half, y + half),
        ]
    }

    fn joined_room(ids: &[PlayerId]) -> (Room, Vec<RoomEvent>) {
        joined_room_with(GameConfig::default(), ids)
    }

    fn joined_room_with(config: GameConfig, ids: &[PlayerId]) -> (Room, Vec<RoomEvent>) {
        let mut room = Room::with_seed(config, 7);
        for &id in ids {
            room.add_player(id);
            room.enqueue(RoomCommand::Join {
                player_id: id,
                name: format!("p{}", id),
                skin: "pattern_dots".to_string(),
            });
        }
        let events = room.tick(TICK);
        (room, events)
    }

    fn snake_mut(room: &mut Room, id: PlayerId) -> &mut SnakeState {
        room.players
            .get_mut(&id)
            .and_then(|p| p.snake.as_mut())
            .unwrap()
    }

    /// Parks player 1 inside a territory spanning the arena's width and its
    /// upper part, leaving a free band along the bottom.
    fn crowded_room() -> (Room, Vec<Point>) {
        let (mut room, _) = joined_room(&[1]);
        let territory = vec![
            Point::new(-460.0, -460.0),
            Point::new(460.0, -460.0),
            Point::new(460.0, 200.5),
            Point::new(-460.0, 200.5),
        ];
        let snake = snake_mut(&mut room, 1);
        set_path(snake, &[(0.0, -100.0, Direction::Up), (0.0, 50.0, Direction::Up)]);
        snake.frozen = true;
        snake.regions = vec![TerritoryRegion {
            created_at: 0.0,
            polygon: territory.clone(),
        }];
        (room, territory)
    }

    fn set_path(snake: &mut SnakeState, points: &[(f64, f64, Direction)]) {
        let n = points.len() as u32;
        snake.points = points
            .iter()
            .enumerate()
            .map(|(i, (x, y, dir))| {
                SnakePoint::new(Point::new(*x, *y), n - 1 - i as u32, *dir, 0.0)
            })
            .collect();
        snake.direction = points[0].2;
    }

    #[test]
    fn test_join_spawns_snake() {
        let mut room = Room::with_seed(GameConfig::default(), 1);
        assert!(room.add_player(1));
        assert!(!room.add_player(1));
        room.enqueue(RoomCommand::Join {
            player_id: 1,
            name: "   a    very  long player name ".to_string(),
            skin: "not_a_skin".to_string(),
        });

        let events = room.tick(TICK);

        assert!(matches!(events[0], RoomEvent::Spawned { player_id: 1, .. }));
        let player = room.player(1).unwrap();
        assert!(player.is_alive());
        assert_eq!(player.display_name, "a very long play");
        assert_eq!(player.skin, shared::state::DEFAULT_TERRITORY_SKIN);

        let snake = player.snake.as_ref().unwrap();
        let limit = room.half_size() - 150.0;
        assert!(snake.points[1].x.abs() <= limit && snake.points[1].y.abs() <= limit);
    }

    #[test]
    fn test_join_while_alive_is_ignored() {
        let (mut room, _) = joined_room(&[1]);
        room.enqueue(RoomCommand::Join {
            player_id: 1,
            name: "again".to_string(),
            skin: String::new(),
        });
        let events = room.tick(TICK);
        assert!(events
            .iter()
            .all(|e| !matches!(e, RoomEvent::Spawned { .. })));
        assert_eq!(room.player(1).unwrap().display_name, "p1");
    }

    #[test]
    fn test_unknown_player_commands_are_dropped() {
        let mut room = Room::with_seed(GameConfig::default(), 1);
        room.enqueue(RoomCommand::StartBoost { player_id: 9 });
        assert_eq!(room.pending_commands(), 1);
        assert!(room.tick(TICK).is_empty());
        assert_eq!(room.pending_commands(), 0);
    }

    #[test]
    fn test_tail_length_holds_every_tick() {
        let mut config = GameConfig::default();
        config.food.max_count = 0;
        let (mut room, _) = joined_room_with(config, &[1, 2, 3]);
        for i in 0..240 {
            if i % 40 == 20 {
                for id in 1..=3 {
                    if let Some(snake) = room.player(id).and_then(|p| p.snake.as_ref()) {
                        let head = *snake.head();
                        room.enqueue(RoomCommand::Turn {
                            player_id: id,
                            direction: snake.direction.clockwise(),
                            x: head.x,
                            y: head.y,
                            sequence: head.sequence,
                        });
                    }
                }
            }
            room.tick(TICK);
            for player in room.players() {
                if let Some(snake) = &player.snake {
                    assert!(snake.path_length() <= snake.length + 1e-6);
                    if room.simulation_time() - snake.spawned_at > 2000.0 {
                        assert_approx_eq!(snake.path_length(), snake.length, 1e-6);
                    }
                }
            }
        }
    }

    #[test]
    fn test_turn_with_stale_sequence_is_ignored() {
        let (mut room, _) = joined_room(&[1]);
        let head = *room.player(1).unwrap().snake.as_ref().unwrap().head();

        room.enqueue(RoomCommand::Turn {
            player_id: 1,
            direction: Direction::Left,
            x: head.x,
            y: head.y,
            sequence: head.sequence + 5,
        });
        room.tick(TICK);
        assert_eq!(
            room.player(1).unwrap().snake.as_ref().unwrap().direction,
            Direction::Up
        );

        let head = *room.player(1).unwrap().snake.as_ref().unwrap().head();
        room.enqueue(RoomCommand::Turn {
            player_id: 1,
            direction: Direction::Left,
            x: head.x,
            y: head.y,
            sequence: head.sequence,
        });
        room.tick(TICK);
        let snake = room.player(1).unwrap().snake.as_ref().unwrap();
        assert_eq!(snake.direction, Direction::Left);
        assert_eq!(snake.head().sequence, head.sequence + 1);
    }

    #[test]
    fn test_validate_turn_rejects_off_axis() {
        let snake = SnakeState::spawn(
            Point::new(10.0, 10.0),
            0,
            0.0,
            &GameConfig::default().snake,
        );
        assert_eq!(
            validate_turn(&snake, Direction::Left, 40.0, 10.0, 1),
            Err(CommandError::OffAxis { x: 40.0, y: 10.0 })
        );
        assert_eq!(
            validate_turn(&snake, Direction::Down, 10.0, 10.0, 1),
            Err(CommandError::InvalidTurn(Direction::Down))
        );
        assert!(validate_turn(&snake, Direction::Left, 10.0, -20.0, 1).is_ok());
    }

    #[test]
    fn test_boost_changes_speed() {
        let (mut room, _) = joined_room(&[1]);
        room.enqueue(RoomCommand::StartBoost { player_id: 1 });
        room.tick(TICK);
        let snake = room.player(1).unwrap().snake.as_ref().unwrap();
        assert!(snake.boosting);
        assert_approx_eq!(snake.speed, 150.0);

        room.enqueue(RoomCommand::StopBoost { player_id: 1 });
        room.tick(TICK);
        let snake = room.player(1).unwrap().snake.as_ref().unwrap();
        assert!(!snake.boosting);
        assert_approx_eq!(snake.speed, 100.0);
    }

    #[test]
    fn test_commands_apply_in_arrival_order() {
        let (mut room, _) = joined_room(&[1]);
        room.enqueue(RoomCommand::StartBoost { player_id: 1 });
        room.enqueue(RoomCommand::StopBoost { player_id: 1 });
        room.tick(TICK);
        let snake = room.player(1).unwrap().snake.as_ref().unwrap();
        assert!(!snake.boosting);
        assert_approx_eq!(snake.speed, 100.0);

        room.enqueue(RoomCommand::StopBoost { player_id: 1 });
        room.enqueue(RoomCommand::StartBoost { player_id: 1 });
        room.tick(TICK);
        let snake = room.player(1).unwrap().snake.as_ref().unwrap();
        assert!(snake.boosting);
        assert_approx_eq!(snake.speed, 150.0);
    }

    #[test]
    fn test_turn_is_stamped_before_the_tick_advances() {
        let (mut room, _) = joined_room(&[1]);
        room.tick(TICK);
        let head = *room.player(1).unwrap().snake.as_ref().unwrap().head();
        let before = room.simulation_time();

        room.enqueue(RoomCommand::Turn {
            player_id: 1,
            direction: Direction::Right,
            x: head.x,
            y: head.y,
            sequence: head.sequence,
        });
        room.tick(TICK);

        let snake = room.player(1).unwrap().snake.as_ref().unwrap();
        let corner = &snake.points[1];
        assert_eq!(corner.position(), head.position());
        assert_eq!(corner.sequence, head.sequence);
        assert_approx_eq!(corner.created_at, before);
        assert_eq!(snake.head().direction, Direction::Right);
        assert_approx_eq!(room.simulation_time(), before + TICK);
    }

    #[test]
    fn test_freeze_requires_config() {
        let (mut room, _) = joined_room(&[1]);
        room.enqueue(RoomCommand::Freeze { player_id: 1 });
        room.tick(TICK);
        assert!(!room.player(1).unwrap().snake.as_ref().unwrap().frozen);

        let mut config = GameConfig::default();
        config.snake.allow_freezing = true;
        let mut room = Room::with_seed(config, 3);
        room.add_player(1);
        room.enqueue(RoomCommand::Join {
            player_id: 1,
            name: String::new(),
            skin: String::new(),
        });
        room.tick(TICK);
        room.enqueue(RoomCommand::Freeze { player_id: 1 });
        room.tick(TICK);
        let head = room.player(1).unwrap().snake.as_ref().unwrap().head_position();
        room.tick(TICK);
        let snake = room.player(1).unwrap().snake.as_ref().unwrap();
        assert!(snake.frozen);
        assert_eq!(snake.head_position(), head);
    }

    #[test]
    fn test_wall_death_keeps_player() {
        let (mut room, _) = joined_room(&[1]);
        let half = room.half_size();
        let snake = snake_mut(&mut room, 1);
        snake.points[0].y = -half - 1.0;

        let events = room.tick(TICK);

        let record = events
            .iter()
            .find_map(|e| match e {
                RoomEvent::Died(record) => Some(record.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(record.victim, 1);
        assert_eq!(record.cause, DeathCause::Wall);
        assert_eq!(record.killer, None);
        assert!(record.stats.time_alive_ms > 0.0);

        let player = room.player(1).unwrap();
        assert!(!player.is_alive());
        assert_eq!(room.player_count(), 1);
        assert_eq!(room.living_count(), 0);
    }

    #[test]
    fn test_player_collision_lower_id_loses_tie() {
        let (mut room, _) = joined_room(&[1, 2]);
        {
            let a = snake_mut(&mut room, 1);
            a.regions.clear();
            set_path(a, &[(0.0, -20.0, Direction::Up), (0.0, 20.0, Direction::Up)]);
        }
        {
            let b = snake_mut(&mut room, 2);
            b.regions.clear();
            set_path(
                b,
                &[(20.0, 0.0, Direction::Right), (-20.0, 0.0, Direction::Right)],
            );
        }

        let events = room.tick(TICK);

        let deaths: Vec<&DeathRecord> = events
            .iter()
            .filter_map(|e| match e {
                RoomEvent::Died(record) => Some(record),
                _ => None,
            })
            .collect();
        assert_eq!(deaths.len(), 1);
        assert_eq!(deaths[0].victim, 1);
        assert_eq!(deaths[0].killer, Some(2));
        assert_eq!(room.player(2).unwrap().snake.as_ref().unwrap().kills, 1);
    }

    #[test]
    fn test_claim_clips_other_owner() {
        let (mut room, _) = joined_room(&[1, 2]);
        {
            let a = snake_mut(&mut room, 1);
            a.regions = vec![TerritoryRegion {
                created_at: 0.0,
                polygon: square(0.0, 0.0, 100.0),
            }];
            a.length = 1000.0;
            set_path(
                a,
                &[
                    (50.0, -90.0, Direction::Down),
                    (50.0, -150.0, Direction::Down),
                    (-50.0, -150.0, Direction::Right),
                    (-50.0, -50.0, Direction::Up),
                ],
            );
        }
        {
            let b = snake_mut(&mut room, 2);
            b.regions = vec![TerritoryRegion {
                created_at: 0.0,
                polygon: square(0.0, -200.0, 75.0),
            }];
            set_path(b, &[(0.0, -200.0, Direction::Up), (0.0, -200.0, Direction::Up)]);
        }
        let before = room.player(2).unwrap().snake.as_ref().unwrap().territory_area();

        let events = room.tick(TICK);

        let claimed = events
            .iter()
            .find_map(|e| match e {
                RoomEvent::RegionClaimed { player_id: 1, area } => Some(*area),
                _ => None,
            })
            .unwrap();
        assert_approx_eq!(claimed, 5000.0, 1.0);

        let after = room.player(2).unwrap().snake.as_ref().unwrap().territory_area();
        assert!(after < before);
        assert_approx_eq!(before - after, 2500.0, 1.0);
    }

    #[test]
    fn test_head_territory_owner() {
        let (mut room, _) = joined_room(&[1, 2]);
        let target = {
            let b = snake_mut(&mut room, 2);
            b.frozen = true;
            b.regions[0].polygon[0]
        };
        {
            let a = snake_mut(&mut room, 1);
            a.frozen = true;
            a.regions.clear();
            let inside = Point::new(target.x + 10.0, target.y + 10.0);
            set_path(
                a,
                &[
                    (inside.x, inside.y, Direction::Up),
                    (inside.x, inside.y + 5.0, Direction::Up),
                ],
            );
        }

        room.tick(TICK);
        let a = room.player(1).unwrap().snake.as_ref().unwrap();
        assert_eq!(a.head_territory_owner, Some(2));
    }

    #[test]
    fn test_food_grows_snake() {
        let (mut room, _) = joined_room(&[1]);
        let head = room.player(1).unwrap().snake.as_ref().unwrap().head_position();
        room.food.push(Food {
            position: Point::new(head.x, head.y - 5.0),
            hue: 10,
            spawned_at: 0.0,
        });

        room.tick(TICK);

        let snake = room.player(1).unwrap().snake.as_ref().unwrap();
        assert_approx_eq!(snake.length, 170.0);
        assert!(room.food().is_empty());
    }

    #[test]
    fn test_food_spawns_on_interval() {
        let mut room = Room::with_seed(GameConfig::default(), 5);
        for _ in 0..4 {
            room.tick(250.0);
        }
        assert_eq!(room.food().len(), 4);
        let limit = room.half_size();
        assert!(room
            .food()
            .iter()
            .all(|f| f.position.x.abs() <= limit && f.position.y.abs() <= limit));
    }

    #[test]
    fn test_food_avoids_territory() {
        let (mut room, territory) = crowded_room();
        for _ in 0..300 {
            room.tick(TICK);
        }

        assert!(room.player(1).unwrap().is_alive());
        assert!(!room.food().is_empty());
        for food in room.food() {
            assert!(!point_in_polygon(food.position, &territory));
            assert_eq!(room.territory_owner_at(food.position, None), None);
        }
    }

    #[test]
    fn test_spawn_avoids_other_territory() {
        let (mut room, territory) = crowded_room();
        room.tick(TICK);

        room.add_player(2);
        room.enqueue(RoomCommand::Join {
            player_id: 2,
            name: "p2".to_string(),
            skin: String::new(),
        });
        let events = room.tick(TICK);

        let spawn = events
            .iter()
            .find_map(|e| match e {
                RoomEvent::Spawned { player_id: 2, snake } => Some(snake.head_position()),
                _ => None,
            })
            .unwrap();
        assert!(!point_in_polygon(spawn, &territory));
        assert!(spawn.y > 200.0);
    }

    #[test]
    fn test_arena_grows_and_defers_shrink() {
        let mut config = GameConfig::default();
        config.snake.allow_freezing = true;
        let mut room = Room::with_seed(config, 11);
        for id in 1..=4 {
            room.add_player(id);
            room.enqueue(RoomCommand::Join {
                player_id: id,
                name: String::new(),
                skin: String::new(),
            });
        }
        room.tick(TICK);
        for id in 1..=4 {
            room.enqueue(RoomCommand::Freeze { player_id: id });
        }
        for _ in 0..300 {
            room.tick(TICK);
        }
        assert_approx_eq!(room.half_size(), 600.0, 1e-6);

        {
            let a = snake_mut(&mut room, 1);
            a.regions = vec![TerritoryRegion {
                created_at: 0.0,
                polygon: square(500.0, 0.0, 60.0),
            }];
        }
        for id in 2..=4 {
            room.remove_player(id);
        }
        for _ in 0..60 {
            room.tick(TICK);
        }
        assert_approx_eq!(room.half_size(), 600.0, 1e-6);

        snake_mut(&mut room, 1).regions = vec![TerritoryRegion {
            created_at: 0.0,
            polygon: square(0.0, 0.0, 50.0),
        }];
        let head = room.player(1).unwrap().snake.as_ref().unwrap().head_position();
        assert!(head.x.abs() < 450.0 && head.y.abs() < 450.0);
        for _ in 0..300 {
            room.tick(TICK);
        }
        assert_approx_eq!(room.half_size(), 500.0, 1e-6);
    }

    #[test]
    fn test_snapshot_contents() {
        let (room, _) = joined_room(&[1, 2]);
        match room.snapshot() {
            Packet::GameState {
                tick,
                timestamp,
                half_size,
                players,
                ..
            } => {
                assert_eq!(tick, 1);
                assert_approx_eq!(timestamp, TICK);
                assert_approx_eq!(half_size, room.half_size());
                assert_eq!(players.len(), 2);
                assert_eq!(players[0].id, 1);
            }
            _ => panic!("Expected a GameState snapshot"),
        }
    }
}
