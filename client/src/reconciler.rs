//! Authoritative frame buffer and per-snake smoothing.
//!
//! Frames are kept newest first. Rendering happens at a target time that
//! lags the estimated server clock by the interpolation delay, so in steady
//! state two frames bracket the target:
//!
//! - bracketed: body points come from the older frame, the head moves
//!   towards where the newer frame puts it, following any turns the newer
//!   frame recorded before the target so corners stay sharp
//! - stalled: the newest frame's head is projected forward with the same
//!   step the server uses and the tail is trimmed to match

use crate::time_sync::ClockSync;
use log::{debug, warn};
use shared::{Food, NetConfig, PlayerId, PlayerState, SnakePoint, SnakeState};
use std::collections::VecDeque;

/// Projection stops this far past the newest frame.
const MAX_EXTRAPOLATION_MS: f64 = 1000.0;

/// One authoritative snapshot as received.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub server_time: f64,
    /// Local clock reading when the snapshot arrived.
    pub received_at: f64,
    pub tick: u32,
    pub half_size: f64,
    pub players: Vec<PlayerState>,
    pub food: Vec<Food>,
}

impl Frame {
    pub fn player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn snake(&self, id: PlayerId) -> Option<&SnakeState> {
        self.player(id)?.snake.as_ref()
    }

    fn is_well_formed(&self) -> bool {
        self.server_time.is_finite()
            && self.half_size.is_finite()
            && self
                .players
                .iter()
                .filter_map(|p| p.snake.as_ref())
                .all(SnakeState::is_well_formed)
    }
}

/// The arena as it should be drawn at `server_time`.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldView {
    pub server_time: f64,
    pub half_size: f64,
    pub players: Vec<PlayerState>,
    pub food: Vec<Food>,
    /// True when no newer frame was available and heads were projected.
    pub extrapolated: bool,
}

impl WorldView {
    pub fn snake(&self, id: PlayerId) -> Option<&SnakeState> {
        self.players
            .iter()
            .find(|p| p.id == id)
            .and_then(|p| p.snake.as_ref())
    }
}

#[derive(Debug)]
pub struct Reconciler {
    frames: VecDeque<Frame>,
    max_frames: usize,
    delay_ms: f64,
}

impl Reconciler {
    pub fn new(net: &NetConfig) -> Self {
        let max_frames = net.frame_history.max(2);
        Self {
            frames: VecDeque::with_capacity(max_frames),
            max_frames,
            delay_ms: net.interpolation_delay(),
        }
    }

    /// Stores a snapshot. Late datagrams are slotted in by timestamp; repeated
    /// ticks and structurally broken snapshots are dropped.
    pub fn push_frame(&mut self, frame: Frame) -> bool {
        if !frame.is_well_formed() {
            warn!("Dropping malformed snapshot for tick {}", frame.tick);
            return false;
        }
        if self.frames.iter().any(|f| f.tick == frame.tick) {
            debug!("Ignoring repeated snapshot for tick {}", frame.tick);
            return false;
        }

        let index = self
            .frames
            .iter()
            .position(|f| f.server_time <= frame.server_time)
            .unwrap_or(self.frames.len());
        self.frames.insert(index, frame);
        self.frames.truncate(self.max_frames);
        true
    }

    pub fn newest(&self) -> Option<&Frame> {
        self.frames.front()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn delay_ms(&self) -> f64 {
        self.delay_ms
    }

    pub fn target_time(&self, server_now: f64) -> f64 {
        server_now - self.delay_ms
    }

    /// View for the current render frame.
    pub fn update(&mut self, clock: &ClockSync, local_now: f64) -> Option<WorldView> {
        let target = self.target_time(clock.server_time(local_now));
        self.view_at(target)
    }

    /// View at an explicit server time. Frames older than the one bracketing
    /// `target` from below are discarded.
    pub fn view_at(&mut self, target: f64) -> Option<WorldView> {
        let Some(older_index) = self.frames.iter().position(|f| f.server_time <= target) else {
            // Everything buffered is still in the future; hold the oldest.
            return self.frames.back().map(|frame| WorldView {
                server_time: frame.server_time,
                half_size: frame.half_size,
                players: frame.players.clone(),
                food: frame.food.clone(),
                extrapolated: false,
            });
        };

        self.frames.truncate(older_index + 1);
        let older = &self.frames[older_index];
        if older_index == 0 {
            return Some(extrapolate_frame(older, target));
        }

        let newer = &self.frames[older_index - 1];
        Some(interpolate_frames(older, newer, target))
    }
}

/// Fraction of the way from `from` to `to` at `at`, clamped to `0..=1`.
fn progress(from: f64, to: f64, at: f64) -> f64 {
    let span = to - from;
    if span <= 0.0 {
        return 1.0;
    }
    ((at - from) / span).clamp(0.0, 1.0)
}

fn same_life(a: &SnakeState, b: &SnakeState) -> bool {
    a.spawned_at == b.spawned_at
}

fn interpolate_frames(older: &Frame, newer: &Frame, target: f64) -> WorldView {
    let percent = progress(older.server_time, newer.server_time, target);

    let players = older
        .players
        .iter()
        .map(|player| {
            let snake = match (&player.snake, newer.snake(player.id)) {
                (Some(old), Some(new)) if same_life(old, new) => Some(interpolate_snake(
                    old,
                    new,
                    older.server_time,
                    newer.server_time,
                    target,
                )),
                (old, _) => old.clone(),
            };
            PlayerState {
                id: player.id,
                snake,
                display_name: player.display_name.clone(),
                skin: player.skin.clone(),
            }
        })
        .collect();

    WorldView {
        server_time: target,
        half_size: older.half_size + (newer.half_size - older.half_size) * percent,
        players,
        food: older.food.clone(),
        extrapolated: false,
    }
}

fn extrapolate_frame(frame: &Frame, target: f64) -> WorldView {
    let elapsed = (target - frame.server_time).min(MAX_EXTRAPOLATION_MS);
    let players = frame
        .players
        .iter()
        .map(|player| PlayerState {
            id: player.id,
            snake: player
                .snake
                .as_ref()
                .map(|snake| extrapolate_snake(snake, elapsed)),
            display_name: player.display_name.clone(),
            skin: player.skin.clone(),
        })
        .collect();

    WorldView {
        server_time: target,
        half_size: frame.half_size,
        players,
        food: frame.food.clone(),
        extrapolated: true,
    }
}

/// `older` at the target time, with its head carried towards `newer`.
pub fn interpolate_snake(
    older: &SnakeState,
    newer: &SnakeState,
    older_time: f64,
    newer_time: f64,
    target: f64,
) -> SnakeState {
    let mut snake = older.clone();
    let old_head = *older.head();

    // Turns recorded by the newer frame that the older one had not made yet
    // and that happened by `target`, newest first.
    let reached: Vec<(usize, SnakePoint)> = newer
        .points
        .iter()
        .enumerate()
        .skip(1)
        .take_while(|(_, p)| p.sequence >= old_head.sequence)
        .filter(|(_, p)| p.created_at <= target)
        .map(|(i, p)| (i, *p))
        .collect();

    if let Some(&(index, latest)) = reached.first() {
        let ahead = newer.points[index - 1];
        let ahead_time = if index == 1 {
            newer_time
        } else {
            ahead.created_at
        };
        let head = latest.position().lerp(
            &ahead.position(),
            progress(latest.created_at, ahead_time, target),
        );

        let mut points = Vec::with_capacity(reached.len() + older.points.len());
        points.push(SnakePoint::new(
            head,
            latest.sequence + 1,
            latest.direction,
            latest.created_at,
        ));
        points.extend(reached.iter().map(|&(_, p)| p));
        points.extend(older.points.iter().skip(1).copied());

        snake.points = points;
        snake.direction = latest.direction;
    } else {
        let next = newer
            .points
            .iter()
            .enumerate()
            .find(|(_, p)| p.sequence == old_head.sequence);
        let head = match next {
            Some((0, p)) => old_head
                .position()
                .lerp(&p.position(), progress(older_time, newer_time, target)),
            // Heading for a turn that happens after the target.
            Some((_, p)) => old_head
                .position()
                .lerp(&p.position(), progress(older_time, p.created_at, target)),
            None => old_head.position(),
        };
        snake.points[0].x = head.x;
        snake.points[0].y = head.y;
    }

    snake.trim_tail();
    snake
}

/// Dead reckoning from the last known state.
pub fn extrapolate_snake(snake: &SnakeState, elapsed_ms: f64) -> SnakeState {
    let mut snake = snake.clone();
    if !snake.frozen && elapsed_ms > 0.0 {
        snake.advance_head(elapsed_ms);
        snake.trim_tail();
    }
    snake
}
