//! Dynamic arena sizing.
//!
//! The target half-size follows the number of living snakes. The actual
//! half-size eases towards it with a smoothstep curve, and a shrinking step
//! is held back while anything would end up too close to the new wall.

use shared::config::ArenaConfig;
use shared::SnakeState;

const RETARGET_EPSILON: f64 = 1e-6;

/// Cubic ease-in/ease-out on `[0, 1]`.
pub fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// True when every head and territory vertex stays within
/// `half_size - padding` on both axes.
pub fn shrink_is_safe<'a>(
    snakes: impl IntoIterator<Item = &'a SnakeState>,
    half_size: f64,
    padding: f64,
) -> bool {
    let limit = half_size - padding;
    let inside = |x: f64, y: f64| x.abs() <= limit && y.abs() <= limit;

    snakes.into_iter().all(|snake| {
        let head = snake.head_position();
        inside(head.x, head.y) && snake.territory_points().all(|p| inside(p.x, p.y))
    })
}

#[derive(Debug, Clone)]
pub struct ArenaResizer {
    from: f64,
    target: f64,
    elapsed_ms: f64,
}

impl ArenaResizer {
    pub fn new(half_size: f64) -> Self {
        Self {
            from: half_size,
            target: half_size,
            elapsed_ms: 0.0,
        }
    }

    /// Restarts the ease from `current` when the target moves.
    pub fn retarget(&mut self, current: f64, target: f64) {
        if (target - self.target).abs() > RETARGET_EPSILON {
            self.from = current;
            self.target = target;
            self.elapsed_ms = 0.0;
        }
    }

    /// Half-size the ease would reach after another `delta_ms`.
    pub fn prospective(&self, delta_ms: f64, period_ms: f64) -> f64 {
        if period_ms <= 0.0 {
            return self.target;
        }
        let t = (self.elapsed_ms + delta_ms) / period_ms;
        self.from + (self.target - self.from) * smoothstep(t)
    }

    /// One tick of easing. A shrink that fails `is_safe` leaves both the
    /// half-size and the ease progress untouched, so it is retried next tick.
    pub fn step(
        &mut self,
        current: f64,
        delta_ms: f64,
        config: &ArenaConfig,
        is_safe: impl FnOnce(f64) -> bool,
    ) -> f64 {
        if (current - self.target).abs() <= RETARGET_EPSILON {
            return self.target;
        }

        let next = self.prospective(delta_ms, config.resize_period_ms);
        if next < current && !is_safe(next) {
            return current;
        }

        self.elapsed_ms += delta_ms;
        next
    }
}
