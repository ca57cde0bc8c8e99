//! Server clock estimation from ping round trips.
//!
//! Each reply gives one offset sample,
//! `server_time - local_receive + latency / 2`. The estimate is the mean of
//! the most recent samples.

use std::collections::{HashMap, VecDeque};

/// Pings older than this many outstanding requests are forgotten.
const MAX_PENDING_PINGS: usize = 16;

#[derive(Debug, Clone)]
pub struct ClockSync {
    pending: HashMap<u32, f64>,
    offsets: VecDeque<f64>,
    max_samples: usize,
    next_id: u32,
    latency_ms: f64,
}

impl ClockSync {
    pub fn new(max_samples: usize) -> Self {
        Self {
            pending: HashMap::new(),
            offsets: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
            next_id: 1,
            latency_ms: 0.0,
        }
    }

    /// Registers a ping sent at `local_now` and returns its id.
    pub fn begin_ping(&mut self, local_now: f64) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        if self.pending.len() >= MAX_PENDING_PINGS {
            if let Some(&oldest) = self.pending.keys().min() {
                self.pending.remove(&oldest);
            }
        }
        self.pending.insert(id, local_now);
        id
    }

    /// Records a reply. Returns the new offset sample, or `None` for an
    /// unknown or already answered ping.
    pub fn on_reply(&mut self, id: u32, server_time: f64, local_now: f64) -> Option<f64> {
        let sent_at = self.pending.remove(&id)?;
        let latency = (local_now - sent_at).max(0.0);
        let offset = server_time - local_now + latency / 2.0;

        self.latency_ms = latency;
        self.offsets.push_back(offset);
        while self.offsets.len() > self.max_samples {
            self.offsets.pop_front();
        }
        Some(offset)
    }

    /// Mean of the retained samples.
    pub fn offset(&self) -> Option<f64> {
        if self.offsets.is_empty() {
            return None;
        }
        Some(self.offsets.iter().sum::<f64>() / self.offsets.len() as f64)
    }

    pub fn is_synced(&self) -> bool {
        !self.offsets.is_empty()
    }

    /// Round trip of the latest answered ping.
    pub fn latency_ms(&self) -> f64 {
        self.latency_ms
    }

    pub fn sample_count(&self) -> usize {
        self.offsets.len()
    }

    /// Estimated server time at `local_now`.
    pub fn server_time(&self, local_now: f64) -> f64 {
        local_now + self.offset().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_single_round_trip() {
        let mut clock = ClockSync::new(15);
        assert!(!clock.is_synced());

        let id = clock.begin_ping(1000.0);
        // server stamped 5000 while the ping was in flight, reply lands at 1040
        let offset = clock.on_reply(id, 5000.0, 1040.0).unwrap();

        assert_approx_eq!(offset, 5000.0 - 1040.0 + 20.0);
        assert_approx_eq!(clock.latency_ms(), 40.0);
        assert_approx_eq!(clock.server_time(1100.0), 1100.0 + offset);
    }

    #[test]
    fn test_offset_is_mean_of_samples() {
        let mut clock = ClockSync::new(15);
        for (sent, server, received) in [(0.0, 110.0, 20.0), (100.0, 230.0, 140.0)] {
            let id = clock.begin_ping(sent);
            clock.on_reply(id, server, received);
        }
        // samples: 110 - 20 + 10 = 100, 230 - 140 + 20 = 110
        assert_approx_eq!(clock.offset().unwrap(), 105.0);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut clock = ClockSync::new(3);
        for i in 0..10 {
            let now = i as f64 * 100.0;
            let id = clock.begin_ping(now);
            clock.on_reply(id, now + 500.0 + i as f64, now);
        }
        assert_eq!(clock.sample_count(), 3);
        assert_approx_eq!(clock.offset().unwrap(), 508.0);
    }

    #[test]
    fn test_unknown_or_repeated_reply_is_ignored() {
        let mut clock = ClockSync::new(15);
        assert!(clock.on_reply(99, 10.0, 10.0).is_none());

        let id = clock.begin_ping(0.0);
        assert!(clock.on_reply(id, 10.0, 10.0).is_some());
        assert!(clock.on_reply(id, 10.0, 10.0).is_none());
        assert_eq!(clock.sample_count(), 1);
    }

    #[test]
    fn test_unsynced_clock_uses_local_time() {
        let clock = ClockSync::new(15);
        assert_eq!(clock.offset(), None);
        assert_approx_eq!(clock.server_time(250.0), 250.0);
    }

    #[test]
    fn test_pending_pings_are_bounded() {
        let mut clock = ClockSync::new(15);
        let first = clock.begin_ping(0.0);
        for i in 0..MAX_PENDING_PINGS {
            clock.begin_ping(i as f64);
        }
        assert!(clock.on_reply(first, 0.0, 0.0).is_none());
    }
}
