//! Input sources and the position-report throttle

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::InputIntent;
use std::time::{Duration, Instant};

/// Anything that can produce one [`InputIntent`] per physics tick.
pub trait InputSource {
    fn poll(&mut self) -> InputIntent;
}

/// Always returns the same intent.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedInput(pub InputIntent);

impl InputSource for FixedInput {
    fn poll(&mut self) -> InputIntent {
        self.0
    }
}

/// Randomised bot input: runs one way for a while, jumps and shoots now and then.
#[derive(Debug)]
pub struct ScriptedInput {
    rng: StdRng,
    direction: i8,
    ticks_left: u32,
}

impl ScriptedInput {
    /// A fixed seed replays the same input sequence.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            direction: 0,
            ticks_left: 0,
        }
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> InputIntent {
        if self.ticks_left == 0 {
            self.direction = self.rng.gen_range(-1..=1);
            self.ticks_left = self.rng.gen_range(20..120);
        }
        self.ticks_left -= 1;

        InputIntent {
            left: self.direction < 0,
            right: self.direction > 0,
            jump: self.rng.gen_bool(0.03),
            shoot: self.rng.gen_bool(0.05),
        }
    }
}

/// Limits how often position reports go out.
#[derive(Debug, Clone)]
pub struct ReportThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ReportThrottle {
    /// Allows at most `rate_hz` reports per second.
    pub fn new(rate_hz: u32) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / f64::from(rate_hz.max(1))),
            last: None,
        }
    }

    /// Returns true, and starts a new interval, when a report may be sent at `now`.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
