//! Timer-driven tick scheduling.
//!
//! Speed only changes how many ticks fire per real second; every tick always
//! simulates exactly one day.

use clap::ValueEnum;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SimSpeed {
    Paused,
    Slow,
    Normal,
    Fast,
    /// As fast as the pipeline allows.
    Unbounded,
}

impl SimSpeed {
    /// Real-time delay between ticks, `None` while paused.
    pub fn tick_delay(self) -> Option<Duration> {
        match self {
            SimSpeed::Paused => None,
            SimSpeed::Slow => Some(Duration::from_millis(500)),
            SimSpeed::Normal => Some(Duration::from_millis(125)),
            SimSpeed::Fast => Some(Duration::from_millis(31)),
            SimSpeed::Unbounded => Some(Duration::ZERO),
        }
    }
}

impl std::fmt::Display for SimSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SimSpeed::Paused => "paused",
            SimSpeed::Slow => "slow",
            SimSpeed::Normal => "normal",
            SimSpeed::Fast => "fast",
            SimSpeed::Unbounded => "unbounded",
        })
    }
}

/// Decides when the next tick begins.
pub struct TickScheduler {
    speed: SimSpeed,
    last_tick: Instant,
}

impl TickScheduler {
    pub fn new(speed: SimSpeed) -> Self {
        Self {
            speed,
            last_tick: Instant::now(),
        }
    }

    #[allow(dead_code)] // interactive frontends change speed mid-run
    pub fn speed(&self) -> SimSpeed {
        self.speed
    }

    #[allow(dead_code)]
    pub fn set_speed(&mut self, speed: SimSpeed) {
        self.speed = speed;
    }

    /// Sleep until the next tick is due. Returns `false` while paused.
    pub fn wait_for_tick(&mut self) -> bool {
        let Some(delay) = self.speed.tick_delay() else {
            return false;
        };
        let elapsed = self.last_tick.elapsed();
        if elapsed < delay {
            std::thread::sleep(delay - elapsed);
        }
        self.last_tick = Instant::now();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paused_never_fires() {
        let mut scheduler = TickScheduler::new(SimSpeed::Paused);
        assert!(!scheduler.wait_for_tick());
    }

    #[test]
    fn test_unbounded_fires_immediately() {
        let mut scheduler = TickScheduler::new(SimSpeed::Unbounded);
        let start = Instant::now();
        for _ in 0..100 {
            assert!(scheduler.wait_for_tick());
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_slow_spacing_respected() {
        let mut scheduler = TickScheduler::new(SimSpeed::Slow);
        scheduler.wait_for_tick();
        let start = Instant::now();
        scheduler.wait_for_tick();
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[test]
    fn test_speed_change_takes_effect() {
        let mut scheduler = TickScheduler::new(SimSpeed::Paused);
        assert!(!scheduler.wait_for_tick());
        scheduler.set_speed(SimSpeed::Unbounded);
        assert!(scheduler.wait_for_tick());
    }
}
