/// Fixed-interval tick scheduler.
///
/// Each interval accumulates elapsed frame time and fires once it
/// reaches its period; the accumulator then restarts from zero (excess
/// time is dropped, so a stalled frame never causes a burst of catch-up
/// ticks). Due ticks are reported in registration order, which is the
/// order the caller runs the steppers within one frame.

use std::time::Duration;

use crate::config::SpeedConfig;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum TickKind {
    /// Drain one queued movement input.
    Input,
    /// One gravity sweep.
    Gravity,
    /// One ghost sweep.
    Ghosts,
}

#[derive(Clone, Debug)]
struct Interval {
    kind: TickKind,
    period: Duration,
    elapsed: Duration,
    calls: u64,
}

#[derive(Clone, Debug, Default)]
pub struct TickSchedule {
    intervals: Vec<Interval>,
}

impl TickSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// The game's three intervals: input, gravity, ghosts.
    pub fn from_speed(speed: &SpeedConfig) -> Self {
        let mut s = TickSchedule::new();
        s.add(TickKind::Input, Duration::from_millis(speed.move_interval_ms));
        s.add(TickKind::Gravity, Duration::from_millis(speed.gravity_interval_ms));
        s.add(TickKind::Ghosts, Duration::from_millis(speed.ghost_interval_ms));
        s
    }

    pub fn add(&mut self, kind: TickKind, period: Duration) {
        self.intervals.push(Interval {
            kind,
            period,
            elapsed: Duration::ZERO,
            calls: 0,
        });
    }

    /// Advance every interval by `dt` and return the ones that fired.
    pub fn advance(&mut self, dt: Duration) -> Vec<TickKind> {
        let mut due = Vec::new();
        for iv in &mut self.intervals {
            iv.elapsed += dt;
            if iv.elapsed >= iv.period {
                iv.calls += 1;
                iv.elapsed = Duration::ZERO;
                due.push(iv.kind);
            }
        }
        due
    }

    /// Make every interval fire on the next `advance`.
    pub fn prime(&mut self) {
        for iv in &mut self.intervals {
            iv.elapsed = iv.period;
        }
    }

    pub fn reset(&mut self) {
        for iv in &mut self.intervals {
            iv.elapsed = Duration::ZERO;
            iv.calls = 0;
        }
    }

    /// How many times `kind` has fired since the last reset.
    #[allow(dead_code)]
    pub fn calls(&self, kind: TickKind) -> u64 {
        self.intervals
            .iter()
            .filter(|iv| iv.kind == kind)
            .map(|iv| iv.calls)
            .sum()
    }
}
