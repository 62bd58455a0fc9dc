use chrono::{DateTime, TimeDelta, Utc};

/// Source of the host time used to stamp fused outputs.
///
/// `monotonic` must never go backwards; `utc` is only used for the output header.
pub trait Clock {
    fn utc(&self) -> UtcInstant;
    fn monotonic(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub utc: UtcInstant,
    pub monotonic: Instant,
}

impl Timestamp {
    pub fn now(clock: &dyn Clock) -> Timestamp {
        Timestamp {
            utc: clock.utc(),
            monotonic: clock.monotonic(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq, Hash, Default)]
pub struct Instant {
    delta: TimeDelta,
}

impl Instant {
    pub fn elapsed(&self) -> TimeDelta {
        self.delta
    }

    pub fn elapsed_seconds_f64(&self) -> f64 {
        TD(self.elapsed()).seconds()
    }

    pub fn duration_since(&self, other: &Instant) -> TimeDelta {
        self.delta - other.delta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq, Hash)]
pub struct UtcInstant {
    utc: DateTime<Utc>,
}

impl UtcInstant {
    pub fn duration_since(&self, other: UtcInstant) -> TimeDelta {
        self.utc - other.utc
    }
}

/// Wall clock for live operation. Monotonic time counts from construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: std::time::Instant,
}

impl SystemClock {
    pub fn new() -> SystemClock {
        SystemClock {
            start: std::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn utc(&self) -> UtcInstant {
        UtcInstant { utc: Utc::now() }
    }

    fn monotonic(&self) -> Instant {
        // Saturates instead of failing: an uptime beyond TimeDelta::MAX is not reachable
        let delta = TimeDelta::from_std(self.start.elapsed()).unwrap_or(TimeDelta::MAX);
        Instant { delta }
    }
}

/// Manually stepped clock, used for replaying recorded logs and in tests.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    utc_epoch: DateTime<Utc>,
    elapsed: TimeDelta,
}

impl SimulatedClock {
    pub fn new(utc_epoch: DateTime<Utc>, elapsed: TimeDelta) -> SimulatedClock {
        SimulatedClock { utc_epoch, elapsed }
    }

    pub fn step(&mut self, delta: TimeDelta) {
        self.elapsed += delta
    }

    /// Moves the clock to `elapsed`, never backwards.
    pub fn advance_to(&mut self, elapsed: TimeDelta) {
        if elapsed > self.elapsed {
            self.elapsed = elapsed;
        }
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        SimulatedClock::new(DateTime::<Utc>::UNIX_EPOCH, TimeDelta::zero())
    }
}

impl Clock for SimulatedClock {
    fn utc(&self) -> UtcInstant {
        UtcInstant {
            utc: self.utc_epoch + self.elapsed,
        }
    }

    fn monotonic(&self) -> Instant {
        Instant {
            delta: self.elapsed,
        }
    }
}

pub struct TD(pub TimeDelta);

impl TD {
    pub fn seconds(&self) -> f64 {
        self.0.num_seconds() as f64 + (self.0.subsec_nanos() as f64) / 1000000000.0
    }
}

pub fn sec_f64_to_timedelta(sec: f64) -> TimeDelta {
    TimeDelta::nanoseconds((sec * 1_000_000_000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_simulated_clock_step() {
        let mut clock = SimulatedClock::default();
        let t0 = Timestamp::now(&clock);

        clock.step(TimeDelta::milliseconds(250));
        let t1 = Timestamp::now(&clock);

        assert_eq!(t1.monotonic.duration_since(&t0.monotonic), TimeDelta::milliseconds(250));
        assert_eq!(t1.utc.duration_since(t0.utc), TimeDelta::milliseconds(250));
        assert_relative_eq!(t1.monotonic.elapsed_seconds_f64(), 0.25);
    }

    #[test]
    fn test_simulated_clock_never_goes_back() {
        let mut clock = SimulatedClock::default();
        clock.advance_to(TimeDelta::seconds(2));
        clock.advance_to(TimeDelta::seconds(1));

        assert_eq!(clock.monotonic().elapsed(), TimeDelta::seconds(2));
    }

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.monotonic();
        let b = clock.monotonic();

        assert!(b >= a);
    }

    #[test]
    fn test_sec_to_timedelta() {
        assert_eq!(sec_f64_to_timedelta(1.5), TimeDelta::milliseconds(1500));
        assert_eq!(sec_f64_to_timedelta(0.0), TimeDelta::zero());
    }
}
