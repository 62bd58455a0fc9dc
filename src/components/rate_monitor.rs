use std::sync::{Arc, Mutex, MutexGuard};

use ringbuffer::{AllocRingBuffer, RingBuffer};

use crate::{
    core::time::{Instant, TD, Timestamp},
    datatypes::diagnostics::{DiagnosticField, DiagnosticStatus, Severity},
};

/// Tolerance on the fix frequency, as a fraction of the target
pub const FIX_FREQ_TOLERANCE: f64 = 0.15;

/// Number of ticks used to estimate the fix frequency
pub const FIX_FREQ_WINDOW: usize = 10;

/// Receives a liveness tick each time a position fix is produced.
pub trait FixTickSink {
    fn tick(&mut self, stamp: Timestamp);
}

/// Frequency diagnostic for produced fixes.
///
/// Cloning yields another handle to the same monitor, so the fusion engine can
/// tick it while a diagnostic aggregator reads it.
#[derive(Debug, Clone)]
pub struct FixRateMonitor {
    inner: Arc<Mutex<FixRateMonitorInner>>,
}

#[derive(Debug)]
struct FixRateMonitorInner {
    target_hz: f64,
    tolerance: f64,
    ticks: AllocRingBuffer<Instant>,
    total_ticks: u64,
}

impl FixRateMonitor {
    pub fn new(target_hz: f64) -> Self {
        Self::with_window(target_hz, FIX_FREQ_TOLERANCE, FIX_FREQ_WINDOW)
    }

    pub fn with_window(target_hz: f64, tolerance: f64, window: usize) -> Self {
        FixRateMonitor {
            inner: Arc::new(Mutex::new(FixRateMonitorInner {
                target_hz,
                tolerance,
                ticks: AllocRingBuffer::new(window.max(2)),
                total_ticks: 0,
            })),
        }
    }

    pub fn min_hz(&self) -> f64 {
        self.lock().min_hz()
    }

    pub fn max_hz(&self) -> f64 {
        self.lock().max_hz()
    }

    pub fn total_ticks(&self) -> u64 {
        self.lock().total_ticks
    }

    /// Fix frequency over the window ending at `now`, `None` with fewer than
    /// two ticks. A silent receiver makes the estimate decay.
    pub fn frequency_hz(&self, now: Instant) -> Option<f64> {
        self.lock().frequency_hz(now)
    }

    pub fn status(&self, now: Instant) -> DiagnosticStatus {
        let inner = self.lock();

        let (min_hz, max_hz) = (inner.min_hz(), inner.max_hz());
        let events = inner.ticks.len();
        let freq = inner.frequency_hz(now);

        let (level, message) = match freq {
            _ if events == 0 => (Severity::Error, "No events recorded"),
            None => (Severity::Warn, "Frequency too low"),
            Some(f) if f < min_hz => (Severity::Warn, "Frequency too low"),
            Some(f) if f > max_hz => (Severity::Warn, "Frequency too high"),
            Some(_) => (Severity::Ok, "Desired frequency met"),
        };

        DiagnosticStatus {
            name: "fix frequency".to_string(),
            level,
            message: message.to_string(),
            values: vec![
                DiagnosticField::int("Events in window", events as i64),
                DiagnosticField::float("Actual frequency (Hz)", freq.unwrap_or(0.0)),
                DiagnosticField::float("Target frequency (Hz)", inner.target_hz),
                DiagnosticField::float("Minimum acceptable frequency (Hz)", min_hz),
                DiagnosticField::float("Maximum acceptable frequency (Hz)", max_hz),
            ],
        }
    }

    fn lock(&self) -> MutexGuard<'_, FixRateMonitorInner> {
        // The inner state is plain data and stays consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl FixRateMonitorInner {
    fn min_hz(&self) -> f64 {
        self.target_hz * (1.0 - self.tolerance)
    }

    fn max_hz(&self) -> f64 {
        self.target_hz * (1.0 + self.tolerance)
    }

    fn frequency_hz(&self, now: Instant) -> Option<f64> {
        if self.ticks.len() < 2 {
            return None;
        }

        let oldest = *self.ticks.front()?;
        let span = TD(now.duration_since(&oldest)).seconds();
        let intervals = (self.ticks.len() - 1) as f64;

        if span <= 0.0 {
            Some(f64::INFINITY)
        } else {
            Some(intervals / span)
        }
    }
}

impl FixTickSink for FixRateMonitor {
    fn tick(&mut self, stamp: Timestamp) {
        let mut inner = self.lock();
        inner.ticks.push(stamp.monotonic);
        inner.total_ticks += 1;
    }
}
