use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use nalgebra::{Matrix3, Matrix6, Vector3};

use crate::{
    common::Ts,
    components::{
        correlator::EpochCorrelator, rate_monitor::FixTickSink, solution::SolutionTracker, units,
    },
    core::time::Clock,
    datatypes::{
        diagnostics::{DiagnosticField, DiagnosticStatus, Severity},
        fused::{
            COVARIANCE_UNSUPPORTED, CovarianceType, FixStatus, FusedFix, FusedVelocity,
            NavService,
        },
        reports::{RawPositionReport, RawSolutionReport, RawVelocityReport},
    },
};

/// Fuses position, velocity and solution-status reports of one receiver into
/// timestamped fixes and velocities with covariance.
///
/// Every `on_*` call runs to completion and only touches this struct's state.
pub struct FixFusionEngine {
    frame_id: String,
    tracker: SolutionTracker,
    last_position: Option<Ts<RawPositionReport>>,
    last_velocity: Option<Ts<RawVelocityReport>>,
    fix_ticks: Option<Box<dyn FixTickSink + Send>>,
}

impl FixFusionEngine {
    pub fn new(frame_id: impl Into<String>) -> Self {
        FixFusionEngine {
            frame_id: frame_id.into(),
            tracker: SolutionTracker::new(),
            last_position: None,
            last_velocity: None,
            fix_ticks: None,
        }
    }

    /// Ticks `sink` with the output timestamp of every fix.
    pub fn with_tick_sink(mut self, sink: Box<dyn FixTickSink + Send>) -> Self {
        self.fix_ticks = Some(sink);
        self
    }

    pub fn on_position(&mut self, report: RawPositionReport, clock: &dyn Clock) -> FusedFix {
        let stamp = EpochCorrelator::correlate(
            report.i_tow,
            self.last_velocity.as_ref().map(|vel| (vel.v.i_tow, vel.t)),
            clock,
        );

        let var_h = units::variance_from_accuracy_mm(report.h_acc);
        let var_v = units::variance_from_accuracy_mm(report.v_acc);

        let status = if self.tracker.fix_type().is_at_least_2d() {
            FixStatus::Fix
        } else {
            FixStatus::NoFix
        };

        let fix = FusedFix {
            stamp,
            frame_id: self.frame_id.clone(),
            latitude_deg: units::deg_from_1e7(report.lat),
            longitude_deg: units::deg_from_1e7(report.lon),
            altitude_m: units::m_from_mm(report.height),
            position_covariance: Matrix3::from_diagonal(&Vector3::new(var_h, var_h, var_v)),
            covariance_type: CovarianceType::DiagonalKnown,
            status,
            service: NavService::Gps,
        };

        debug!(
            "Fix iTOW {} ms: {:.7}, {:.7}, {:.3} m, {}",
            report.i_tow, fix.latitude_deg, fix.longitude_deg, fix.altitude_m, fix.status
        );

        self.last_position = Some(Ts::new(stamp, report));

        if let Some(sink) = &mut self.fix_ticks {
            sink.tick(stamp);
        }

        fix
    }

    pub fn on_velocity(&mut self, report: RawVelocityReport, clock: &dyn Clock) -> FusedVelocity {
        let stamp = EpochCorrelator::correlate(
            report.i_tow,
            self.last_position.as_ref().map(|pos| (pos.v.i_tow, pos.t)),
            clock,
        );

        // NED -> ENU
        let linear_enu_m_s = Vector3::new(
            units::m_s_from_cm_s(report.vel_e),
            units::m_s_from_cm_s(report.vel_n),
            -units::m_s_from_cm_s(report.vel_d),
        );

        let var_speed = units::variance_from_accuracy_cm(report.s_acc);

        let mut covariance = Matrix6::zeros();
        for i in 0..3 {
            covariance[(i, i)] = var_speed;
        }
        covariance[(3, 3)] = COVARIANCE_UNSUPPORTED;

        self.last_velocity = Some(Ts::new(stamp, report));

        FusedVelocity {
            stamp,
            frame_id: self.frame_id.clone(),
            linear_enu_m_s,
            covariance,
        }
    }

    pub fn on_solution(&mut self, report: RawSolutionReport) {
        self.tracker.record(report);
    }

    pub fn classify(&self) -> (Severity, String) {
        self.tracker.classify()
    }

    pub fn telemetry_fields(&self) -> Vec<DiagnosticField> {
        self.tracker.telemetry_fields(self.last_position.as_ref().map(|pos| &pos.v))
    }

    /// Fix diagnostic snapshot, for pull-based aggregators.
    pub fn diagnostic(&self) -> DiagnosticStatus {
        let (level, message) = self.classify();

        DiagnosticStatus {
            name: "fix".to_string(),
            level,
            message,
            values: self.telemetry_fields(),
        }
    }

    pub fn last_position(&self) -> Option<&Ts<RawPositionReport>> {
        self.last_position.as_ref()
    }

    pub fn last_velocity(&self) -> Option<&Ts<RawVelocityReport>> {
        self.last_velocity.as_ref()
    }
}

/// [`FixFusionEngine`] behind a single lock, for deployments where reports of
/// different kinds are delivered from different threads.
///
/// All three entry points share the same lock, so a correlation decision never
/// observes a half-updated sibling.
#[derive(Clone)]
pub struct SharedFusionEngine {
    inner: Arc<Mutex<FixFusionEngine>>,
}

impl SharedFusionEngine {
    pub fn new(engine: FixFusionEngine) -> Self {
        SharedFusionEngine {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    pub fn on_position(&self, report: RawPositionReport, clock: &dyn Clock) -> FusedFix {
        self.lock().on_position(report, clock)
    }

    pub fn on_velocity(&self, report: RawVelocityReport, clock: &dyn Clock) -> FusedVelocity {
        self.lock().on_velocity(report, clock)
    }

    pub fn on_solution(&self, report: RawSolutionReport) {
        self.lock().on_solution(report)
    }

    pub fn diagnostic(&self) -> DiagnosticStatus {
        self.lock().diagnostic()
    }

    fn lock(&self) -> MutexGuard<'_, FixFusionEngine> {
        // Every on_* call leaves the engine consistent, even one that panicked midway
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
