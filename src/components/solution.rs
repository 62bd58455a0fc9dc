use log::{info, warn};

use crate::{
    components::units,
    datatypes::{
        diagnostics::{DiagnosticField, Severity},
        reports::{FixType, RawPositionReport, RawSolutionReport},
    },
};

/// Keeps the latest solution-status report and derives the fix health from it.
#[derive(Debug, Clone, Default)]
pub struct SolutionTracker {
    last_solution: Option<RawSolutionReport>,
}

impl SolutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the held report. Arrival order is trusted, epochs are not checked.
    pub fn record(&mut self, report: RawSolutionReport) {
        let was_fix = self.fix_type().is_at_least_2d();

        if was_fix && !report.gps_fix.is_at_least_2d() {
            warn!(
                "Fix lost at iTOW {} ms: {:?}, {} SVs",
                report.i_tow, report.gps_fix, report.num_sv
            );
        } else if !was_fix && report.gps_fix.is_at_least_2d() {
            info!(
                "Fix acquired at iTOW {} ms: {:?}, {} SVs",
                report.i_tow, report.gps_fix, report.num_sv
            );
        }

        self.last_solution = Some(report);
    }

    pub fn last_solution(&self) -> Option<&RawSolutionReport> {
        self.last_solution.as_ref()
    }

    /// Fix type of the last report, [`FixType::NoFix`] before any report.
    pub fn fix_type(&self) -> FixType {
        self.last_solution.map_or(FixType::NoFix, |sol| sol.gps_fix)
    }

    /// Severity and message of the current fix. Rules are applied in order and
    /// later rules override earlier ones.
    ///
    /// Before the first report this is `(Ok, "")`.
    pub fn classify(&self) -> (Severity, String) {
        let Some(sol) = &self.last_solution else {
            return (Severity::Ok, String::new());
        };

        let (mut level, mut message) = match sol.gps_fix {
            FixType::DeadReckoningOnly => (Severity::Warn, "Dead reckoning only".to_string()),
            FixType::Fix2D => (Severity::Ok, "2D fix".to_string()),
            FixType::Fix3D => (Severity::Ok, "3D fix".to_string()),
            FixType::GpsDeadReckoningCombined => {
                (Severity::Ok, "GPS and dead reckoning combined".to_string())
            }
            FixType::TimeOnly => (Severity::Ok, "Time fix only".to_string()),
            FixType::NoFix => (Severity::Ok, String::new()),
        };

        if !sol.fix_ok() {
            level = Severity::Warn;
            message.push_str(", fix not ok");
        }

        if sol.gps_fix == FixType::NoFix {
            level = Severity::Error;
            message = "No fix".to_string();
        }

        (level, message)
    }

    /// Diagnostic key/values. Position fields come from `last_position`, the
    /// satellite count from the held solution; missing reports read as zero.
    pub fn telemetry_fields(
        &self,
        last_position: Option<&RawPositionReport>,
    ) -> Vec<DiagnosticField> {
        let pos = last_position.copied().unwrap_or_default();
        let num_sv = self.last_solution.map_or(0, |sol| sol.num_sv);

        vec![
            DiagnosticField::int("iTOW [ms]", pos.i_tow as i64),
            DiagnosticField::float("Latitude [deg]", units::deg_from_1e7(pos.lat)),
            DiagnosticField::float("Longitude [deg]", units::deg_from_1e7(pos.lon)),
            DiagnosticField::float("Altitude [m]", units::m_from_mm(pos.height)),
            DiagnosticField::float("Height above MSL [m]", units::m_from_mm(pos.h_msl)),
            DiagnosticField::float("Horizontal Accuracy [m]", units::m_from_mm(pos.h_acc)),
            DiagnosticField::float("Vertical Accuracy [m]", units::m_from_mm(pos.v_acc)),
            DiagnosticField::int("# SVs used", num_sv as i64),
        ]
    }
}
