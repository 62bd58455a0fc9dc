use std::{fs, io, path::Path};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    components::{config::PublishToggles, fusion::FixFusionEngine},
    core::time::{Clock, SimulatedClock, Timestamp, sec_f64_to_timedelta},
    datatypes::{
        fused::{FusedFix, FusedVelocity},
        reports::{FixType, RawPositionReport, RawSolutionReport, RawVelocityReport, SolutionFlags},
    },
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Could not read replay log: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed replay log: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not write output: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unknown fix type code {code} in entry {index}")]
    UnknownFixType { index: usize, code: u8 },

    #[error("Invalid receive time {t} s in entry {index}")]
    InvalidTime { index: usize, t: f64 },
}

/// Recorded receiver reports, each with the time [s] at which it was received.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplayLog {
    #[serde(default)]
    pub name: String,
    pub entries: Vec<ReplayEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplayEntry {
    /// Receive time [s] since the start of the recording
    pub t: f64,
    pub report: ReplayReport,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayReport {
    Position(RawPositionReport),
    Velocity(RawVelocityReport),
    Solution(SolutionRecord),
}

/// Solution status with the fix type and flags in their raw receiver codes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SolutionRecord {
    pub i_tow: u32,
    pub gps_fix: u8,
    #[serde(default)]
    pub flags: u8,
    pub num_sv: u8,
}

impl SolutionRecord {
    /// Unknown flag bits are dropped, unknown fix types are rejected.
    pub fn decode(&self) -> Option<RawSolutionReport> {
        Some(RawSolutionReport {
            i_tow: self.i_tow,
            gps_fix: FixType::from_code(self.gps_fix)?,
            flags: SolutionFlags::from_bits_truncate(self.flags),
            num_sv: self.num_sv,
        })
    }
}

impl ReplayLog {
    pub fn from_json(json: &str) -> Result<ReplayLog, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<ReplayLog, Error> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// One line of the replay output, either a fix or a velocity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRow {
    pub kind: &'static str,
    /// Output timestamp, monotonic [s]
    pub stamp_s: f64,
    pub i_tow: u32,
    pub latitude_deg: Option<f64>,
    pub longitude_deg: Option<f64>,
    pub altitude_m: Option<f64>,
    pub horizontal_variance_m2: Option<f64>,
    pub vertical_variance_m2: Option<f64>,
    pub status: Option<String>,
    pub vel_e_m_s: Option<f64>,
    pub vel_n_m_s: Option<f64>,
    pub vel_u_m_s: Option<f64>,
    pub speed_variance_m2_s2: Option<f64>,
}

impl OutputRow {
    fn empty(kind: &'static str, stamp: Timestamp, i_tow: u32) -> Self {
        OutputRow {
            kind,
            stamp_s: stamp.monotonic.elapsed_seconds_f64(),
            i_tow,
            latitude_deg: None,
            longitude_deg: None,
            altitude_m: None,
            horizontal_variance_m2: None,
            vertical_variance_m2: None,
            status: None,
            vel_e_m_s: None,
            vel_n_m_s: None,
            vel_u_m_s: None,
            speed_variance_m2_s2: None,
        }
    }

    pub fn from_fix(fix: &FusedFix, i_tow: u32) -> Self {
        OutputRow {
            latitude_deg: Some(fix.latitude_deg),
            longitude_deg: Some(fix.longitude_deg),
            altitude_m: Some(fix.altitude_m),
            horizontal_variance_m2: Some(fix.horizontal_variance()),
            vertical_variance_m2: Some(fix.vertical_variance()),
            status: Some(fix.status.to_string()),
            ..Self::empty("fix", fix.stamp, i_tow)
        }
    }

    pub fn from_velocity(vel: &FusedVelocity, i_tow: u32) -> Self {
        OutputRow {
            vel_e_m_s: Some(vel.linear_enu_m_s.x),
            vel_n_m_s: Some(vel.linear_enu_m_s.y),
            vel_u_m_s: Some(vel.linear_enu_m_s.z),
            speed_variance_m2_s2: Some(vel.linear_variance()),
            ..Self::empty("velocity", vel.stamp, i_tow)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaySummary {
    pub positions: usize,
    pub velocities: usize,
    pub solutions: usize,
    /// Velocities that shared their timestamp with the position of the same epoch
    pub correlated: usize,
}

/// Feeds every entry of `log` to `engine`, in log order, advancing `clock` to
/// each receive time so replays are deterministic.
///
/// Raw reports are logged when their publish toggle is set. Fused outputs are
/// written to `output` when given.
pub fn run<W: io::Write>(
    log: &ReplayLog,
    engine: &mut FixFusionEngine,
    clock: &mut SimulatedClock,
    publish: &PublishToggles,
    mut output: Option<&mut csv::Writer<W>>,
) -> Result<ReplaySummary, Error> {
    let mut summary = ReplaySummary::default();

    info!("Replaying '{}': {} entries", log.name, log.entries.len());

    for (index, entry) in log.entries.iter().enumerate() {
        if !entry.t.is_finite() || entry.t < 0.0 {
            return Err(Error::InvalidTime { index, t: entry.t });
        }

        let t = sec_f64_to_timedelta(entry.t);
        if t < clock.monotonic().elapsed() {
            warn!("Entry {index} received at {} s goes back in time, clock held", entry.t);
        }
        clock.advance_to(t);

        match &entry.report {
            ReplayReport::Position(report) => {
                let report = *report;
                if publish.nav_posllh {
                    info!("NAV-POSLLH: {report:?}");
                }

                let fix = engine.on_position(report, &*clock);
                summary.positions += 1;

                if let Some(writer) = output.as_mut() {
                    writer.serialize(OutputRow::from_fix(&fix, report.i_tow))?;
                }
            }
            ReplayReport::Velocity(report) => {
                let report = *report;
                if publish.nav_velned {
                    info!("NAV-VELNED: {report:?}");
                }

                let sibling = engine
                    .last_position()
                    .filter(|pos| pos.v.i_tow == report.i_tow)
                    .map(|pos| pos.t);

                let vel = engine.on_velocity(report, &*clock);
                summary.velocities += 1;
                if sibling == Some(vel.stamp) {
                    summary.correlated += 1;
                }

                if let Some(writer) = output.as_mut() {
                    writer.serialize(OutputRow::from_velocity(&vel, report.i_tow))?;
                }
            }
            ReplayReport::Solution(record) => {
                let report = record.decode().ok_or(Error::UnknownFixType {
                    index,
                    code: record.gps_fix,
                })?;
                if publish.nav_sol {
                    info!("NAV-SOL: {report:?}");
                }

                engine.on_solution(report);
                summary.solutions += 1;
            }
        }
    }

    if let Some(writer) = output {
        writer.flush()?;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::datatypes::diagnostics::Severity;

    const LOG: &str = r#"{
        "name": "bench",
        "entries": [
            { "t": 0.10, "report": { "type": "solution", "i_tow": 1000, "gps_fix": 3, "flags": 13, "num_sv": 9 } },
            { "t": 0.12, "report": { "type": "position", "i_tow": 1000, "lon": 85155100, "lat": 473397000,
                                     "height": 500000, "h_msl": 452000, "h_acc": 2000, "v_acc": 3000 } },
            { "t": 0.13, "report": { "type": "velocity", "i_tow": 1000, "vel_n": -50, "vel_e": 150, "vel_d": 200, "s_acc": 50 } },
            { "t": 0.37, "report": { "type": "velocity", "i_tow": 1250, "vel_n": -50, "vel_e": 150, "vel_d": 200, "s_acc": 50 } },
            { "t": 0.38, "report": { "type": "position", "i_tow": 1250, "lon": 85155200, "lat": 473397100,
                                     "height": 500100, "h_msl": 452100, "h_acc": 2000, "v_acc": 3000 } }
        ]
    }"#;

    #[test]
    fn test_parse() {
        let log = ReplayLog::from_json(LOG).unwrap();

        assert_eq!(log.name, "bench");
        assert_eq!(log.entries.len(), 5);
        assert_eq!(
            log.entries[1].report,
            ReplayReport::Position(RawPositionReport {
                i_tow: 1000,
                lon: 85155100,
                lat: 473397000,
                height: 500000,
                h_msl: 452000,
                h_acc: 2000,
                v_acc: 3000,
            })
        );
        assert_eq!(
            log.entries[2].report,
            ReplayReport::Velocity(RawVelocityReport {
                i_tow: 1000,
                vel_n: -50,
                vel_e: 150,
                vel_d: 200,
                s_acc: 50,
            })
        );
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            ReplayLog::from_json(r#"{ "entries": [ { "t": 0.0, "report": { "type": "almanac" } } ] }"#),
            Err(Error::Json(_))
        ));
        // A position record missing a field of the raw report
        assert!(matches!(
            ReplayLog::from_json(
                r#"{ "entries": [ { "t": 0.0, "report": { "type": "position", "i_tow": 0, "lon": 0 } } ] }"#
            ),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_solution_decode() {
        let record = SolutionRecord {
            i_tow: 5,
            gps_fix: 2,
            flags: 0xF1,
            num_sv: 4,
        };
        let report = record.decode().unwrap();

        assert_eq!(report.gps_fix, FixType::Fix2D);
        assert_eq!(report.flags, SolutionFlags::GPS_FIX_OK);

        let record = SolutionRecord { gps_fix: 9, ..record };
        assert_eq!(record.decode(), None);
    }

    #[test]
    fn test_run() {
        let log = ReplayLog::from_json(LOG).unwrap();
        let mut engine = FixFusionEngine::new("gps");
        let mut clock = SimulatedClock::default();
        let mut writer = csv::Writer::from_writer(vec![]);

        let summary = run(
            &log,
            &mut engine,
            &mut clock,
            &PublishToggles::default(),
            Some(&mut writer),
        )
        .unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                positions: 2,
                velocities: 2,
                solutions: 1,
                correlated: 1,
            }
        );

        let diag = engine.diagnostic();
        assert_eq!(diag.level, Severity::Ok);
        assert_eq!(diag.message, "3D fix");

        let csv = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("kind,stamp_s,i_tow,latitude_deg"));
        assert!(lines[1].starts_with("fix,0.12,1000,"));
        assert!(lines[1].contains(",fix,"));
        assert!(lines[2].starts_with("velocity,0.12,1000,"));
        // The second epoch is stamped when its velocity arrives
        assert!(lines[3].starts_with("velocity,0.37,1250,"));
        assert!(lines[4].starts_with("fix,0.37,1250,"));
    }

    #[test]
    fn test_run_unknown_fix_type() {
        let log = ReplayLog::from_json(
            r#"{ "entries": [ { "t": 0.0, "report": { "type": "solution", "i_tow": 0, "gps_fix": 7, "num_sv": 0 } } ] }"#,
        )
        .unwrap();

        let err = run::<io::Sink>(
            &log,
            &mut FixFusionEngine::new("gps"),
            &mut SimulatedClock::default(),
            &PublishToggles::default(),
            None,
        )
        .unwrap_err();

        assert!(matches!(err, Error::UnknownFixType { index: 0, code: 7 }));
    }

    #[test]
    fn test_run_invalid_time() {
        let log = ReplayLog {
            name: String::new(),
            entries: vec![ReplayEntry {
                t: -1.0,
                report: ReplayReport::Solution(SolutionRecord {
                    i_tow: 0,
                    gps_fix: 3,
                    flags: 1,
                    num_sv: 6,
                }),
            }],
        };

        let err = run::<io::Sink>(
            &log,
            &mut FixFusionEngine::new("gps"),
            &mut SimulatedClock::default(),
            &PublishToggles::default(),
            None,
        )
        .unwrap_err();

        assert!(matches!(err, Error::InvalidTime { index: 0, .. }));
    }
}
