use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::Deserialize;

/// Geodetic position solution (NAV-POSLLH), in the receiver's integer encoding.
///
/// Reports arrive already framed and checksum-verified. Fields are never
/// range-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct RawPositionReport {
    /// Receiver epoch counter [ms]
    pub i_tow: u32,
    /// Longitude [1e-7 deg]
    pub lon: i32,
    /// Latitude [1e-7 deg]
    pub lat: i32,
    /// Height above ellipsoid [mm]
    pub height: i32,
    /// Height above mean sea level [mm]
    pub h_msl: i32,
    /// Horizontal accuracy estimate [mm]
    pub h_acc: u32,
    /// Vertical accuracy estimate [mm]
    pub v_acc: u32,
}

/// Velocity solution in the local NED frame (NAV-VELNED).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct RawVelocityReport {
    /// Receiver epoch counter [ms]
    pub i_tow: u32,
    /// North velocity [cm/s]
    pub vel_n: i32,
    /// East velocity [cm/s]
    pub vel_e: i32,
    /// Down velocity [cm/s]
    pub vel_d: i32,
    /// Speed accuracy estimate [cm/s]
    pub s_acc: u32,
}

/// How the receiver obtained its current solution.
///
/// The declaration order is the receiver's code order and is relied upon by
/// ordinal comparisons (see [`FixType::is_at_least_2d`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, FromPrimitive)]
#[repr(u8)]
pub enum FixType {
    #[default]
    NoFix = 0,
    DeadReckoningOnly = 1,
    Fix2D = 2,
    Fix3D = 3,
    GpsDeadReckoningCombined = 4,
    TimeOnly = 5,
}

impl FixType {
    /// Decodes a receiver fix-type code, `None` for codes outside the known set.
    pub fn from_code(code: u8) -> Option<FixType> {
        FixType::from_u8(code)
    }

    /// Ordinal check against [`FixType::Fix2D`]. Note that this also holds for
    /// [`FixType::GpsDeadReckoningCombined`] and [`FixType::TimeOnly`].
    pub fn is_at_least_2d(&self) -> bool {
        *self >= FixType::Fix2D
    }
}

bitflags! {
    /// Solution status flags (NAV-SOL `flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SolutionFlags: u8 {
        /// Fix within the receiver's DOP and accuracy masks
        const GPS_FIX_OK = 0x01;
        /// Differential corrections applied
        const DIFF_SOLN = 0x02;
        const WKN_SET = 0x04;
        const TOW_SET = 0x08;
    }
}

/// Navigation solution status (NAV-SOL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawSolutionReport {
    /// Receiver epoch counter [ms]
    pub i_tow: u32,
    pub gps_fix: FixType,
    pub flags: SolutionFlags,
    /// Number of satellites used in the solution
    pub num_sv: u8,
}

impl RawSolutionReport {
    /// Receiver self-assessment: the fix passes its own DOP/accuracy thresholds.
    pub fn fix_ok(&self) -> bool {
        self.flags.contains(SolutionFlags::GPS_FIX_OK)
    }
}
