use nalgebra::{Matrix3, Matrix6, Vector3};
use strum::{AsRefStr, Display};

use crate::core::time::Timestamp;

/// Reserved covariance value for quantities the receiver does not measure.
///
/// Distinct from `0.0`, which would claim a perfectly known quantity.
pub const COVARIANCE_UNSUPPORTED: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum FixStatus {
    #[strum(serialize = "no_fix")]
    NoFix,
    #[strum(serialize = "fix")]
    Fix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum NavService {
    #[strum(serialize = "gps")]
    Gps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum CovarianceType {
    #[strum(serialize = "diagonal_known")]
    DiagonalKnown,
}

/// Geodetic position fix with its uncertainty.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedFix {
    pub stamp: Timestamp,
    pub frame_id: String,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    /// Height above ellipsoid
    pub altitude_m: f64,
    /// East, north, up position variances on the diagonal [m^2]
    pub position_covariance: Matrix3<f64>,
    pub covariance_type: CovarianceType,
    pub status: FixStatus,
    pub service: NavService,
}

impl FusedFix {
    pub fn horizontal_variance(&self) -> f64 {
        self.position_covariance[(0, 0)]
    }

    pub fn vertical_variance(&self) -> f64 {
        self.position_covariance[(2, 2)]
    }
}

/// Linear velocity in the local east-north-up frame, with a 6x6 twist covariance
/// (linear x/y/z then angular x/y/z).
#[derive(Debug, Clone, PartialEq)]
pub struct FusedVelocity {
    pub stamp: Timestamp,
    pub frame_id: String,
    pub linear_enu_m_s: Vector3<f64>,
    pub covariance: Matrix6<f64>,
}

impl FusedVelocity {
    pub fn linear_variance(&self) -> f64 {
        self.covariance[(0, 0)]
    }
}
