/// [1e-7 deg] -> [deg]
pub fn deg_from_1e7(v: i32) -> f64 {
    v as f64 * 1e-7
}

/// [mm] -> [m], for both signed positions and unsigned accuracies.
pub fn m_from_mm(v: impl Into<f64>) -> f64 {
    v.into() * 1e-3
}

/// [m] -> [mm], rounded to the nearest millimetre.
pub fn mm_from_m(v: f64) -> i32 {
    (v * 1e3).round() as i32
}

/// [cm/s] -> [m/s]
pub fn m_s_from_cm_s(v: i32) -> f64 {
    v as f64 / 100.0
}

/// Variance [m^2] of a 1-sigma accuracy estimate given in [mm].
pub fn variance_from_accuracy_mm(acc: u32) -> f64 {
    (acc as f64 / 1000.0).powi(2)
}

/// Variance [(m/s)^2] of a 1-sigma accuracy estimate given in [cm/s].
pub fn variance_from_accuracy_cm(acc: u32) -> f64 {
    (acc as f64 / 100.0).powi(2)
}
