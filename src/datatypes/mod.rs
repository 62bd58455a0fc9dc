pub mod diagnostics;
pub mod fused;
pub mod reports;
