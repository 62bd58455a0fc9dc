use log::debug;

use crate::core::time::{Clock, Timestamp};

/// Decides the output timestamp of a report from the epoch of the last report
/// of the sibling stream.
///
/// Equal epoch counters mean both reports describe the same instant, so the
/// sibling's timestamp is reused. Otherwise a fresh time is read from the clock.
/// The clock is only read when a fresh timestamp is needed.
pub struct EpochCorrelator;

impl EpochCorrelator {
    pub fn correlate(
        incoming_epoch: u32,
        other_last: Option<(u32, Timestamp)>,
        clock: &dyn Clock,
    ) -> Timestamp {
        match other_last {
            Some((other_epoch, other_stamp)) if other_epoch == incoming_epoch => {
                debug!("iTOW {incoming_epoch} ms matches sibling report, reusing its timestamp");
                other_stamp
            }
            _ => Timestamp::now(clock),
        }
    }
}
