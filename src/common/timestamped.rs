use crate::core::time::Timestamp;

/// A value paired with the host timestamp it was published with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timestamped<T> {
    pub t: Timestamp,
    pub v: T,
}

impl<T> Timestamped<T> {
    pub fn new(t: Timestamp, v: T) -> Self {
        Timestamped { t, v }
    }
}

pub type Ts<T> = Timestamped<T>;
