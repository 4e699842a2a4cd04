/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Monotonic counter value identifying one occupant of the job slot.
///
/// Every accepted submission bumps the counter; results tagged with an
/// older value are stale and must be discarded.
pub type Generation = u64;
