use chrono::{DateTime, SubsecRound, Utc};

pub mod api;
pub mod image;
pub mod job;
pub mod prediction;

/// Current time at the microsecond precision Postgres stores, so records
/// read back equal to what was written.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
