use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vfuse_serde::{WireDeserialize, WireSerialize};

/// Seconds and nanoseconds since the Unix epoch.
///
/// `nsec` is always in `0..1_000_000_000`; instants before the epoch have a
/// negative `sec`. The all-zero value is used on the wire as the "leave
/// unchanged" sentinel for timestamp updates.
#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    WireSerialize,
    WireDeserialize,
)]
pub struct Timespec {
    pub sec: i64,
    pub nsec: i32,
}

impl Timespec {
    pub const UNSET: Timespec = Timespec { sec: 0, nsec: 0 };

    pub fn new(sec: i64, nsec: i32) -> Self {
        Self { sec, nsec }
    }

    pub fn is_unset(&self) -> bool {
        *self == Self::UNSET
    }

    pub fn to_system_time(self) -> SystemTime {
        if self.sec >= 0 {
            UNIX_EPOCH + Duration::new(self.sec as u64, self.nsec as u32)
        } else {
            UNIX_EPOCH - Duration::from_secs(self.sec.unsigned_abs())
                + Duration::from_nanos(self.nsec as u64)
        }
    }
}

impl From<SystemTime> for Timespec {
    fn from(t: SystemTime) -> Self {
        match t.duration_since(UNIX_EPOCH) {
            Ok(d) => Self {
                sec: d.as_secs() as i64,
                nsec: d.subsec_nanos() as i32,
            },
            Err(e) => {
                let d = e.duration();
                let mut sec = -(d.as_secs() as i64);
                let mut nsec = d.subsec_nanos() as i32;
                if nsec > 0 {
                    sec -= 1;
                    nsec = 1_000_000_000 - nsec;
                }
                Self { sec, nsec }
            }
        }
    }
}

impl From<DateTime<Utc>> for Timespec {
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            sec: dt.timestamp(),
            nsec: dt.timestamp_subsec_nanos() as i32,
        }
    }
}

impl fmt::Debug for Timespec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timespec({}.{:09})", self.sec, self.nsec)
    }
}

impl fmt::Display for Timespec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DateTime::<Utc>::from_timestamp(self.sec, self.nsec as u32) {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}.{:09}", self.sec, self.nsec),
        }
    }
}
