//! Capture timestamps and their console rendering.
//!
//! Heads report capture time as whole seconds plus a sub-second part. The
//! formatter renders `YYYY-MM-DD HH:MM:SS:mmm` in the host's local time zone,
//! with the millisecond field truncated from the sub-second part.

use chrono::{DateTime, Local, TimeZone, Utc};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

const NANOS_PER_SEC: u32 = 1_000_000_000;
const NANOS_PER_MILLI: u32 = 1_000_000;

/// Capture time. Only constructible through `new` and friends, which keep
/// the sub-second part below one second.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaptureTimestamp {
    secs: i64,
    nanos: u32,
}

impl CaptureTimestamp {
    pub fn new(secs: i64, nanos: u32) -> Self {
        // Carry overflowing nanoseconds into the seconds field.
        Self {
            secs: secs.saturating_add(i64::from(nanos / NANOS_PER_SEC)),
            nanos: nanos % NANOS_PER_SEC,
        }
    }

    pub fn from_millis(millis: i64) -> Self {
        let secs = millis.div_euclid(1000);
        let rem = millis.rem_euclid(1000) as u32;
        Self::new(secs, rem * NANOS_PER_MILLI)
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => Self::new(d.as_secs() as i64, d.subsec_nanos()),
            Err(e) => {
                let d = e.duration();
                if d.subsec_nanos() == 0 {
                    Self::new(-(d.as_secs() as i64), 0)
                } else {
                    Self::new(-(d.as_secs() as i64) - 1, NANOS_PER_SEC - d.subsec_nanos())
                }
            }
        }
    }

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Seconds since the Unix epoch.
    pub fn secs(&self) -> i64 {
        self.secs
    }

    pub fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    /// Millisecond component, truncated.
    pub fn subsec_millis(&self) -> u32 {
        self.nanos / NANOS_PER_MILLI
    }
}

impl fmt::Display for CaptureTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.secs, self.nanos)
    }
}

/// Render a capture timestamp in the host's local time zone.
pub fn format_local(ts: CaptureTimestamp) -> String {
    format_in(ts, &Local)
}

/// Render a capture timestamp in an explicit time zone.
pub fn format_in<Tz>(ts: CaptureTimestamp, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let utc = DateTime::<Utc>::from_timestamp(ts.secs, 0).unwrap_or_default();
    format!(
        "{}:{:03}",
        utc.with_timezone(tz).format("%Y-%m-%d %H:%M:%S"),
        ts.subsec_millis()
    )
}
