//! Time source for the pipeline
//!
//! Every timestamp the crate produces or compares lives in one fixed
//! offset (UTC+9, the search service's local time). Components take a
//! [`Clock`] at construction instead of reading the system time directly,
//! so tests can pin "now".

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use std::sync::{Arc, Mutex};

/// Offset of all persisted and queried timestamps, in seconds east of UTC
pub const JST_OFFSET_SECS: i32 = 9 * 3600;

/// Storage/query format. Lexicographic order equals chronological order
/// as long as every value carries the same offset.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S+09:00";

/// The fixed UTC+9 offset
pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_SECS).expect("UTC+9 is a valid offset")
}

/// Format a timestamp in the persisted representation
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.with_timezone(&jst()).format(TIMESTAMP_FORMAT).to_string()
}

/// Parse any RFC 3339 timestamp and normalize it to UTC+9
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&jst()))
}

/// Source of "now"
pub trait Clock: Send + Sync {
    /// Current time in UTC+9
    fn now(&self) -> DateTime<FixedOffset>;

    /// Start of the trailing window of `days` days ending now
    fn days_ago(&self, days: i64) -> DateTime<FixedOffset> {
        self.now() - Duration::days(days)
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&jst())
    }
}

/// Manually driven clock for tests and replays
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<FixedOffset>>>,
}

impl FixedClock {
    /// Create a clock frozen at `now`
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Create a clock frozen at the given local (UTC+9) wall time
    ///
    /// # Panics
    ///
    /// Panics if the fields do not form a valid date and time
    pub fn at(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        let now = jst()
            .with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .expect("unambiguous wall time in a fixed offset");
        Self::new(now)
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
