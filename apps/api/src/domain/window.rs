use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Absolute time range used to scope history and statistics
///
/// Both bounds are inclusive; a missing bound is open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// All of recorded time
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// The `span` leading up to `now`
    ///
    /// `None` when the start would fall outside the representable range.
    pub fn last(span: Duration, now: DateTime<Utc>) -> Option<Self> {
        now.checked_sub_signed(span)
            .map(|start| Self::between(start, now))
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| at >= start) && self.end.map_or(true, |end| at <= end)
    }

    /// Whether `at` is no later than the end bound
    pub fn reaches(&self, at: DateTime<Utc>) -> bool {
        self.end.map_or(true, |end| at <= end)
    }
}
