use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::errors::ApiError;
use crate::domain::window::TimeWindow;

/// `window`, `since` and `until` query parameters
///
/// `since`/`until` take RFC 3339 timestamps and win over `window`, which is
/// either `all` or a span such as `30m`, `24h` or `7d` ending now.
#[derive(Debug, Default, Deserialize)]
pub struct WindowParams {
    pub window: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
}

impl WindowParams {
    pub fn resolve(&self, now: DateTime<Utc>, default_span: Duration) -> Result<TimeWindow, ApiError> {
        let since = parse_timestamp("since", self.since.as_deref())?;
        let until = parse_timestamp("until", self.until.as_deref())?;

        if since.is_some() || until.is_some() {
            if let (Some(start), Some(end)) = (since, until) {
                if start > end {
                    return Err(ApiError::bad_request("since must not be after until"));
                }
            }
            return Ok(TimeWindow {
                start: since,
                end: until,
            });
        }

        let span = match self.window.as_deref().map(str::trim) {
            None | Some("") => default_span,
            Some("all") => return Ok(TimeWindow::all()),
            Some(span) => parse_span(span)?,
        };

        TimeWindow::last(span, now).ok_or_else(|| ApiError::bad_request("Invalid window"))
    }
}

/// Parses an optional RFC 3339 query value
pub fn parse_timestamp(name: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    raw.filter(|value| !value.trim().is_empty())
        .map(|value| {
            DateTime::parse_from_rfc3339(value.trim())
                .map(|at| at.with_timezone(&Utc))
                .map_err(|e| ApiError::bad_request(format!("Invalid {}: {}", name, e)))
        })
        .transpose()
}

/// Parses spans like `15m`, `24h` or `7d`
fn parse_span(span: &str) -> Result<Duration, ApiError> {
    let invalid = || ApiError::bad_request(format!("Invalid window: {}", span));

    let unit = span.chars().last().ok_or_else(invalid)?;
    let amount: i64 = span[..span.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }

    let span = match unit {
        'm' => Duration::try_minutes(amount),
        'h' => Duration::try_hours(amount),
        'd' => Duration::try_days(amount),
        _ => None,
    };
    span.ok_or_else(invalid)
}
