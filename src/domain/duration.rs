use crate::domain::models::{CalendarEvent, EventTime};
use tracing::trace;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;
const HOURS_PER_DAY: f64 = 24.0;

/// How a start/end pair encodes the extent of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeExtent {
    Timed,
    AllDay,
    Unknown,
}

pub fn classify(start: &EventTime, end: &EventTime) -> TimeExtent {
    if start.date_time.is_some() && end.date_time.is_some() {
        TimeExtent::Timed
    } else if start.date.is_some() && end.date.is_some() {
        TimeExtent::AllDay
    } else {
        TimeExtent::Unknown
    }
}

/// Elapsed hours of an event, unrounded.
///
/// All-day end dates are exclusive, so an all-day pair with equal start and
/// end dates yields zero hours. Unknown or mixed representations yield zero.
pub fn event_hours(event: &CalendarEvent) -> f64 {
    let hours = match classify(&event.start, &event.end) {
        TimeExtent::Timed => match (event.start.date_time, event.end.date_time) {
            (Some(start), Some(end)) => {
                (end - start).num_milliseconds() as f64 / MILLIS_PER_HOUR
            }
            _ => 0.0,
        },
        TimeExtent::AllDay => match (event.start.date, event.end.date) {
            (Some(start), Some(end)) => (end - start).num_days() as f64 * HOURS_PER_DAY,
            _ => 0.0,
        },
        TimeExtent::Unknown => 0.0,
    };
    trace!(title = event.title.as_deref().unwrap_or(""), hours, "computed event duration");
    hours
}
