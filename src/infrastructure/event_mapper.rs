use crate::domain::models::{Attendee, CalendarEvent, EventTime, Organizer, ResponseStatus};
use chrono::{DateTime, NaiveDate};
use tracing::debug;

const STATUS_CANCELLED: &str = "cancelled";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct GoogleEventDateTime {
    #[serde(rename = "dateTime", skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct GoogleEventAttendee {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "responseStatus", skip_serializing_if = "Option::is_none")]
    pub response_status: Option<String>,
    #[serde(rename = "self", default)]
    pub is_self: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct GoogleEventOrganizer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "self", default)]
    pub is_self: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct GoogleCalendarEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(rename = "colorId", skip_serializing_if = "Option::is_none")]
    pub color_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<GoogleEventDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<GoogleEventDateTime>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<GoogleEventAttendee>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer: Option<GoogleEventOrganizer>,
}

/// Converts an API event into the domain model. Cancelled events yield
/// `None`; malformed fields degrade to absent values instead of failing.
pub fn decode_event(event: &GoogleCalendarEvent) -> Option<CalendarEvent> {
    if event.status.as_deref() == Some(STATUS_CANCELLED) {
        return None;
    }

    let event_id = event.id.as_deref().unwrap_or("");
    Some(CalendarEvent {
        title: event
            .summary
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned),
        start: decode_time(event.start.as_ref(), event_id, "start"),
        end: decode_time(event.end.as_ref(), event_id, "end"),
        color_id: decode_color_id(event.color_id.as_deref(), event_id),
        attendees: event
            .attendees
            .iter()
            .map(|attendee| Attendee {
                email: attendee.email.clone().unwrap_or_default(),
                response_status: attendee
                    .response_status
                    .as_deref()
                    .map(ResponseStatus::parse)
                    .unwrap_or(ResponseStatus::Other),
                is_self: attendee.is_self,
            })
            .collect(),
        organizer: event.organizer.as_ref().map(|organizer| Organizer {
            email: organizer.email.clone().unwrap_or_default(),
            display_name: organizer.display_name.clone(),
            is_self: organizer.is_self,
        }),
    })
}

pub fn decode_events(events: &[GoogleCalendarEvent]) -> Vec<CalendarEvent> {
    events.iter().filter_map(decode_event).collect()
}

fn decode_time(value: Option<&GoogleEventDateTime>, event_id: &str, field_name: &str) -> EventTime {
    let Some(value) = value else {
        return EventTime::unknown();
    };

    let date_time = value.date_time.as_deref().and_then(|raw| {
        DateTime::parse_from_rfc3339(raw.trim())
            .map_err(|error| {
                debug!(event_id, field_name, raw, %error, "ignoring unparseable dateTime");
            })
            .ok()
    });
    let date = value.date.as_deref().and_then(|raw| {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|error| {
                debug!(event_id, field_name, raw, %error, "ignoring unparseable date");
            })
            .ok()
    });

    EventTime { date_time, date }
}

fn decode_color_id(value: Option<&str>, event_id: &str) -> Option<i64> {
    let raw = value.map(str::trim).filter(|value| !value.is_empty())?;
    match raw.parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            debug!(event_id, raw, "ignoring non-numeric colorId");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_event(json: serde_json::Value) -> GoogleCalendarEvent {
        serde_json::from_value(json).expect("valid event payload")
    }

    #[test]
    fn decodes_timed_event_with_attendees_and_organizer() {
        let event = api_event(serde_json::json!({
            "id": "evt-1",
            "status": "confirmed",
            "summary": "  Planning  ",
            "colorId": "4",
            "start": { "dateTime": "2025-01-15T09:00:00+09:00", "timeZone": "Asia/Tokyo" },
            "end": { "dateTime": "2025-01-15T10:30:00+09:00" },
            "attendees": [
                { "email": "me@example.com", "responseStatus": "accepted", "self": true },
                { "email": "other@example.com", "responseStatus": "tentative" }
            ],
            "organizer": { "email": "other@example.com", "displayName": "Other" }
        }));

        let decoded = decode_event(&event).expect("confirmed event");
        assert_eq!(decoded.title.as_deref(), Some("Planning"));
        assert_eq!(decoded.color_id, Some(4));
        assert!(decoded.start.date_time.is_some());
        assert!(decoded.start.date.is_none());
        assert_eq!(decoded.attendees.len(), 2);
        assert!(decoded.attendees[0].is_self);
        assert_eq!(decoded.attendees[1].response_status, ResponseStatus::Tentative);
        let organizer = decoded.organizer.expect("organizer");
        assert!(!organizer.is_self);
        assert_eq!(organizer.display_name.as_deref(), Some("Other"));
    }

    #[test]
    fn decodes_all_day_event_without_color() {
        let event = api_event(serde_json::json!({
            "id": "evt-2",
            "summary": "Holiday",
            "start": { "date": "2025-01-01" },
            "end": { "date": "2025-01-02" }
        }));

        let decoded = decode_event(&event).expect("event");
        assert_eq!(decoded.color_id, None);
        assert_eq!(decoded.start.date, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert!(decoded.attendees.is_empty());
        assert!(decoded.organizer.is_none());
    }

    #[test]
    fn malformed_fields_degrade_instead_of_failing() {
        let event = api_event(serde_json::json!({
            "id": "evt-3",
            "colorId": "teal",
            "start": { "dateTime": "not-a-time" },
            "attendees": [ { "responseStatus": "maybe" } ]
        }));

        let decoded = decode_event(&event).expect("event");
        assert_eq!(decoded.color_id, None);
        assert!(decoded.start.is_unknown());
        assert!(decoded.end.is_unknown());
        assert_eq!(decoded.attendees[0].email, "");
        assert_eq!(decoded.attendees[0].response_status, ResponseStatus::Other);
    }

    #[test]
    fn out_of_range_color_ids_are_kept() {
        let event = api_event(serde_json::json!({ "colorId": "42" }));
        assert_eq!(decode_event(&event).and_then(|event| event.color_id), Some(42));
    }

    #[test]
    fn cancelled_events_are_skipped() {
        let events = vec![
            api_event(serde_json::json!({ "id": "a", "status": "cancelled" })),
            api_event(serde_json::json!({ "id": "b", "status": "confirmed" })),
        ];
        assert_eq!(decode_events(&events).len(), 1);
    }
}
