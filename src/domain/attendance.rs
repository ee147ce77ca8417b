use crate::domain::models::{CalendarEvent, ResponseStatus};

/// Whether the authenticated user is inferred to take part in `event`.
///
/// The organizer always attends. Events without attendees, and events where
/// the user cannot be found among the attendees, are treated as private and
/// count as attended. Otherwise only an `accepted` response counts.
pub fn attended(event: &CalendarEvent, user_email: Option<&str>) -> bool {
    if event
        .organizer
        .as_ref()
        .is_some_and(|organizer| organizer.is_self)
    {
        return true;
    }

    if event.attendees.is_empty() {
        return true;
    }

    let user_email = user_email.map(str::trim).filter(|email| !email.is_empty());
    let own_record = event
        .attendees
        .iter()
        .find(|attendee| attendee.is_self)
        .or_else(|| {
            let email = user_email?;
            event
                .attendees
                .iter()
                .find(|attendee| attendee.email.eq_ignore_ascii_case(email))
        });

    match own_record {
        Some(attendee) => attendee.response_status == ResponseStatus::Accepted,
        None => true,
    }
}

pub fn filter_attended(events: Vec<CalendarEvent>, user_email: Option<&str>) -> Vec<CalendarEvent> {
    events
        .into_iter()
        .filter(|event| attended(event, user_email))
        .collect()
}
