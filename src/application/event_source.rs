use crate::application::oauth::AuthSession;
use crate::domain::models::CalendarEvent;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::decode_events;
use crate::infrastructure::google_calendar_client::{GoogleCalendarClient, ListEventsRequest};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where analyzed events come from.
#[async_trait]
pub trait CalendarEventSource: Send + Sync {
    /// Events overlapping the inclusive date range `start..=end`.
    async fn fetch_events(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CalendarEvent>, InfraError>;

    /// The authenticated user's email, when it can be determined.
    async fn current_user_email(&self) -> Result<Option<String>, InfraError>;
}

pub struct GoogleCalendarEventSource<C>
where
    C: GoogleCalendarClient,
{
    calendar_client: Arc<C>,
    auth_session: Arc<dyn AuthSession>,
    calendar_id: String,
    timezone: Tz,
}

impl<C> GoogleCalendarEventSource<C>
where
    C: GoogleCalendarClient,
{
    pub fn new(
        calendar_client: Arc<C>,
        auth_session: Arc<dyn AuthSession>,
        calendar_id: impl Into<String>,
        timezone: Tz,
    ) -> Self {
        Self {
            calendar_client,
            auth_session,
            calendar_id: calendar_id.into(),
            timezone,
        }
    }
}

#[async_trait]
impl<C> CalendarEventSource for GoogleCalendarEventSource<C>
where
    C: GoogleCalendarClient,
{
    async fn fetch_events(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CalendarEvent>, InfraError> {
        let request = request_window(start, end, self.timezone)?;
        let access_token = self.auth_session.access_token().await?;
        let raw_events = self
            .calendar_client
            .list_events(&access_token, &self.calendar_id, request)
            .await?;
        let events = decode_events(&raw_events);
        debug!(
            calendar_id = %self.calendar_id,
            fetched = raw_events.len(),
            kept = events.len(),
            "decoded calendar events"
        );
        Ok(events)
    }

    async fn current_user_email(&self) -> Result<Option<String>, InfraError> {
        let access_token = self.auth_session.access_token().await?;
        match self.calendar_client.primary_calendar_email(&access_token).await {
            Ok(email) => Ok(email),
            Err(InfraError::AuthenticationRequired(message)) => {
                Err(InfraError::AuthenticationRequired(message))
            }
            Err(error) => {
                warn!(%error, "could not resolve the user's email; attendance uses self flags only");
                Ok(None)
            }
        }
    }
}

/// `[start 00:00, end+1 00:00)` in `timezone`, as UTC instants.
pub fn request_window(
    start: NaiveDate,
    end: NaiveDate,
    timezone: Tz,
) -> Result<ListEventsRequest, InfraError> {
    let after_end = end
        .succ_opt()
        .ok_or_else(|| InfraError::Validation(format!("end_date {end} is out of range")))?;
    Ok(ListEventsRequest {
        time_min: local_midnight(start, timezone)?,
        time_max: local_midnight(after_end, timezone)?,
    })
}

fn local_midnight(date: NaiveDate, timezone: Tz) -> Result<DateTime<Utc>, InfraError> {
    let midnight = date.and_time(NaiveTime::MIN);
    // Zones that skip midnight on a DST change start the day one hour later.
    timezone
        .from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            timezone
                .from_local_datetime(&(midnight + Duration::hours(1)))
                .earliest()
        })
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| {
            InfraError::Validation(format!("{date} has no local midnight in {timezone}"))
        })
}
