use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::GoogleCalendarEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";
const PRIMARY_CALENDAR_ID: &str = "primary";
const PAGE_SIZE: &str = "2500";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ListEventsRequest {
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
}

#[async_trait]
pub trait GoogleCalendarClient: Send + Sync {
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        request: ListEventsRequest,
    ) -> Result<Vec<GoogleCalendarEvent>, InfraError>;

    /// The id of the primary calendar, which is the account's email address.
    async fn primary_calendar_email(&self, access_token: &str) -> Result<Option<String>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestGoogleCalendarClient {
    client: Client,
    api_base: String,
}

impl ReqwestGoogleCalendarClient {
    pub fn new() -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| InfraError::CalendarApi(format!("failed to build http client: {error}")))?;
        Ok(Self {
            client,
            api_base: CALENDAR_API_BASE.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::CalendarApi(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn http_error(status: StatusCode, body: &str) -> InfraError {
        if status == StatusCode::UNAUTHORIZED {
            return InfraError::AuthenticationRequired(
                "google rejected the stored access token".to_string(),
            );
        }
        if body.trim().is_empty() {
            InfraError::CalendarApi(format!("http {}", status.as_u16()))
        } else {
            InfraError::CalendarApi(format!("http {}; body={body}", status.as_u16()))
        }
    }

    fn calendar_endpoint(&self, calendar_id: &str, suffix: Option<&str>) -> Result<Url, InfraError> {
        let mut url = Url::parse(&self.api_base).map_err(|error| {
            InfraError::CalendarApi(format!("invalid calendar api base url: {error}"))
        })?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::CalendarApi("calendar api base URL cannot be a base".to_string())
            })?;
            segments.pop_if_empty();
            segments.push("calendars");
            segments.push(calendar_id);
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        Ok(url)
    }

    async fn get_body(&self, request: reqwest::RequestBuilder, action: &str) -> Result<String, InfraError> {
        let response = request.send().await.map_err(|error| {
            InfraError::CalendarApi(format!("network error while {action}: {error}"))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::CalendarApi(format!("failed reading response while {action}: {error}"))
        })?;

        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }
        Ok(body)
    }
}

#[derive(Debug, serde::Deserialize)]
struct EventsPageResponse {
    items: Option<Vec<GoogleCalendarEvent>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct CalendarResourceResponse {
    id: Option<String>,
}

#[async_trait]
impl GoogleCalendarClient for ReqwestGoogleCalendarClient {
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        request: ListEventsRequest,
    ) -> Result<Vec<GoogleCalendarEvent>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(calendar_id, "calendar id")?;

        let endpoint = self.calendar_endpoint(calendar_id, Some("events"))?;
        let time_min = request.time_min.to_rfc3339();
        let time_max = request.time_max.to_rfc3339();
        let mut page_token: Option<String> = None;
        let mut events = Vec::new();

        loop {
            let mut req = self
                .client
                .get(endpoint.clone())
                .bearer_auth(access_token)
                .query(&[
                    ("singleEvents", "true"),
                    ("orderBy", "startTime"),
                    ("maxResults", PAGE_SIZE),
                    ("timeMin", time_min.as_str()),
                    ("timeMax", time_max.as_str()),
                ]);
            if let Some(page_token) = page_token.as_deref() {
                req = req.query(&[("pageToken", page_token)]);
            }

            let body = self.get_body(req, "listing calendar events").await?;
            let mut parsed: EventsPageResponse = serde_json::from_str(&body).map_err(|error| {
                InfraError::CalendarApi(format!("invalid events list payload: {error}"))
            })?;

            events.extend(parsed.items.take().unwrap_or_default());
            match parsed.next_page_token.take() {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(calendar_id, count = events.len(), "fetched calendar events");
        Ok(events)
    }

    async fn primary_calendar_email(&self, access_token: &str) -> Result<Option<String>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let endpoint = self.calendar_endpoint(PRIMARY_CALENDAR_ID, None)?;
        let req = self.client.get(endpoint).bearer_auth(access_token);
        let body = self.get_body(req, "reading primary calendar").await?;
        let parsed: CalendarResourceResponse = serde_json::from_str(&body).map_err(|error| {
            InfraError::CalendarApi(format!("invalid calendar payload: {error}"))
        })?;

        Ok(parsed
            .id
            .map(|value| value.trim().to_string())
            .filter(|value| value.contains('@')))
    }
}
