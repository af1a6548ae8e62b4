//! Google Calendar v3 event listing.
//
// Token acquisition is left to the operator: the source expects an already
// issued OAuth bearer token.

use super::{CalendarError, CalendarEvent, CalendarSource, TimeWindow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use log::debug;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3/";

// Hard stop against a server that keeps handing out page tokens.
const MAX_PAGES: usize = 20;

pub struct GoogleCalendarSource {
    client: Client,
    base_url: Url,
    calendar_id: String,
    token: SecretString,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleEvent {
    #[serde(default)]
    summary: String,
    start: Option<GoogleEventStart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventStart {
    date_time: Option<String>,
    date: Option<String>,
}

impl From<GoogleEvent> for CalendarEvent {
    fn from(event: GoogleEvent) -> Self {
        let (date_time, date) = match event.start {
            Some(start) => (
                start
                    .date_time
                    .filter(|s| !s.is_empty())
                    .and_then(|s| DateTime::parse_from_rfc3339(&s).ok()),
                start
                    .date
                    .filter(|s| !s.is_empty())
                    .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
            ),
            None => (None, None),
        };
        CalendarEvent::from_parts(event.summary, date_time, date)
    }
}

impl GoogleCalendarSource {
    pub fn new(
        calendar_id: impl Into<String>,
        token: SecretString,
        timeout: Duration,
    ) -> Result<Self, CalendarError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|e| CalendarError::Decode(format!("invalid base url: {}", e)))?;
        Ok(Self { client, base_url, calendar_id: calendar_id.into(), token })
    }

    /// Point the source at another API root, e.g. a local fake server.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    fn events_url(&self) -> Result<Url, CalendarError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                CalendarError::Decode(format!("{} cannot be used as an API root", self.base_url))
            })?;
            segments.pop_if_empty().extend(["calendars", self.calendar_id.as_str(), "events"]);
        }
        Ok(url)
    }

    async fn fetch_page(
        &self,
        url: &Url,
        window: &TimeWindow,
        page_token: Option<&str>,
    ) -> Result<EventsPage, CalendarError> {
        let mut query = vec![
            ("timeMin", window.start.to_rfc3339()),
            ("timeMax", window.end.to_rfc3339()),
            ("timeZone", window.timezone().name().to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let response = self
            .client
            .get(url.clone())
            .bearer_auth(self.token.expose_secret())
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CalendarError::Status { status: status.as_u16(), body });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| CalendarError::Decode(e.to_string()))
    }
}

#[async_trait]
impl CalendarSource for GoogleCalendarSource {
    async fn list_events(&self, window: &TimeWindow) -> Result<Vec<CalendarEvent>, CalendarError> {
        let url = self.events_url()?;
        debug!("Fetching Google Calendar events {} for {}", url, window);

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let page = self.fetch_page(&url, window, page_token.as_deref()).await?;
            events.extend(page.items.into_iter().map(CalendarEvent::from));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(events)
    }

    fn describe(&self) -> String {
        format!("google calendar '{}'", self.calendar_id)
    }
}
