//! Google Calendar v3 REST client.

use super::{CalendarEntry, CalendarError, CalendarService, EventBody, RemoteEvent};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListPage {
    #[serde(default)]
    items: Vec<CalendarListItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarListItem {
    id: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    primary: bool,
}

#[derive(Debug, Deserialize)]
struct EventsPage {
    #[serde(default)]
    items: Vec<RemoteEvent>,
}

/// Google Calendar client authenticated with a bearer token
pub struct GoogleCalendar {
    http: Client,
    base: Url,
    token: SecretString,
}

impl GoogleCalendar {
    pub fn new(api_base: &str, token: SecretString) -> Result<Self, CalendarError> {
        let base = Url::parse(api_base).map_err(|e| CalendarError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(CalendarError::InvalidUrl(api_base.to_string()));
        }
        Ok(Self { http: Client::new(), base, token })
    }

    /// Build an endpoint URL, encoding every segment (calendar ids contain `@` and `#`)
    fn endpoint(&self, segments: &[&str]) -> Result<Url, CalendarError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| CalendarError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, CalendarError> {
        let response = request.bearer_auth(self.token.expose_secret()).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CalendarError::Status { status: status.as_u16(), body })
    }

    async fn decode<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, CalendarError> {
        response.json::<T>().await.map_err(|e| CalendarError::Decode(e.to_string()))
    }
}

#[async_trait]
impl CalendarService for GoogleCalendar {
    async fn list_calendars(&self) -> Result<Vec<CalendarEntry>, CalendarError> {
        let url = self.endpoint(&["users", "me", "calendarList"])?;
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;
        let mut page = 1;

        loop {
            debug!("Retrieving page {} of calendars", page);
            let mut request = self.http.get(url.clone()).query(&[("minAccessRole", "writer")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let listing: CalendarListPage = Self::decode(self.send(request).await?).await?;

            for item in listing.items {
                // The primary calendar is addressed as "primary" rather than by its email id
                let id = if item.primary { "primary".to_string() } else { item.id };
                calendars.push(CalendarEntry { id, summary: item.summary, primary: item.primary });
            }

            match listing.next_page_token {
                Some(token) => {
                    page_token = Some(token);
                    page += 1;
                }
                None => break,
            }
        }
        Ok(calendars)
    }

    async fn list_events(
        &self,
        calendar_id: &str,
        from: DateTime<Utc>,
        max_results: u32,
        ordered_by_start: bool,
    ) -> Result<Vec<RemoteEvent>, CalendarError> {
        debug!("Retrieving events from calendar {}", calendar_id);
        let url = self.endpoint(&["calendars", calendar_id, "events"])?;
        let time_min = from.to_rfc3339_opts(SecondsFormat::Secs, true);
        let max_results = max_results.to_string();
        let mut request = self.http.get(url).query(&[
            ("timeMin", time_min.as_str()),
            ("maxResults", max_results.as_str()),
            ("singleEvents", "true"),
        ]);
        if ordered_by_start {
            request = request.query(&[("orderBy", "startTime")]);
        }
        let page: EventsPage = Self::decode(self.send(request).await?).await?;
        Ok(page.items)
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        body: &EventBody,
    ) -> Result<RemoteEvent, CalendarError> {
        debug!("Creating event {:?} in calendar {}", body.summary, calendar_id);
        let url = self.endpoint(&["calendars", calendar_id, "events"])?;
        let response = self.send(self.http.post(url).json(body)).await?;
        Self::decode(response).await
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarError> {
        debug!("Deleting event {} from calendar {}", event_id, calendar_id);
        let url = self.endpoint(&["calendars", calendar_id, "events", event_id])?;
        match self.send(self.http.delete(url)).await {
            Ok(_) => Ok(()),
            Err(CalendarError::Status { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16() || status == StatusCode::GONE.as_u16() =>
            {
                debug!("Event {} was already gone ({})", event_id, status);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
