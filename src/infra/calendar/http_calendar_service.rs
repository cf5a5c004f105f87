use crate::domain::ports::{CalendarEvent, CalendarEventDetails, CalendarPort};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::error;

/// REST adapter for the calendar of record. The vendor-specific wire
/// format lives entirely in this file.
pub struct HttpCalendarService {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpCalendarService {
    pub fn new(api_url: String, api_key: String, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url,
            api_key,
        }
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("Bearer {}", self.api_key))
    }
}

#[derive(Serialize)]
struct EventPayload {
    summary: String,
    description: Option<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    booking_ref: String,
}

#[derive(Deserialize)]
struct EventResponse {
    id: String,
    summary: Option<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    booking_ref: Option<String>,
    status: Option<String>,
}

fn payload_for(details: &CalendarEventDetails) -> EventPayload {
    EventPayload {
        summary: details.summary.clone(),
        description: details.description.clone(),
        start: details.start_time,
        end: details.end_time,
        booking_ref: details.booking_id.clone(),
    }
}

#[async_trait]
impl CalendarPort for HttpCalendarService {
    async fn create_event(&self, details: &CalendarEventDetails) -> Result<String, AppError> {
        let res = self
            .auth(self.client.post(format!("{}/events", self.api_url)))
            .json(&payload_for(details))
            .send()
            .await
            .map_err(|e| {
                let msg = format!("Calendar connection error: {}", e);
                error!("{}", msg);
                AppError::Calendar(msg)
            })?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(AppError::Calendar(format!(
                "Calendar create failed. Status: {}, Body: {}",
                status, text
            )));
        }

        let created: EventResponse = res
            .json()
            .await
            .map_err(|e| AppError::Calendar(format!("Calendar response decode error: {}", e)))?;
        Ok(created.id)
    }

    async fn update_event(&self, event_id: &str, details: &CalendarEventDetails) -> Result<(), AppError> {
        let res = self
            .auth(self.client.put(format!("{}/events/{}", self.api_url, event_id)))
            .json(&payload_for(details))
            .send()
            .await
            .map_err(|e| AppError::Calendar(format!("Calendar connection error: {}", e)))?;

        if !res.status().is_success() {
            return Err(AppError::Calendar(format!(
                "Calendar update failed. Status: {}",
                res.status()
            )));
        }
        Ok(())
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), AppError> {
        let res = self
            .auth(self.client.delete(format!("{}/events/{}", self.api_url, event_id)))
            .send()
            .await
            .map_err(|e| AppError::Calendar(format!("Calendar connection error: {}", e)))?;

        // A 404 is fine; the event is already gone.
        if !res.status().is_success() && res.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::Calendar(format!(
                "Calendar delete failed. Status: {}",
                res.status()
            )));
        }
        Ok(())
    }

    async fn list_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        include_cancelled: bool,
    ) -> Result<Vec<CalendarEvent>, AppError> {
        let res = self
            .auth(self.client.get(format!("{}/events", self.api_url)))
            .query(&[
                ("from", from.to_rfc3339()),
                ("to", to.to_rfc3339()),
                ("include_cancelled", include_cancelled.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Calendar(format!("Calendar connection error: {}", e)))?;

        if !res.status().is_success() {
            return Err(AppError::Calendar(format!(
                "Calendar listing failed. Status: {}",
                res.status()
            )));
        }

        let events: Vec<EventResponse> = res
            .json()
            .await
            .map_err(|e| AppError::Calendar(format!("Calendar response decode error: {}", e)))?;

        Ok(events
            .into_iter()
            .map(|e| CalendarEvent {
                id: e.id,
                booking_id: e.booking_ref,
                start_time: e.start,
                end_time: e.end,
                summary: e.summary.unwrap_or_default(),
                cancelled: e.status.as_deref() == Some("cancelled"),
            })
            .collect())
    }
}
