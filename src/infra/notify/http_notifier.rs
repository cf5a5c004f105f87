use crate::domain::ports::NotifierPort;
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::error;

/// REST adapter for the outbound messaging channel.
pub struct HttpNotifier {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpNotifier {
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
}

#[derive(Serialize)]
struct MessagePayload {
    recipient: String,
    text: String,
}

#[async_trait]
impl NotifierPort for HttpNotifier {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), AppError> {
        let payload = MessagePayload {
            recipient: recipient.to_string(),
            text: text.to_string(),
        };

        let res = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                let msg = format!("Notifier connection error: {}", e);
                error!("{}", msg);
                AppError::Notifier(msg)
            })?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            let msg = format!("Notifier failed. Status: {}, Body: {}", status, text);
            error!("{}", msg);
            return Err(AppError::Notifier(msg));
        }

        Ok(())
    }
}
