use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::notify::{Alert, Notifier, NotifyError};

pub struct GoogleChatNotifier {
    client: Client,
    webhook_url: String,
}

impl GoogleChatNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
        }
    }
}

#[async_trait]
impl Notifier for GoogleChatNotifier {
    fn name(&self) -> &'static str {
        "googlechat"
    }

    async fn deliver(&self, alert: &Alert) -> Result<(), NotifyError> {
        let text = format!("🚨 *{}*\n{}\n{}", alert.title, alert.body, alert.details);

        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&json!({ "text": text }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(NotifyError::Rejected {
                provider: "googlechat",
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}
