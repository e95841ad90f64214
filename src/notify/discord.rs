use async_trait::async_trait;
use reqwest::Client;

use crate::notify::{Alert, Notifier, NotifyError};

pub struct DiscordNotifier {
    client: Client,
    webhook_url: String,
    use_embed: bool,
}

impl DiscordNotifier {
    pub fn new(webhook_url: String, use_embed: bool) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
            use_embed,
        }
    }

    pub(crate) fn payload(&self, alert: &Alert) -> serde_json::Value {
        if self.use_embed {
            serde_json::json!({
                "embeds": [{
                    "title": alert.title,
                    "description": format!("{}\n\n{}", alert.body, alert.details),
                    "color": 0xFF0000,
                    "footer": { "text": alert.earthquake_id }
                }]
            })
        } else {
            serde_json::json!({ "content": format!("🚨 **{}** {}", alert.title, alert.body) })
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn deliver(&self, alert: &Alert) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&self.payload(alert))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(NotifyError::Rejected {
                provider: "discord",
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert() -> Alert {
        Alert {
            title: "¡Sismo Significativo Detectado!".to_string(),
            body: "Magnitud 6.5 en Valparaíso".to_string(),
            details: "Magnitud: 6.5".to_string(),
            earthquake_id: "id-1".to_string(),
        }
    }

    #[test]
    fn test_embed_payload() {
        let n = DiscordNotifier::new("http://localhost".to_string(), true);
        let p = n.payload(&alert());
        assert_eq!(p["embeds"][0]["title"], "¡Sismo Significativo Detectado!");
        assert_eq!(p["embeds"][0]["footer"]["text"], "id-1");
    }

    #[test]
    fn test_plain_payload() {
        let n = DiscordNotifier::new("http://localhost".to_string(), false);
        let p = n.payload(&alert());
        assert!(p["content"].as_str().unwrap().contains("Magnitud 6.5 en Valparaíso"));
    }
}
