use async_trait::async_trait;
use tracing::warn;

use crate::notify::{Alert, Notifier, NotifyError};

/// Writes alerts to the log. Always available, so a headless install still sees them.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, alert: &Alert) -> Result<(), NotifyError> {
        warn!(
            earthquake_id = %alert.earthquake_id,
            "{}: {}",
            alert.title,
            alert.body
        );
        Ok(())
    }
}
