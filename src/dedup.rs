use crate::model::EarthquakeReport;

/// Remembers the last earthquake an alert went out for.
///
/// Two states: no prior alert, or last-alerted(id). Lives as long as the
/// worker that owns it unless seeded from durable storage with [`AlertDedupState::restore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertDedupState {
    last_alerted: Option<String>,
}

impl AlertDedupState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restore(last_alerted: Option<String>) -> Self {
        Self { last_alerted }
    }

    /// Returns `true` if no alert was sent yet or `id` differs from the last one.
    pub fn should_alert(&self, id: &str) -> bool {
        self.last_alerted.as_deref() != Some(id)
    }

    /// Overwrites the tracked id unconditionally.
    pub fn mark_alerted(&mut self, id: &str) {
        self.last_alerted = Some(id.to_string());
    }

    pub fn last_alerted(&self) -> Option<&str> {
        self.last_alerted.as_deref()
    }

    /// First report, in feed order, whose id differs from the tracked one.
    pub fn select<'a>(&self, relevant: &'a [EarthquakeReport]) -> Option<&'a EarthquakeReport> {
        relevant.iter().find(|r| self.should_alert(&r.id))
    }
}
