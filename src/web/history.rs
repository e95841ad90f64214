use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::worker::{CheckOutcome, CheckReport};

/// Most recent completed checks plus a count of retries, newest last.
pub struct CheckHistory {
    reports: VecDeque<CheckReport>,
    retries: u64,
    capacity: usize,
}

impl CheckHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            reports: VecDeque::with_capacity(capacity),
            retries: 0,
            capacity,
        }
    }

    pub fn record(&mut self, outcome: CheckOutcome) {
        match outcome {
            CheckOutcome::Completed(report) => {
                if self.reports.len() >= self.capacity {
                    self.reports.pop_front();
                }
                self.reports.push_back(report);
            }
            CheckOutcome::Retry => self.retries += 1,
        }
    }

    pub fn reports(&self) -> Vec<CheckReport> {
        self.reports.iter().cloned().collect()
    }

    pub fn retries(&self) -> u64 {
        self.retries
    }
}

pub type SharedHistory = Arc<Mutex<CheckHistory>>;

/// Drain scheduler outcomes into the shared history until the channel closes.
pub fn spawn_recorder(history: SharedHistory, mut rx: mpsc::Receiver<CheckOutcome>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(outcome) = rx.recv().await {
            if let Ok(mut h) = history.lock() {
                h.record(outcome);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn report(alerted: Option<&str>) -> CheckReport {
        CheckReport {
            run_id: Uuid::new_v4(),
            checked_at: Utc::now(),
            skipped: false,
            observer: None,
            fetched: 2,
            relevant: 1,
            feed_error: None,
            alerted: alerted.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = CheckHistory::new(2);
        history.record(CheckOutcome::Completed(report(Some("A"))));
        history.record(CheckOutcome::Completed(report(Some("B"))));
        history.record(CheckOutcome::Completed(report(Some("C"))));
        let alerted: Vec<Option<String>> = history.reports().into_iter().map(|r| r.alerted).collect();
        assert_eq!(alerted, vec![Some("B".to_string()), Some("C".to_string())]);
    }

    #[test]
    fn test_history_counts_retries() {
        let mut history = CheckHistory::new(2);
        history.record(CheckOutcome::Retry);
        history.record(CheckOutcome::Retry);
        assert_eq!(history.retries(), 2);
        assert!(history.reports().is_empty());
    }
}
