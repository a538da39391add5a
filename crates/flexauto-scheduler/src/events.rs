//! Execution notifications. Broadcast plus a bounded in-memory history.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::broadcast;

use flexauto_core::types::ScenarioExecuted;

/// History entries kept in memory (ring buffer).
pub const HISTORY_LIMIT: usize = 100;

/// Publishes `ScenarioExecuted` to every subscriber and keeps the latest
/// entries for late observers.
pub struct ExecutionNotifier {
    tx: broadcast::Sender<ScenarioExecuted>,
    history: Mutex<VecDeque<ScenarioExecuted>>,
}

impl Default for ExecutionNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(HISTORY_LIMIT)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScenarioExecuted> {
        self.tx.subscribe()
    }

    /// Record and broadcast. Having no subscribers is fine.
    pub fn publish(&self, event: ScenarioExecuted) {
        if let Ok(mut history) = self.history.lock() {
            if history.len() == HISTORY_LIMIT {
                history.pop_front();
            }
            history.push_back(event.clone());
        }
        let _ = self.tx.send(event);
    }

    /// Most recent events, oldest first.
    pub fn history(&self) -> Vec<ScenarioExecuted> {
        self.history
            .lock()
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn event() -> ScenarioExecuted {
        ScenarioExecuted {
            scenario_id: Uuid::new_v4(),
            executed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let notifier = ExecutionNotifier::new();
        let mut rx = notifier.subscribe();
        let e = event();
        notifier.publish(e.clone());
        assert_eq!(rx.recv().await.unwrap(), e);
    }

    #[test]
    fn test_history_is_bounded() {
        let notifier = ExecutionNotifier::new();
        let first = event();
        notifier.publish(first.clone());
        for _ in 0..HISTORY_LIMIT {
            notifier.publish(event());
        }
        let history = notifier.history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert!(!history.contains(&first));
    }
}
