use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

use sunwell_observability::EventBus;
use sunwell_types::{Escalation, EscalationOption, Event, EventType};

/// Hands an `Escalation` to whatever surface is watching the event bus
/// (a CLI prompt, a TUI, a remote approver) and blocks the caller until a
/// reply arrives or the run is cancelled. One instance per run.
#[derive(Clone)]
pub struct EscalationManager {
    waiters: Arc<RwLock<HashMap<String, watch::Sender<Option<EscalationOption>>>>>,
    event_bus: EventBus,
}

impl EscalationManager {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            waiters: Arc::new(RwLock::new(HashMap::new())),
            event_bus,
        }
    }

    /// Publishes the escalation as an `Event::Escalate` and registers a
    /// waiter for the reply. Returns the escalation's id, which the
    /// caller passes to `wait_for_reply`.
    pub async fn raise(&self, escalation: Escalation) -> String {
        let id = escalation.id.clone();
        let (tx, _rx) = watch::channel(None);
        self.waiters.write().await.insert(id.clone(), tx);

        self.event_bus.publish(
            Event::new(EventType::Escalate, serde_json::to_value(&escalation).unwrap_or_default())
                .with_severity(sunwell_types::EventSeverity::from(escalation.severity)),
        );

        id
    }

    pub async fn reply(&self, id: &str, option: EscalationOption) -> bool {
        let waiter = self.waiters.read().await.get(id).cloned();
        let Some(waiter) = waiter else {
            return false;
        };
        let _ = waiter.send(Some(option));
        true
    }

    pub async fn wait_for_reply(
        &self,
        id: &str,
        cancel: CancellationToken,
    ) -> Option<EscalationOption> {
        let mut rx = {
            let waiters = self.waiters.read().await;
            waiters.get(id).map(|tx| tx.subscribe())?
        };
        let immediate = *rx.borrow();
        if let Some(option) = immediate {
            self.waiters.write().await.remove(id);
            return Some(option);
        }
        let reply = tokio::select! {
            _ = cancel.cancelled() => None,
            changed = rx.changed() => {
                if changed.is_ok() {
                    *rx.borrow()
                } else {
                    None
                }
            }
        };
        self.waiters.write().await.remove(id);
        reply
    }
}

impl From<sunwell_types::EscalationSeverity> for sunwell_types::EventSeverity {
    fn from(severity: sunwell_types::EscalationSeverity) -> Self {
        match severity {
            sunwell_types::EscalationSeverity::Info => sunwell_types::EventSeverity::Info,
            sunwell_types::EscalationSeverity::Warning => sunwell_types::EventSeverity::Warning,
            sunwell_types::EscalationSeverity::Critical => sunwell_types::EventSeverity::Critical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sunwell_types::EscalationReason;

    fn sample_escalation() -> Escalation {
        Escalation::new(
            "goal_1",
            EscalationReason::ScopeExceeded,
            "touched 12 files, planned for 3",
            vec![EscalationOption::Approve, EscalationOption::Abort],
            EscalationOption::Approve,
        )
    }

    #[tokio::test]
    async fn wait_for_reply_returns_the_chosen_option() {
        let manager = EscalationManager::new(EventBus::new());
        let escalation = sample_escalation();
        let id = manager.raise(escalation).await;

        let manager_clone = manager.clone();
        let id_clone = id.clone();
        tokio::spawn(async move {
            let _ = manager_clone.reply(&id_clone, EscalationOption::Abort).await;
        });

        let cancel = CancellationToken::new();
        let reply = manager.wait_for_reply(&id, cancel).await;
        assert_eq!(reply, Some(EscalationOption::Abort));
    }

    #[tokio::test]
    async fn cancellation_unblocks_wait_with_none() {
        let manager = EscalationManager::new(EventBus::new());
        let escalation = sample_escalation();
        let id = manager.raise(escalation).await;

        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            cancel_clone.cancel();
        });

        let reply = manager.wait_for_reply(&id, cancel).await;
        assert_eq!(reply, None);
    }
}
