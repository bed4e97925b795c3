use tokio::sync::broadcast;

use sunwell_types::Event;

/// Broadcast channel carrying every `Event` an engine emits. One bus per
/// run; every subsystem publishes onto it, the CLI and the JSONL event
/// log both subscribe. A lagging subscriber drops old events rather than
/// blocking publishers — the event log itself is the durable record.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(2048);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sunwell_types::EventType;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventType::PlanComplete, serde_json::json!({})));
        let event = rx.recv().await.unwrap();
        assert!(matches!(event.event_type, EventType::PlanComplete));
    }
}
