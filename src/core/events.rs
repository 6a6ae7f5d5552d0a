//! In-process event bus.
//!
//! Producers (file store, job queue, agents) publish lifecycle events;
//! consumers subscribe with async callbacks. Delivery is synchronous and in
//! subscription order at publish time, and the most recent events are kept
//! in a bounded ring buffer for inspection.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::now_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    FileCreated,
    FileUpdated,
    FileDeleted,
    JobCreated,
    JobStarted,
    JobProgress,
    JobCompleted,
    JobFailed,
    AgentMessage,
    SystemAlert,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::FileCreated => "file_created",
            EventKind::FileUpdated => "file_updated",
            EventKind::FileDeleted => "file_deleted",
            EventKind::JobCreated => "job_created",
            EventKind::JobStarted => "job_started",
            EventKind::JobProgress => "job_progress",
            EventKind::JobCompleted => "job_completed",
            EventKind::JobFailed => "job_failed",
            EventKind::AgentMessage => "agent_message",
            EventKind::SystemAlert => "system_alert",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemEvent {
    pub kind: EventKind,
    pub payload: Value,
    pub timestamp_ms: i64,
    pub source: String,
}

pub type EventFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type EventCallback = Arc<dyn Fn(SystemEvent) -> EventFuture + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`]; pass back to
/// [`EventBus::unsubscribe`] to cancel delivery.
#[derive(Debug)]
pub struct Subscription {
    kind: EventKind,
    id: u64,
}

struct BusState {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<(u64, EventCallback)>>,
    history: VecDeque<SystemEvent>,
}

pub struct EventBus {
    state: Mutex<BusState>,
    history_limit: usize,
}

impl EventBus {
    pub fn new(history_limit: usize) -> Self {
        Self {
            state: Mutex::new(BusState {
                next_id: 0,
                listeners: HashMap::new(),
                history: VecDeque::new(),
            }),
            history_limit,
        }
    }

    pub fn subscribe<F, Fut>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn(SystemEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: EventCallback = Arc::new(move |event| {
            let fut: EventFuture = Box::pin(callback(event));
            fut
        });
        let mut state = self.state.lock().expect("event bus state");
        let id = state.next_id;
        state.next_id += 1;
        state.listeners.entry(kind).or_default().push((id, callback));
        debug!("Subscribed to {}", kind.as_str());
        Subscription { kind, id }
    }

    pub fn unsubscribe(&self, subscription: &Subscription) {
        let mut state = self.state.lock().expect("event bus state");
        if let Some(list) = state.listeners.get_mut(&subscription.kind) {
            list.retain(|(id, _)| *id != subscription.id);
        }
    }

    /// Publish an event: record it in history, then deliver to each
    /// subscriber in subscription order, awaiting one at a time. A listener
    /// that panics is contained and logged; delivery continues.
    pub async fn publish(&self, kind: EventKind, payload: Value, source: &str) {
        let event = SystemEvent {
            kind,
            payload,
            timestamp_ms: now_ms(),
            source: source.to_string(),
        };

        let callbacks: Vec<EventCallback> = {
            let mut state = self.state.lock().expect("event bus state");
            state.history.push_back(event.clone());
            while state.history.len() > self.history_limit {
                state.history.pop_front();
            }
            state
                .listeners
                .get(&kind)
                .map(|list| list.iter().map(|(_, cb)| cb.clone()).collect())
                .unwrap_or_default()
        };

        debug!("{} -> {}", event.source, kind.as_str());

        for callback in callbacks {
            if let Err(e) = tokio::spawn(callback(event.clone())).await {
                warn!("Event listener for {} failed: {e}", kind.as_str());
            }
        }
    }

    /// Most recent events, oldest first, at most `limit`.
    pub fn history(&self, limit: usize) -> Vec<SystemEvent> {
        let state = self.state.lock().expect("event bus state");
        let skip = state.history.len().saturating_sub(limit);
        state.history.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn delivers_in_subscription_order() {
        let bus = EventBus::new(10);
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            bus.subscribe(EventKind::SystemAlert, move |_event| {
                let order = order.clone();
                async move {
                    order.lock().unwrap().push(tag);
                }
            });
        }

        bus.publish(EventKind::SystemAlert, json!({}), "test").await;
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new(10);
        let hits = Arc::new(AtomicUsize::new(0));

        let hits2 = hits.clone();
        let sub = bus.subscribe(EventKind::JobCreated, move |_event| {
            let hits = hits2.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        });

        bus.publish(EventKind::JobCreated, json!({}), "test").await;
        bus.unsubscribe(&sub);
        bus.publish(EventKind::JobCreated, json!({}), "test").await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn history_is_bounded_and_ordered() {
        let bus = EventBus::new(3);
        for i in 0..5 {
            bus.publish(EventKind::AgentMessage, json!({ "n": i }), "test")
                .await;
        }
        let history = bus.history(10);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].payload["n"], 2);
        assert_eq!(history[2].payload["n"], 4);
    }

    #[tokio::test]
    async fn only_matching_kind_is_delivered() {
        let bus = EventBus::new(10);
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        bus.subscribe(EventKind::FileCreated, move |_event| {
            let hits = hits2.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        });
        bus.publish(EventKind::FileDeleted, json!({}), "test").await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panicking_listener_does_not_stop_delivery() {
        let bus = EventBus::new(10);
        let hits = Arc::new(AtomicUsize::new(0));

        bus.subscribe(EventKind::SystemAlert, |_event| async {
            panic!("listener bug");
        });
        let hits2 = hits.clone();
        bus.subscribe(EventKind::SystemAlert, move |_event| {
            let hits = hits2.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        });

        bus.publish(EventKind::SystemAlert, json!({}), "test").await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
