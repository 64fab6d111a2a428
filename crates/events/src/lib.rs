//! The lifecycle event bus (spec component C10).
//!
//! Delivery is synchronous and in emission order. A listener that panics is
//! isolated: its panic is caught, logged, and does not prevent later
//! listeners (or later events) from running.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of event kinds emitted by the engine, orchestrator, and
/// contract repository. Not exhaustive of every kind spec §4.7 alludes to
/// ("~40 kinds"), but covers every kind referenced by name elsewhere in the
/// spec plus the lifecycle boundaries a complete implementation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RunStarted,
    RunSummary,
    DeploymentFailed,
    JobStarted,
    JobSkipped,
    JobCompleted,
    JobFailed,
    ActionStarted,
    ActionSkipped,
    ActionCompleted,
    ActionFailed,
    ActionPostCheckWarning,
    TransactionSent,
    TransactionConfirmed,
    ContractCreated,
    VerificationStarted,
    VerificationSkipped,
    VerificationSucceeded,
    VerificationFailed,
    VerificationWarningsReport,
    DuplicateArtifactWarning,
    DependencyFailurePropagated,
    ContextDisposeWarning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(kind: EventKind, level: Level, data: serde_json::Value) -> Self {
        Self { kind, timestamp: Utc::now(), level, data }
    }
}

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// An explicit bus instance, threaded through components rather than used as
/// a process-wide singleton (spec §9 design note).
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    global: Vec<Listener>,
    by_kind: std::collections::HashMap<EventKind, Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener invoked for every emitted event.
    pub fn subscribe_all(&self, listener: impl Fn(&Event) + Send + Sync + 'static) {
        self.inner.lock().unwrap().global.push(Arc::new(listener));
    }

    /// Register a listener invoked only for events of `kind`.
    pub fn subscribe(&self, kind: EventKind, listener: impl Fn(&Event) + Send + Sync + 'static) {
        self.inner.lock().unwrap().by_kind.entry(kind).or_default().push(Arc::new(listener));
    }

    /// Emit an event, delivering it synchronously to every matching
    /// listener in emission order.
    pub fn emit(&self, event: Event) {
        tracing::event!(
            tracing::Level::from(event.level),
            kind = ?event.kind,
            data = %event.data,
            "event"
        );
        let (global, scoped) = {
            let inner = self.inner.lock().unwrap();
            let scoped = inner.by_kind.get(&event.kind).cloned().unwrap_or_default();
            (inner.global.clone(), scoped)
        };
        for listener in global.iter().chain(scoped.iter()) {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                tracing::error!(kind = ?event.kind, %msg, "event listener panicked");
            }
        }
    }
}

impl From<Level> for tracing::Level {
    fn from(level: Level) -> Self {
        match level {
            Level::Debug => tracing::Level::DEBUG,
            Level::Info => tracing::Level::INFO,
            Level::Warn => tracing::Level::WARN,
            Level::Error => tracing::Level::ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn delivers_in_emission_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o = order.clone();
        bus.subscribe_all(move |e| o.lock().unwrap().push(e.kind));

        bus.emit(Event::new(EventKind::JobStarted, Level::Info, serde_json::json!({})));
        bus.emit(Event::new(EventKind::JobCompleted, Level::Info, serde_json::json!({})));

        assert_eq!(*order.lock().unwrap(), vec![EventKind::JobStarted, EventKind::JobCompleted]);
    }

    #[test]
    fn a_panicking_listener_does_not_block_others() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe_all(|_| panic!("boom"));
        let c = count.clone();
        bus.subscribe_all(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(Event::new(EventKind::JobStarted, Level::Info, serde_json::json!({})));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn per_kind_listener_only_sees_matching_events() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        bus.subscribe(EventKind::VerificationFailed, move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(Event::new(EventKind::JobStarted, Level::Info, serde_json::json!({})));
        bus.emit(Event::new(EventKind::VerificationFailed, Level::Error, serde_json::json!({})));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
