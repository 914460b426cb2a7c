//! Progress and audit events emitted during a re-key run.
//!
//! Sinks are fire-and-forget: `notify` has no return value and an
//! implementation must swallow its own failures.

use std::fmt;
use std::sync::Mutex;

use tracing::{debug, error, info, warn};

/// Every event the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventName {
    Start,
    End,
    Aborted,
    Cancelled,
    KindStart,
    KindEmpty,
    KindEnd,
    RecordUpdated,
    RecordFailed,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "rekey.start",
            Self::End => "rekey.end",
            Self::Aborted => "rekey.aborted",
            Self::Cancelled => "rekey.cancelled",
            Self::KindStart => "rekey.kind.start",
            Self::KindEmpty => "rekey.kind.empty",
            Self::KindEnd => "rekey.kind.end",
            Self::RecordUpdated => "rekey.record.updated",
            Self::RecordFailed => "rekey.record.failed",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable description plus ordered key/value details.
///
/// Never carries plaintext or key material.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventMessage {
    pub description: String,
    pub details: Vec<(String, String)>,
}

impl EventMessage {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            details: Vec::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.details.push((key.to_string(), value.to_string()));
        self
    }

    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `key=value` pairs separated by spaces.
    pub fn details_line(&self) -> String {
        self.details
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Receiver of engine events.
pub trait EventSink {
    fn notify(&self, name: EventName, message: &EventMessage);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn notify(&self, name: EventName, message: &EventMessage) {
        let details = message.details_line();
        match name {
            EventName::RecordFailed | EventName::Cancelled => {
                warn!(event = %name, %details, "{}", message.description)
            }
            EventName::Aborted => error!(event = %name, %details, "{}", message.description),
            EventName::RecordUpdated => debug!(event = %name, %details, "{}", message.description),
            _ => info!(event = %name, %details, "{}", message.description),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<(EventName, EventMessage)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(EventName, EventMessage)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<EventName> {
        self.events().into_iter().map(|(name, _)| name).collect()
    }

    /// The first event called `name`, if any.
    pub fn find(&self, name: EventName) -> Option<EventMessage> {
        self.events()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, message)| message)
    }
}

impl EventSink for MemorySink {
    fn notify(&self, name: EventName, message: &EventMessage) {
        if let Ok(mut events) = self.events.lock() {
            events.push((name, message.clone()));
        }
    }
}

/// Broadcasts to several sinks, in order.
#[derive(Default)]
pub struct Fanout<'a> {
    sinks: Vec<&'a dyn EventSink>,
}

impl<'a> Fanout<'a> {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with(mut self, sink: &'a dyn EventSink) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for Fanout<'_> {
    fn notify(&self, name: EventName, message: &EventMessage) {
        for sink in &self.sinks {
            sink.notify(name, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_details_keep_order() {
        let msg = EventMessage::new("done")
            .with("kind", "account")
            .with("updated", 2);
        assert_eq!(msg.detail("updated"), Some("2"));
        assert_eq!(msg.detail("missing"), None);
        assert_eq!(msg.details_line(), "kind=account updated=2");
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let a = MemorySink::new();
        let b = MemorySink::new();
        let fanout = Fanout::new().with(&a).with(&b).with(&TracingSink);

        fanout.notify(EventName::KindEmpty, &EventMessage::new("no data"));

        assert_eq!(a.names(), vec![EventName::KindEmpty]);
        assert_eq!(b.names(), vec![EventName::KindEmpty]);
    }

    #[test]
    fn event_names_are_dotted() {
        assert_eq!(EventName::KindEnd.to_string(), "rekey.kind.end");
        assert_eq!(EventName::RecordFailed.as_str(), "rekey.record.failed");
    }
}
