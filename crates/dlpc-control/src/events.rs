//! Register access events.
//!
//! Every register access produces a [`RegisterEvent`]. Events go to a
//! [`RegisterObserver`]; the default observer forwards them to `tracing`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info, warn};

/// What kind of access produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Read,
    Write,
    ReadModifyWrite,
    /// A write that starts an exposure and cannot be undone.
    Irreversible,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::ReadModifyWrite => "read_modify_write",
            Self::Irreversible => "irreversible",
        };
        f.write_str(s)
    }
}

/// A single register access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterEvent {
    pub register: &'static str,
    /// Bus address actually touched (the write address for writes).
    pub address: u8,
    pub kind: AccessKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<Vec<u8>>,
}

/// Receives register events.
pub trait RegisterObserver {
    fn on_event(&mut self, event: &RegisterEvent);
}

impl<F> RegisterObserver for F
where
    F: FnMut(&RegisterEvent),
{
    fn on_event(&mut self, event: &RegisterEvent) {
        self(event)
    }
}

/// Routes events to `tracing`: reads at debug, writes at info, the
/// exposure trigger at warn.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RegisterObserver for TracingObserver {
    fn on_event(&mut self, event: &RegisterEvent) {
        let address = event.address;
        match event.kind {
            AccessKind::Read => debug!(
                register = event.register,
                address,
                value = ?event.new,
                "register read"
            ),
            AccessKind::Write | AccessKind::ReadModifyWrite => info!(
                register = event.register,
                address,
                kind = %event.kind,
                old = ?event.old,
                new = ?event.new,
                "register write"
            ),
            AccessKind::Irreversible => warn!(
                register = event.register,
                address,
                old = ?event.old,
                new = ?event.new,
                "irreversible write: starting exposure"
            ),
        }
    }
}

/// Shared in-memory event recorder. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<RegisterEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RegisterEvent> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Number of writes (of any kind) issued to `address`.
    pub fn writes_to(&self, address: u8) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.address == address && e.kind != AccessKind::Read)
            .count()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl RegisterObserver for EventLog {
    fn on_event(&mut self, event: &RegisterEvent) {
        TracingObserver.on_event(event);
        self.events.borrow_mut().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(address: u8, kind: AccessKind) -> RegisterEvent {
        RegisterEvent {
            register: "test",
            address,
            kind,
            old: None,
            new: Some(vec![1]),
        }
    }

    #[test]
    fn event_log_clones_share_storage() {
        let log = EventLog::new();
        let mut sink = log.clone();
        sink.on_event(&event(0x05, AccessKind::Write));
        sink.on_event(&event(0x06, AccessKind::Read));
        assert_eq!(log.len(), 2);
        assert_eq!(log.writes_to(0x05), 1);
        assert_eq!(log.writes_to(0x06), 0);
        log.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn closures_are_observers() {
        let mut seen = Vec::new();
        {
            let mut observer = |e: &RegisterEvent| seen.push(e.kind);
            observer.on_event(&event(0xC1, AccessKind::Irreversible));
        }
        assert_eq!(seen, vec![AccessKind::Irreversible]);
    }

    #[test]
    fn event_serializes_without_empty_fields() {
        let json = serde_json::to_value(event(0xCA, AccessKind::ReadModifyWrite)).unwrap();
        assert_eq!(json["kind"], "read_modify_write");
        assert_eq!(json["address"], 0xCA);
        assert!(json.get("old").is_none());
    }
}
