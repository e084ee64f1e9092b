//! Extension lifecycle listeners.
//!
//! # Invariants
//! - A failing listener is logged and skipped; the rest still run.
//! - Listeners run against a snapshot, so they may (un)register listeners.

use crate::extension::record::Extension;
use log::warn;
use std::error::Error;
use std::rc::Rc;
use uuid::Uuid;

pub type ListenerError = Box<dyn Error>;

/// Callback notified with the affected extension's record.
pub type ExtensionListener = Rc<dyn Fn(&Extension) -> Result<(), ListenerError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Registered,
    WillUnregister,
    Unregistered,
}

impl LifecycleEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::WillUnregister => "will_unregister",
            Self::Unregistered => "unregistered",
        }
    }
}

struct ListenerEntry {
    id: Uuid,
    event: LifecycleEvent,
    listener: ExtensionListener,
}

#[derive(Default)]
pub(crate) struct ListenerSet {
    entries: Vec<ListenerEntry>,
}

impl ListenerSet {
    pub(crate) fn add(&mut self, event: LifecycleEvent, listener: ExtensionListener) -> Uuid {
        let id = Uuid::new_v4();
        self.entries.push(ListenerEntry {
            id,
            event,
            listener,
        });
        id
    }

    pub(crate) fn remove(&mut self, id: Uuid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub(crate) fn snapshot(&self, event: LifecycleEvent) -> Vec<(Uuid, ExtensionListener)> {
        self.entries
            .iter()
            .filter(|entry| entry.event == event)
            .map(|entry| (entry.id, Rc::clone(&entry.listener)))
            .collect()
    }
}

/// Calls each listener in registration order. Returns how many failed.
pub(crate) fn notify_all(
    listeners: Vec<(Uuid, ExtensionListener)>,
    event: LifecycleEvent,
    extension: &Extension,
) -> usize {
    let mut failures = 0;
    for (id, listener) in listeners {
        if let Err(err) = listener(extension) {
            failures += 1;
            warn!(
                "event=listener_failed module=host status=error lifecycle={} listener_id={} extension_id={} error={}",
                event.as_str(),
                id,
                extension.id,
                err
            );
        }
    }
    failures
}
