//! Notification hooks for machine and channel activity.
//!
//! Observers are plain trait objects with no-op defaults, so an observer
//! only implements the hooks it cares about. [`EventLog`] records
//! everything it sees and is what most tests and demos attach.

use crate::channel::{ByteChannel, ChannelEvent, ListenerId};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// Receives machine and channel notifications.
pub trait Observer {
    /// A state was entered. Called once per state, outermost first.
    fn on_state_changed(&self, _state: &str) {}

    fn on_running_changed(&self, _running: bool) {}

    /// Bytes written by the observed endpoint.
    fn on_outgoing(&self, _data: &[u8]) {}

    /// Bytes delivered to the observed endpoint.
    fn on_incoming(&self, _data: &[u8]) {}
}

/// Forward the traffic of `channel` to `observer`.
pub fn observe_channel(channel: &ByteChannel, observer: Rc<dyn Observer>) -> ListenerId {
    channel.subscribe(move |_, event| match event {
        ChannelEvent::Outgoing(data) => observer.on_outgoing(data),
        ChannelEvent::Incoming(data) => observer.on_incoming(data),
        ChannelEvent::DataArrived => {}
    })
}

/// One recorded notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ObservedEvent {
    StateChanged { state: String },
    RunningChanged { running: bool },
    Outgoing { data: String },
    Incoming { data: String },
}

/// Observer that records every notification in arrival order.
///
/// # Example
///
/// ```rust
/// use scriptstate::channel::ByteChannel;
/// use scriptstate::observer::{observe_channel, EventLog, ObservedEvent};
/// use std::rc::Rc;
///
/// let (tx, rx) = ByteChannel::pair();
/// let log = Rc::new(EventLog::new());
/// observe_channel(&rx, log.clone());
///
/// tx.write(b"boot successful\n").unwrap();
///
/// assert_eq!(
///     log.events(),
///     vec![ObservedEvent::Incoming {
///         data: "boot successful\n".to_string()
///     }]
/// );
/// ```
#[derive(Debug, Default)]
pub struct EventLog {
    events: RefCell<Vec<ObservedEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.borrow().clone()
    }

    /// Names of entered states, in order.
    pub fn states(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                ObservedEvent::StateChanged { state } => Some(state.clone()),
                _ => None,
            })
            .collect()
    }

    /// Concatenated incoming traffic.
    pub fn incoming(&self) -> String {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                ObservedEvent::Incoming { data } => Some(data.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Concatenated outgoing traffic.
    pub fn outgoing(&self) -> String {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                ObservedEvent::Outgoing { data } => Some(data.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// One JSON object per line.
    pub fn to_json_lines(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for event in self.events.borrow().iter() {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        Ok(out)
    }

    fn push(&self, event: ObservedEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl Observer for EventLog {
    fn on_state_changed(&self, state: &str) {
        self.push(ObservedEvent::StateChanged {
            state: state.to_string(),
        });
    }

    fn on_running_changed(&self, running: bool) {
        self.push(ObservedEvent::RunningChanged { running });
    }

    fn on_outgoing(&self, data: &[u8]) {
        self.push(ObservedEvent::Outgoing {
            data: String::from_utf8_lossy(data).into_owned(),
        });
    }

    fn on_incoming(&self, data: &[u8]) {
        self.push(ObservedEvent::Incoming {
            data: String::from_utf8_lossy(data).into_owned(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_records_both_directions() {
        let (a, b) = ByteChannel::pair();
        let log = Rc::new(EventLog::new());
        observe_channel(&a, log.clone());

        a.write(b"boot\n").unwrap();
        b.write(b"boot successful\n").unwrap();

        assert_eq!(log.outgoing(), "boot\n");
        assert_eq!(log.incoming(), "boot successful\n");
    }

    #[test]
    fn unsubscribed_observer_sees_nothing() {
        let (a, b) = ByteChannel::pair();
        let log = Rc::new(EventLog::new());
        let id = observe_channel(&a, log.clone());

        assert!(a.unsubscribe(id));
        b.write(b"x\n").unwrap();

        assert!(log.events().is_empty());
    }

    #[test]
    fn events_serialize_as_tagged_json() {
        let log = EventLog::new();
        log.on_state_changed("s_boot");
        log.on_running_changed(false);

        let json = log.to_json_lines().unwrap();

        assert_eq!(
            json,
            "{\"event\":\"state_changed\",\"state\":\"s_boot\"}\n\
             {\"event\":\"running_changed\",\"running\":false}\n"
        );
    }
}
