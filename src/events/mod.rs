//! Event record streams.
//!
//! Event data is parsed once into a shared record array. Readers follow a
//! single-consumer protocol: the first `open` gets the live cursor, every
//! later `open` gets an independent cursor rewound to the origin.

use serde::Serialize;
use std::sync::{Arc, Mutex};

/// One parsed trace event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub event_name: String,
    pub time_relative_msec: f64,
    pub process_id: Option<u32>,
    pub fields: Vec<(String, String)>,
}

impl EventRecord {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Reader state of an event source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Nobody has opened the source yet
    Unopened,
    /// The live cursor has been handed out
    Live,
    /// At least one clone has been handed out after the live cursor
    Cloned,
}

/// Shared event records plus the reader state
#[derive(Debug, Clone)]
pub struct EventSource {
    records: Arc<[EventRecord]>,
    state: Arc<Mutex<HandleState>>,
}

impl EventSource {
    pub fn new(records: Vec<EventRecord>) -> Self {
        Self {
            records: records.into(),
            state: Arc::new(Mutex::new(HandleState::Unopened)),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn state(&self) -> HandleState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Hand out a cursor; only the first caller gets the live one
    pub fn open(&self) -> EventCursor {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        *state = match *state {
            HandleState::Unopened => HandleState::Live,
            HandleState::Live | HandleState::Cloned => HandleState::Cloned,
        };
        EventCursor {
            records: Arc::clone(&self.records),
            position: 0,
        }
    }

    /// Distinct event names in first-seen order
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for record in self.records.iter() {
            if !names.iter().any(|name| *name == record.event_name) {
                names.push(record.event_name.clone());
            }
        }
        names
    }
}

/// Forward-only reader over event records
#[derive(Debug)]
pub struct EventCursor {
    records: Arc<[EventRecord]>,
    position: usize,
}

impl EventCursor {
    pub fn next_record(&mut self) -> Option<&EventRecord> {
        let record = self.records.get(self.position)?;
        self.position += 1;
        Some(record)
    }

    /// Number of records already consumed
    pub fn position(&self) -> usize {
        self.position
    }

    /// An independent cursor over the same records, at the origin
    pub fn clone_from_origin(&self) -> EventCursor {
        EventCursor {
            records: Arc::clone(&self.records),
            position: 0,
        }
    }
}

impl Iterator for EventCursor {
    type Item = EventRecord;

    fn next(&mut self) -> Option<EventRecord> {
        self.next_record().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, time: f64) -> EventRecord {
        EventRecord {
            event_name: name.to_string(),
            time_relative_msec: time,
            process_id: None,
            fields: vec![("Size".to_string(), "8".to_string())],
        }
    }

    #[test]
    fn test_handle_states() {
        let source = EventSource::new(vec![record("A", 0.0)]);
        assert_eq!(source.state(), HandleState::Unopened);
        let _live = source.open();
        assert_eq!(source.state(), HandleState::Live);
        let _clone = source.open();
        assert_eq!(source.state(), HandleState::Cloned);
    }

    #[test]
    fn test_clone_starts_at_origin() {
        let source = EventSource::new(vec![record("A", 0.0), record("B", 1.0)]);
        let mut live = source.open();
        live.next_record();
        assert_eq!(live.position(), 1);

        let mut clone = live.clone_from_origin();
        assert_eq!(clone.next_record().unwrap().event_name, "A");
        assert_eq!(live.next_record().unwrap().event_name, "B");
    }

    #[test]
    fn test_field_lookup_and_names() {
        let source = EventSource::new(vec![record("A", 0.0), record("B", 1.0), record("A", 2.0)]);
        assert_eq!(source.event_names(), vec!["A", "B"]);
        let first = source.open().next().unwrap();
        assert_eq!(first.field("Size"), Some("8"));
        assert_eq!(first.field("Missing"), None);
    }
}
