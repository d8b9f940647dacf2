//! Flattening of inbound payloads into individual events.
//!
//! The venue pushes either a single event object or an array of them.
//! [`EventNormalizer`] hides the difference so the filter chain only ever
//! looks at one event at a time.

use serde_json::Value;

use crate::error::Result;

const UPDATE: &str = "listing-update";
const DELETE: &str = "listing-delete";

/// Expands decoded payloads into [`Batch`]es.
#[derive(Clone, Copy, Debug, Default)]
pub struct EventNormalizer;

impl EventNormalizer {
    /// Decodes a raw socket message.
    ///
    /// A payload that is not valid JSON is an upstream defect and is
    /// returned as [`crate::error::Error::MalformedPayload`].
    pub fn decode(text: &str) -> Result<Batch> {
        Ok(Self::expand(serde_json::from_str(text)?))
    }

    /// Splits a decoded payload into its events.
    pub fn expand(payload: Value) -> Batch {
        match payload {
            Value::Array(events) => Batch::new(events, true),
            single => Batch::new(vec![single], false),
        }
    }
}

/// Events of a single inbound payload, yielded once each, in order.
///
/// Update and delete counts cover every event of the payload and are
/// meant for logging.
#[derive(Debug)]
pub struct Batch {
    events: std::vec::IntoIter<Value>,
    updates: usize,
    deletes: usize,
    is_array: bool,
}

impl Batch {
    fn new(events: Vec<Value>, is_array: bool) -> Self {
        let (updates, deletes) =
            events
                .iter()
                .fold((0, 0), |(u, d), ev| match ev.get("event").and_then(Value::as_str) {
                    Some(UPDATE) => (u + 1, d),
                    Some(DELETE) => (u, d + 1),
                    _ => (u, d),
                });
        Self {
            events: events.into_iter(),
            updates,
            deletes,
            is_array,
        }
    }

    /// Number of `listing-update` events in the payload.
    pub fn updates(&self) -> usize {
        self.updates
    }

    /// Number of `listing-delete` events in the payload.
    pub fn deletes(&self) -> usize {
        self.deletes
    }

    /// Whether the payload was an array, even of one element.
    pub fn is_array(&self) -> bool {
        self.is_array
    }
}

impl Iterator for Batch {
    type Item = Value;

    fn next(&mut self) -> Option<Self::Item> {
        self.events.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.events.size_hint()
    }
}

impl ExactSizeIterator for Batch {}
