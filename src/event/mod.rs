//! Recorded Events
//!
//! The data consumed by the query engine:
//!
//! - **Types**: event schemas and field descriptors with annotations
//! - **Values**: typed field values, structured objects and events
//! - **Recording**: a JSON-backed source of schemas and events
//!
//! Any producer of events can feed the engine by implementing [`EventSource`].

mod error;
mod recording;
mod types;
mod value;

pub use error::{RecordingError, RecordingResult};
pub use recording::Recording;
pub use types::{
    label_from_name, AmountUnit, Annotations, EventType, ValueDescriptor, LEAF_TYPES, TYPE_CLASS,
    TYPE_CLASS_LOADER, TYPE_METHOD, TYPE_STACK_FRAME, TYPE_STACK_TRACE, TYPE_STRING, TYPE_THREAD,
    TYPE_THREAD_GROUP,
};
pub use value::{EventBuilder, RecordedEvent, RecordedObject, Value};

use std::sync::Arc;

/// A source of event schemas and events
pub trait EventSource {
    /// Snapshot of the available event types
    fn event_types(&self) -> Vec<Arc<EventType>>;

    /// Deliver every event, in encounter order, to `sink`
    fn replay(&mut self, sink: &mut dyn FnMut(&RecordedEvent)) -> RecordingResult<()>;
}
