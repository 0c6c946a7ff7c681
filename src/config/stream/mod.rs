mod event;
mod line;

pub use event::{EventPayload, InstanceEvent};
pub use line::{StreamLine, StreamSource};
