//! Wire protocol for LanChat client-server communication.
//!
//! Every frame on the WebSocket is a JSON [`envelope::Event`]: a named event
//! type plus a deferred JSON payload. Payload shapes live in [`messages`],
//! the chat message model in [`types`], and the text-safe binary codec used
//! by file transfers in [`codec`].

pub mod codec;
pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

pub use constants::EventType;
pub use envelope::Event;
