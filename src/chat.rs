//! Conversation handling
//!
//! The store holds what the page shows, the stream processor turns reply
//! fragments into messages and background changes, and the runtime runs
//! whole turns including the weather tool round-trip.

mod display;
mod error;
mod message;
mod runtime;
mod store;
mod stream;
mod weather;

#[cfg(test)]
mod proptests;
#[cfg(test)]
pub(crate) mod testing;

pub use error::SubmitError;
pub use runtime::{ChatRuntime, ProductionRuntime};
pub use store::{ChatEvent, ConversationStore, Snapshot};
pub use stream::TurnLimits;
pub use weather::WeatherTool;
