//! Chat command and button dispatch module.
//!
//! Defines the button actions, the transport-neutral keyboard model,
//! the narrow [`Conversation`] seam and the [`Router`] that wires chat
//! input to the store and session state.

mod handler;
mod types;

pub use handler::Router;
pub use types::{Button, CallbackAction, Conversation, Keyboard};
