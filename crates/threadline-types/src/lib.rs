//! Wire types shared by the Threadline store and HTTP layer.

pub mod actions;
pub mod api;

pub use actions::{ActionError, ActionKind, LogPayload};
