//! Wire types exchanged between codegate and its chat transport.
//!
//! Types in this crate are plain data: inbound user events, the callback
//! payload grammar carried by buttons, and the render instructions sent back
//! to the transport. Behavior lives in the `codegate` crate.

pub mod action;
pub mod event;
pub mod render;

pub use action::*;
pub use event::*;
pub use render::*;

/// Catalog object identifier.
pub type ObjectId = u64;
