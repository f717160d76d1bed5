//! Time-limited disclosure of object access codes in chat conversations.
//!
//! A user is authorized for a set of objects through a range expression in
//! a spreadsheet-like table. Each conversation gets a [`DisclosureSession`]
//! that reveals at most one object's code at a time and hides it again after
//! a fixed delay. The [`Disclosure`] service routes transport events to
//! sessions and always answers with a [`RenderInstruction`].
//!
//! Transport, data-source connectivity and configuration live outside this
//! crate; the data source is injected as a [`RowSource`].

pub mod catalog;
pub mod error;
pub mod layout;
pub mod range;
pub mod registry;
pub mod service;
pub mod session;
pub mod source;
pub mod timer;
pub mod view;

pub use catalog::{Columns, EmptyReason, MISSING_ADDRESS, MISSING_CODE, ObjectRecord, Resolution, resolve};
pub use codegate_protocol::{Button, CallbackAction, ConversationId, InboundEvent, ObjectId, Outbound, RenderInstruction};
pub use error::{SourceError, SourceResult};
pub use layout::{LayoutOptions, pack};
pub use range::parse_ranges;
pub use registry::{SessionHandle, SessionRegistry};
pub use service::{Disclosure, DisclosureSettings};
pub use session::{DisclosureSession, SessionState};
pub use source::{MemorySource, Row, RowSource, TableRef, rows_from_json};
pub use timer::{HideDue, HideScheduler, HideTimer, ManualScheduler, TokioScheduler};
pub use view::Presentation;
