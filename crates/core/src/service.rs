//! Routes inbound events to per-conversation sessions.

use std::sync::Arc;

use codegate_protocol::{CallbackAction, ConversationId, InboundEvent, ObjectId, Outbound, RenderInstruction};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::catalog::{Columns, Resolution, resolve};
use crate::error::SourceResult;
use crate::registry::SessionRegistry;
use crate::source::{RowSource, TableRef};
use crate::timer::{HideDue, HideScheduler};
use crate::view::{self, Presentation};

/// Settings for the disclosure service.
#[derive(Debug, Clone)]
pub struct DisclosureSettings {
	pub table: TableRef,
	pub columns: Columns,
	pub presentation: Presentation,
}

/// Disclosure service: owns the session registry and the injected collaborators.
///
/// Fetches always happen before a session lock is taken; the result is then
/// applied to the session in one locked step. No error escapes: every
/// operation yields a render instruction.
pub struct Disclosure {
	registry: SessionRegistry,
	source: Arc<dyn RowSource>,
	scheduler: Arc<dyn HideScheduler>,
	settings: DisclosureSettings,
}

impl Disclosure {
	pub fn new(source: Arc<dyn RowSource>, scheduler: Arc<dyn HideScheduler>, settings: DisclosureSettings) -> Self {
		Self {
			registry: SessionRegistry::new(),
			source,
			scheduler,
			settings,
		}
	}

	pub fn registry(&self) -> &SessionRegistry {
		&self.registry
	}

	pub fn settings(&self) -> &DisclosureSettings {
		&self.settings
	}

	/// Handles any inbound event.
	pub async fn handle(&self, event: InboundEvent) -> RenderInstruction {
		match event {
			InboundEvent::Open { conversation_id, user_key } => self.open(&conversation_id, &user_key).await,
			InboundEvent::Refresh { conversation_id, user_key } => self.refresh(&conversation_id, &user_key).await,
			InboundEvent::Toggle {
				conversation_id,
				user_key,
				object_id,
			} => match object_id.parse() {
				Some(id) => self.toggle(&conversation_id, &user_key, id).await,
				None => self.invalid_request(&conversation_id, &format!("{object_id:?}")).await,
			},
			InboundEvent::Callback {
				conversation_id,
				user_key,
				payload,
			} => self.callback(&conversation_id, &user_key, &payload).await,
			InboundEvent::Reset { conversation_id } => self.reset(&conversation_id).await,
		}
	}

	pub async fn open(&self, conversation_id: &ConversationId, user_key: &str) -> RenderInstruction {
		info!(target = "codegate.service", conversation = %conversation_id, "open");
		self.list(conversation_id, user_key).await
	}

	pub async fn refresh(&self, conversation_id: &ConversationId, user_key: &str) -> RenderInstruction {
		info!(target = "codegate.service", conversation = %conversation_id, "refresh");
		self.list(conversation_id, user_key).await
	}

	/// Toggles an object after re-validating the user's authorization.
	pub async fn toggle(&self, conversation_id: &ConversationId, user_key: &str, object_id: ObjectId) -> RenderInstruction {
		info!(target = "codegate.service", conversation = %conversation_id, object_id, "toggle");
		let fetched = self.fetch_resolution(user_key).await;
		let handle = self.registry.get_or_create(conversation_id);
		let mut session = handle.lock().await;
		match fetched {
			Ok(resolution) => session.apply_toggle(user_key, object_id, resolution, self.scheduler.as_ref(), &self.settings.presentation),
			Err(err) => {
				warn!(target = "codegate.service", conversation = %conversation_id, error = %err, "toggle fetch failed");
				session.unavailable(&self.settings.presentation)
			}
		}
	}

	/// Dispatches a raw button payload.
	pub async fn callback(&self, conversation_id: &ConversationId, user_key: &str, payload: &str) -> RenderInstruction {
		match payload.parse::<CallbackAction>() {
			Ok(CallbackAction::Refresh) => self.refresh(conversation_id, user_key).await,
			Ok(CallbackAction::Toggle(id)) => self.toggle(conversation_id, user_key, id).await,
			Err(_) => self.invalid_request(conversation_id, payload).await,
		}
	}

	/// Applies a due hide. Returns `None` when it is stale or the session is gone.
	pub async fn timer_fired(&self, due: &HideDue) -> Option<RenderInstruction> {
		let Some(handle) = self.registry.get(&due.conversation_id) else {
			debug!(target = "codegate.service", conversation = %due.conversation_id, "hide for unknown session ignored");
			return None;
		};
		let mut session = handle.lock().await;
		session.hide_due(due, &self.settings.presentation)
	}

	/// Drops the conversation's session, cancelling any pending hide.
	pub async fn reset(&self, conversation_id: &ConversationId) -> RenderInstruction {
		let existed = self.registry.reset(conversation_id).await;
		info!(target = "codegate.service", conversation = %conversation_id, existed, "reset");
		RenderInstruction::new(view::closed(), Vec::new())
	}

	/// Delivers due hides until the scheduler's channel closes, forwarding renders to `sink`.
	pub async fn run_hides(self: Arc<Self>, mut due_rx: mpsc::UnboundedReceiver<HideDue>, sink: mpsc::UnboundedSender<Outbound>) {
		while let Some(due) = due_rx.recv().await {
			let Some(render) = self.timer_fired(&due).await else {
				continue;
			};
			let outbound = Outbound {
				conversation_id: due.conversation_id,
				render,
			};
			if sink.send(outbound).is_err() {
				debug!(target = "codegate.service", "outbound sink closed; stopping hide loop");
				break;
			}
		}
	}

	async fn list(&self, conversation_id: &ConversationId, user_key: &str) -> RenderInstruction {
		let fetched = self.fetch_resolution(user_key).await;
		let handle = self.registry.get_or_create(conversation_id);
		let mut session = handle.lock().await;
		match fetched {
			Ok(resolution) => session.apply_listing(user_key, resolution, &self.settings.presentation),
			Err(err) => {
				warn!(target = "codegate.service", conversation = %conversation_id, error = %err, "listing fetch failed");
				session.unavailable(&self.settings.presentation)
			}
		}
	}

	async fn invalid_request(&self, conversation_id: &ConversationId, payload: &str) -> RenderInstruction {
		warn!(target = "codegate.service", conversation = %conversation_id, payload, "invalid request");
		let Some(handle) = self.registry.get(conversation_id) else {
			return RenderInstruction::new(view::invalid_request(), view::refresh_only());
		};
		let session = handle.lock().await;
		session.invalid_request(&self.settings.presentation)
	}

	async fn fetch_resolution(&self, user_key: &str) -> SourceResult<Resolution> {
		let rows = self.source.fetch(&self.settings.table).await?;
		Ok(resolve(user_key, &rows, &self.settings.columns))
	}
}
