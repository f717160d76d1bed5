//! Process-wide map from conversation to its disclosure session.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use codegate_protocol::ConversationId;
use parking_lot::Mutex;
use tracing::debug;

use crate::session::DisclosureSession;

/// Shared, lockable handle to one conversation's session.
///
/// The async mutex serializes every read-modify-write of the session.
pub type SessionHandle = Arc<tokio::sync::Mutex<DisclosureSession>>;

/// Owns all sessions. In-memory only.
#[derive(Debug, Default)]
pub struct SessionRegistry {
	sessions: Mutex<HashMap<ConversationId, SessionHandle>>,
	next_instance: AtomicU64,
}

impl SessionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the conversation's session, creating a `Closed` one on first use.
	pub fn get_or_create(&self, conversation_id: &ConversationId) -> SessionHandle {
		let mut sessions = self.sessions.lock();
		if let Some(handle) = sessions.get(conversation_id) {
			return Arc::clone(handle);
		}

		let instance = self.next_instance.fetch_add(1, Ordering::SeqCst) + 1;
		debug!(target = "codegate.registry", conversation = %conversation_id, instance, "session created");
		let handle = Arc::new(tokio::sync::Mutex::new(DisclosureSession::new(conversation_id.clone(), instance)));
		sessions.insert(conversation_id.clone(), Arc::clone(&handle));
		handle
	}

	/// Returns the conversation's session without creating one.
	pub fn get(&self, conversation_id: &ConversationId) -> Option<SessionHandle> {
		self.sessions.lock().get(conversation_id).cloned()
	}

	/// Removes the conversation's session and cancels its pending hide.
	///
	/// Returns `false` when there was no session.
	pub async fn reset(&self, conversation_id: &ConversationId) -> bool {
		let removed = self.sessions.lock().remove(conversation_id);
		let Some(handle) = removed else {
			return false;
		};
		handle.lock().await.close();
		debug!(target = "codegate.registry", conversation = %conversation_id, "session reset");
		true
	}

	pub fn len(&self) -> usize {
		self.sessions.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
