use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ObjectId;

/// Identifier of a chat conversation, as supplied by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ConversationId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for ConversationId {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

/// Object id as it arrives on the wire, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawObjectId {
	Number(ObjectId),
	Text(String),
	Other(serde_json::Value),
}

impl RawObjectId {
	/// Returns the numeric id, or `None` when the payload is not a non-negative integer.
	pub fn parse(&self) -> Option<ObjectId> {
		match self {
			RawObjectId::Number(id) => Some(*id),
			RawObjectId::Text(text) => text.trim().parse().ok(),
			RawObjectId::Other(_) => None,
		}
	}
}

/// Event delivered by the transport on behalf of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
	/// The user started the bot in this conversation.
	Open { conversation_id: ConversationId, user_key: String },
	/// The user asked for a fresh list.
	Refresh { conversation_id: ConversationId, user_key: String },
	/// The user pressed an object button.
	Toggle {
		conversation_id: ConversationId,
		user_key: String,
		object_id: RawObjectId,
	},
	/// Raw button callback; the payload follows the [`CallbackAction`](crate::CallbackAction) grammar.
	Callback {
		conversation_id: ConversationId,
		user_key: String,
		payload: String,
	},
	/// The conversation was explicitly reset.
	Reset { conversation_id: ConversationId },
}

impl InboundEvent {
	pub fn conversation_id(&self) -> &ConversationId {
		match self {
			InboundEvent::Open { conversation_id, .. }
			| InboundEvent::Refresh { conversation_id, .. }
			| InboundEvent::Toggle { conversation_id, .. }
			| InboundEvent::Callback { conversation_id, .. }
			| InboundEvent::Reset { conversation_id } => conversation_id,
		}
	}
}
