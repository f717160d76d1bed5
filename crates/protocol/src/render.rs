use serde::{Deserialize, Serialize};

use crate::ConversationId;

/// A single inline button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Button {
	pub label: String,
	pub action_payload: String,
}

impl Button {
	pub fn new(label: impl Into<String>, action_payload: impl Into<String>) -> Self {
		Self {
			label: label.into(),
			action_payload: action_payload.into(),
		}
	}
}

/// What the transport should display for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderInstruction {
	pub body_text: String,
	#[serde(default)]
	pub button_rows: Vec<Vec<Button>>,
}

impl RenderInstruction {
	pub fn new(body_text: impl Into<String>, button_rows: Vec<Vec<Button>>) -> Self {
		Self {
			body_text: body_text.into(),
			button_rows,
		}
	}

	/// Iterates all buttons in row order.
	pub fn buttons(&self) -> impl Iterator<Item = &Button> {
		self.button_rows.iter().flatten()
	}
}

/// Render instruction addressed to a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outbound {
	pub conversation_id: ConversationId,
	pub render: RenderInstruction,
}
