use std::fmt;
use std::str::FromStr;

use crate::ObjectId;

const REFRESH: &str = "refresh";
const TOGGLE_PREFIX: &str = "toggle:";

/// Action encoded in a button's callback payload.
///
/// Payload grammar: `refresh` or `toggle:<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
	Refresh,
	Toggle(ObjectId),
}

/// Payload that does not match the callback grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPayload(pub String);

impl fmt::Display for InvalidPayload {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "invalid callback payload: {:?}", self.0)
	}
}

impl std::error::Error for InvalidPayload {}

impl CallbackAction {
	/// Returns the payload string carried by a button for this action.
	pub fn payload(&self) -> String {
		self.to_string()
	}
}

impl FromStr for CallbackAction {
	type Err = InvalidPayload;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let trimmed = s.trim();
		if trimmed == REFRESH {
			return Ok(CallbackAction::Refresh);
		}
		trimmed
			.strip_prefix(TOGGLE_PREFIX)
			.and_then(|id| id.trim().parse::<ObjectId>().ok())
			.map(CallbackAction::Toggle)
			.ok_or_else(|| InvalidPayload(s.to_string()))
	}
}

impl fmt::Display for CallbackAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CallbackAction::Refresh => write!(f, "{REFRESH}"),
			CallbackAction::Toggle(id) => write!(f, "{TOGGLE_PREFIX}{id}"),
		}
	}
}
