//! Message bodies for every render the disclosure service produces.

use std::time::Duration;

use codegate_protocol::{Button, CallbackAction, ObjectId};

use crate::catalog::{EmptyReason, ObjectRecord};
use crate::layout::{LayoutOptions, REFRESH_LABEL};

/// Presentation settings shared by all sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presentation {
	pub layout: LayoutOptions,
	/// Delay after which a revealed code is hidden again.
	pub hide_after: Duration,
}

impl Default for Presentation {
	fn default() -> Self {
		Self {
			layout: LayoutOptions::default(),
			hide_after: Duration::from_secs(60),
		}
	}
}

pub(crate) fn refresh_only() -> Vec<Vec<Button>> {
	vec![vec![Button::new(REFRESH_LABEL, CallbackAction::Refresh.payload())]]
}

pub(crate) fn listing(count: usize) -> String {
	format!("📋 Objects available to you: {count}\nTap an address to show its access code.")
}

pub(crate) fn empty(reason: EmptyReason) -> String {
	match reason {
		EmptyReason::NoExpression => "ℹ️ No objects are assigned to you yet.".to_string(),
		EmptyReason::Unparseable => "⚠️ Your object list could not be read. Please contact the administrator.".to_string(),
		EmptyReason::NoMatches => "📭 None of your objects are available right now.".to_string(),
	}
}

pub(crate) fn revealed(object: &ObjectRecord, hide_after: Duration) -> String {
	let mut body = format!("📍 {}\n🔑 Code: {}", object.address, object.code);
	if !object.details.is_empty() {
		body.push_str("\n📝 ");
		body.push_str(&object.details);
	}
	body.push_str(&format!("\n\n⏱ The code will be hidden in {} s.", hide_after.as_secs()));
	body
}

pub(crate) fn no_access(user_key: &str) -> String {
	format!("❌ You do not have access to any objects.\nYour id: {user_key}\nSend it to the administrator to request access.")
}

pub(crate) fn unavailable() -> String {
	"⚠️ The object list is temporarily unavailable. Please try again in a moment.".to_string()
}

pub(crate) fn invalid_request() -> String {
	"⚠️ Invalid request.".to_string()
}

pub(crate) fn not_found(id: ObjectId) -> String {
	format!("❌ Object #{id} is no longer available.")
}

pub(crate) fn closed() -> String {
	"👋 Session closed. Send /start to begin again.".to_string()
}
