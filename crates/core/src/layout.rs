//! Packs object buttons into rows under a label-width budget.

use codegate_protocol::{Button, CallbackAction, ObjectId};

use crate::catalog::ObjectRecord;

/// Label of the trailing control row.
pub const REFRESH_LABEL: &str = "🔄 Refresh codes";

/// Row-packing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutOptions {
	/// Labels longer than this many characters get a row of their own.
	pub max_inline_label: usize,
	/// Maximum number of short labels sharing a row.
	pub columns: usize,
}

impl Default for LayoutOptions {
	fn default() -> Self {
		Self {
			max_inline_label: 24,
			columns: 2,
		}
	}
}

/// Button label for an object: its address, or the code when revealed.
pub fn object_label(object: &ObjectRecord, revealed: Option<ObjectId>) -> String {
	if revealed == Some(object.id) {
		format!("🔑 {} · {}", object.code, object.address)
	} else {
		object.address.clone()
	}
}

/// Arranges object buttons greedily, left to right, never reordering.
///
/// A label over the budget sits alone on a full-width row. A short label
/// starts a row and pulls following short labels in until the row holds
/// `columns` buttons; the first long label ends the row. The refresh row
/// is always last.
pub fn pack(objects: &[ObjectRecord], revealed: Option<ObjectId>, options: &LayoutOptions) -> Vec<Vec<Button>> {
	let columns = options.columns.max(1);
	let labelled: Vec<(Button, bool)> = objects
		.iter()
		.map(|object| {
			let label = object_label(object, revealed);
			let fits = label.chars().count() <= options.max_inline_label;
			(Button::new(label, CallbackAction::Toggle(object.id).payload()), fits)
		})
		.collect();

	let mut rows = Vec::new();
	let mut index = 0;
	while index < labelled.len() {
		let (button, fits) = &labelled[index];
		index += 1;
		let mut row = vec![button.clone()];
		if *fits {
			while row.len() < columns {
				match labelled.get(index) {
					Some((next, true)) => {
						row.push(next.clone());
						index += 1;
					}
					_ => break,
				}
			}
		}
		rows.push(row);
	}

	rows.push(vec![Button::new(REFRESH_LABEL, CallbackAction::Refresh.payload())]);
	rows
}
