//! Resolves a user's authorized objects from fetched table rows.

use std::collections::HashMap;

use codegate_protocol::ObjectId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::range::parse_ranges;
use crate::source::Row;

/// Placeholder shown when a catalog row has no address.
pub const MISSING_ADDRESS: &str = "(no address)";
/// Placeholder shown when a catalog row has no code.
pub const MISSING_CODE: &str = "(no code)";

/// Column names used to read authorization and catalog rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Columns {
	/// Holds the user key a row grants access to.
	pub access: String,
	/// Holds the range expression of ids granted to that user.
	pub ranges: String,
	pub id: String,
	pub address: String,
	pub code: String,
	pub details: String,
}

impl Default for Columns {
	fn default() -> Self {
		Self {
			access: "ДОСТУП".to_string(),
			ranges: "ИНФОРМАЦИЯ".to_string(),
			id: "ID".to_string(),
			address: "Адрес".to_string(),
			code: "Код".to_string(),
			details: "Детали".to_string(),
		}
	}
}

/// A catalogued physical object and its secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectRecord {
	pub id: ObjectId,
	pub address: String,
	pub code: String,
	pub details: String,
}

/// Why an authorized user ended up with no objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
	/// The user's row has no range expression.
	NoExpression,
	/// The expression is present but yielded no ids.
	Unparseable,
	/// None of the parsed ids exist in the catalog.
	NoMatches,
}

/// Outcome of resolving a user key against fetched rows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
	pub authorized: bool,
	/// Authorized objects in ascending id order.
	pub objects: Vec<ObjectRecord>,
	/// Ids granted by the expression but absent from the catalog.
	pub missing: Vec<ObjectId>,
	expression_blank: bool,
}

impl Resolution {
	/// The outcome for a user with no authorization row.
	pub fn denied() -> Self {
		Self::default()
	}

	pub fn empty_reason(&self) -> Option<EmptyReason> {
		if !self.authorized || !self.objects.is_empty() {
			return None;
		}
		Some(if self.expression_blank {
			EmptyReason::NoExpression
		} else if self.missing.is_empty() {
			EmptyReason::Unparseable
		} else {
			EmptyReason::NoMatches
		})
	}

	pub fn object(&self, id: ObjectId) -> Option<&ObjectRecord> {
		self.objects.iter().find(|object| object.id == id)
	}
}

/// Finds `user_key`'s authorization row and returns the objects it grants.
///
/// The first row whose trimmed access cell equals the key wins; the key
/// itself is compared as given. Catalog rows with a missing or non-numeric
/// id are ignored; when an id repeats, the last row wins.
pub fn resolve(user_key: &str, rows: &[Row], columns: &Columns) -> Resolution {
	if user_key.trim().is_empty() {
		return Resolution::denied();
	}

	let Some(grant) = rows.iter().find(|row| row.get(&columns.access) == user_key) else {
		debug!(target = "codegate.catalog", rows = rows.len(), "no authorization row for user");
		return Resolution::denied();
	};

	let expression = grant.get(&columns.ranges);
	let wanted = parse_ranges(expression);

	let mut catalog: HashMap<ObjectId, &Row> = HashMap::new();
	for row in rows {
		match row.get(&columns.id).parse::<ObjectId>() {
			Ok(id) => {
				catalog.insert(id, row);
			}
			Err(_) => continue,
		}
	}

	let mut objects = Vec::with_capacity(wanted.len());
	let mut missing = Vec::new();
	for id in wanted {
		match catalog.get(&id) {
			Some(row) => objects.push(ObjectRecord {
				id,
				address: non_empty_or(row.get(&columns.address), MISSING_ADDRESS),
				code: non_empty_or(row.get(&columns.code), MISSING_CODE),
				details: row.get(&columns.details).to_string(),
			}),
			None => missing.push(id),
		}
	}

	debug!(
		target = "codegate.catalog",
		catalog = catalog.len(),
		granted = objects.len(),
		missing = missing.len(),
		"resolved authorized objects"
	);

	Resolution {
		authorized: true,
		objects,
		missing,
		expression_blank: expression.is_empty(),
	}
}

fn non_empty_or(value: &str, placeholder: &str) -> String {
	if value.is_empty() { placeholder.to_string() } else { value.to_string() }
}
