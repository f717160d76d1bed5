//! Parser for authorization range expressions such as `"1-5,7,10-12"`.

use std::collections::BTreeSet;

use codegate_protocol::ObjectId;
use tracing::{debug, warn};

/// Largest number of ids a single `start-end` segment may expand to.
///
/// Wider segments are skipped like any other malformed segment.
pub const MAX_RANGE_SPAN: u64 = 100_000;

/// Parses a comma-separated list of ids and inclusive `start-end` ranges.
///
/// Never fails: malformed segments, reversed ranges and oversized ranges are
/// skipped individually. The result is deduplicated and ascending.
pub fn parse_ranges<'a>(expression: impl Into<Option<&'a str>>) -> BTreeSet<ObjectId> {
	let mut ids = BTreeSet::new();
	let Some(expression) = expression.into() else {
		return ids;
	};

	for segment in expression.split(',').map(str::trim).filter(|s| !s.is_empty()) {
		if segment.contains('-') {
			match parse_span(segment) {
				Some((start, end)) if start > end => {
					debug!(target = "codegate.range", segment, "reversed range skipped");
				}
				Some((start, end)) if end - start >= MAX_RANGE_SPAN => {
					warn!(target = "codegate.range", segment, max = MAX_RANGE_SPAN, "range too wide; skipped");
				}
				Some((start, end)) => ids.extend(start..=end),
				None => warn!(target = "codegate.range", segment, "malformed range skipped"),
			}
		} else {
			match parse_id(segment) {
				Some(id) => {
					ids.insert(id);
				}
				None => warn!(target = "codegate.range", segment, "malformed id skipped"),
			}
		}
	}

	ids
}

fn parse_span(segment: &str) -> Option<(ObjectId, ObjectId)> {
	let mut halves = segment.split('-');
	let start = parse_id(halves.next()?)?;
	let end = parse_id(halves.next()?)?;
	if halves.next().is_some() {
		return None;
	}
	Some((start, end))
}

fn parse_id(text: &str) -> Option<ObjectId> {
	text.trim().parse().ok()
}
