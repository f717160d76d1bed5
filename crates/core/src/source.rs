//! Data-source abstraction: the spreadsheet-like table that holds both the
//! authorization rows and the object catalog.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{SourceError, SourceResult};

/// Names the remote table to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
	pub sheet: String,
	pub worksheet: String,
}

impl TableRef {
	pub fn new(sheet: impl Into<String>, worksheet: impl Into<String>) -> Self {
		Self {
			sheet: sheet.into(),
			worksheet: worksheet.into(),
		}
	}
}

/// One fetched row, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
	cells: BTreeMap<String, String>,
}

impl Row {
	pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			cells: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
		}
	}

	/// Builds a row from a JSON object, stringifying scalar cells.
	pub fn from_json_object(object: &serde_json::Map<String, Value>) -> Self {
		Self {
			cells: object.iter().map(|(k, v)| (k.clone(), cell_text(v))).collect(),
		}
	}

	/// Returns the trimmed cell value, or `""` when the column is absent.
	pub fn get(&self, column: &str) -> &str {
		self.cells.get(column).map(|v| v.trim()).unwrap_or("")
	}
}

/// Decodes a fetched payload into rows.
///
/// Accepts either an array of row objects, or a sheet-style
/// `{"values": [[header, ...], [cell, ...], ...]}` grid whose first line
/// names the columns. Short grid lines leave trailing columns empty.
pub fn rows_from_json(payload: &Value) -> SourceResult<Vec<Row>> {
	match payload {
		Value::Array(items) => items
			.iter()
			.enumerate()
			.map(|(index, item)| match item {
				Value::Object(object) => Ok(Row::from_json_object(object)),
				other => Err(SourceError::malformed(format!("row {index} is not an object: {}", json_kind(other)))),
			})
			.collect(),
		Value::Object(object) => {
			let Some(Value::Array(lines)) = object.get("values") else {
				return Err(SourceError::malformed("expected an array of rows or a `values` grid"));
			};
			let mut lines = lines.iter();
			let Some(header) = lines.next() else {
				return Ok(Vec::new());
			};
			let header = grid_line(header, 0)?;
			lines
				.enumerate()
				.map(|(index, line)| {
					let cells = grid_line(line, index + 1)?;
					Ok(Row::from_pairs(
						header.iter().cloned().zip(cells.into_iter().chain(std::iter::repeat(String::new()))),
					))
				})
				.collect()
		}
		other => Err(SourceError::malformed(format!("expected rows, got {}", json_kind(other)))),
	}
}

fn grid_line(line: &Value, index: usize) -> SourceResult<Vec<String>> {
	match line {
		Value::Array(cells) => Ok(cells.iter().map(cell_text).collect()),
		other => Err(SourceError::malformed(format!("grid line {index} is not an array: {}", json_kind(other)))),
	}
}

fn cell_text(value: &Value) -> String {
	match value {
		Value::Null => String::new(),
		Value::String(s) => s.clone(),
		Value::Bool(b) => b.to_string(),
		Value::Number(n) => match n.as_f64() {
			Some(f) if !n.is_i64() && !n.is_u64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
			_ => n.to_string(),
		},
		other => other.to_string(),
	}
}

fn json_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

/// Supplier of table rows.
///
/// Implementations are constructed by the caller and injected into the
/// disclosure service; every call is a fresh fetch with no caching.
#[async_trait]
pub trait RowSource: Send + Sync + 'static {
	async fn fetch(&self, table: &TableRef) -> SourceResult<Vec<Row>>;
}

/// In-memory row source for tests and local runs.
#[derive(Debug, Default)]
pub struct MemorySource {
	rows: RwLock<Vec<Row>>,
	offline: AtomicBool,
	fetches: AtomicUsize,
}

impl MemorySource {
	pub fn new(rows: Vec<Row>) -> Self {
		Self {
			rows: RwLock::new(rows),
			..Default::default()
		}
	}

	/// Replaces the table contents seen by subsequent fetches.
	pub fn set_rows(&self, rows: Vec<Row>) {
		*self.rows.write() = rows;
	}

	/// Makes subsequent fetches fail with [`SourceError::Unavailable`] until re-enabled.
	pub fn set_offline(&self, offline: bool) {
		self.offline.store(offline, Ordering::SeqCst);
	}

	/// Number of fetch calls served so far, including failed ones.
	pub fn fetch_count(&self) -> usize {
		self.fetches.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl RowSource for MemorySource {
	async fn fetch(&self, _table: &TableRef) -> SourceResult<Vec<Row>> {
		self.fetches.fetch_add(1, Ordering::SeqCst);
		if self.offline.load(Ordering::SeqCst) {
			return Err(SourceError::unavailable("memory source is offline"));
		}
		Ok(self.rows.read().clone())
	}
}
