//! Concrete row sources: a local JSON file and an HTTP/JSON endpoint.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use codegate::{Row, RowSource, SourceError, SourceResult, TableRef, rows_from_json};
use tracing::debug;
use url::Url;

use crate::error::{CliError, Result};

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Reads the whole table from a JSON file on every fetch.
///
/// The table reference is ignored: the file is the table.
#[derive(Debug, Clone)]
pub struct FileSource {
	path: PathBuf,
}

impl FileSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

#[async_trait]
impl RowSource for FileSource {
	async fn fetch(&self, _table: &TableRef) -> SourceResult<Vec<Row>> {
		let content = tokio::fs::read_to_string(&self.path)
			.await
			.map_err(|e| SourceError::unavailable(format!("{}: {e}", self.path.display())))?;
		let payload: serde_json::Value = serde_json::from_str(&content).map_err(|e| SourceError::malformed(format!("{}: {e}", self.path.display())))?;
		let rows = rows_from_json(&payload)?;
		debug!(target = "codegate.source", path = %self.path.display(), rows = rows.len(), "rows loaded from file");
		Ok(rows)
	}
}

/// Fetches `GET <base>/<sheet>/<worksheet>` and decodes the JSON body as rows.
#[derive(Debug, Clone)]
pub struct HttpSource {
	client: reqwest::Client,
	base: Url,
	token: Option<String>,
}

impl HttpSource {
	pub fn new(base: &str, token: Option<String>) -> Result<Self> {
		let base = Url::parse(base).map_err(|e| CliError::Config(format!("invalid source URL {base:?}: {e}")))?;
		if base.cannot_be_a_base() {
			return Err(CliError::Config(format!("source URL {base} cannot carry a path")));
		}
		let client = reqwest::Client::builder()
			.timeout(HTTP_TIMEOUT)
			.build()
			.map_err(|e| CliError::Config(format!("cannot build HTTP client: {e}")))?;
		Ok(Self { client, base, token })
	}

	/// Resolves the URL for a table.
	pub fn table_url(&self, table: &TableRef) -> SourceResult<Url> {
		let mut url = self.base.clone();
		url.path_segments_mut()
			.map_err(|_| SourceError::unavailable(format!("source URL {} cannot carry a path", self.base)))?
			.pop_if_empty()
			.push(&table.sheet)
			.push(&table.worksheet);
		Ok(url)
	}
}

#[async_trait]
impl RowSource for HttpSource {
	async fn fetch(&self, table: &TableRef) -> SourceResult<Vec<Row>> {
		let url = self.table_url(table)?;
		let mut request = self.client.get(url.clone());
		if let Some(token) = &self.token {
			request = request.bearer_auth(token);
		}

		let response = request.send().await.map_err(|e| SourceError::unavailable(e.to_string()))?;
		let status = response.status();
		if !status.is_success() {
			return Err(SourceError::unavailable(format!("{url} answered {status}")));
		}
		let payload: serde_json::Value = response.json().await.map_err(|e| SourceError::malformed(e.to_string()))?;
		let rows = rows_from_json(&payload)?;
		debug!(target = "codegate.source", %url, rows = rows.len(), "rows fetched");
		Ok(rows)
	}
}
