//! Error type for the command-line front end.

use codegate::SourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("configuration error: {0}")]
	Config(String),

	#[error(transparent)]
	Source(#[from] SourceError),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
