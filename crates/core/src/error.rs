//! Error types for data-source access.

use thiserror::Error;

/// Failure to obtain rows from the data source.
///
/// Both variants are recoverable: the disclosure service renders them as a
/// retryable "temporarily unavailable" notice and keeps session state intact.
#[derive(Debug, Error)]
pub enum SourceError {
	/// The source could not be reached or refused the request.
	#[error("data source unavailable: {message}")]
	Unavailable { message: String },

	/// The source answered with something that is not a list of rows.
	#[error("malformed data source response: {message}")]
	Malformed { message: String },
}

impl SourceError {
	pub fn unavailable(message: impl Into<String>) -> Self {
		Self::Unavailable { message: message.into() }
	}

	pub fn malformed(message: impl Into<String>) -> Self {
		Self::Malformed { message: message.into() }
	}
}

/// Result type for data-source operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;
