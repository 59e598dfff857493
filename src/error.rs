use thiserror::Error;

#[derive(Error, Debug)]
pub enum SparseError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Malformed run-length at encoded offset {offset}: {digits:?}")]
	MalformedCount { offset: u64, digits: String },

	#[error("Truncated stream at encoded offset {offset}: {reason}")]
	TruncatedStream { offset: u64, reason: &'static str },

	#[error("Internal invariant violated: {0}")]
	InternalInvariantViolation(String),

	#[error("Cancelled after {offset} input bytes")]
	Cancelled { offset: u64 },

	#[error("Configuration error: {0}")]
	ConfigError(String),
}

impl SparseError {
	/// True for errors caused by the content of an encoded stream.
	pub fn is_format_error(&self) -> bool {
		matches!(self, SparseError::MalformedCount { .. } | SparseError::TruncatedStream { .. })
	}
}

pub type Result<T> = std::result::Result<T, SparseError>;
