use std::io;

/// Top-level error type returned by every public entry point of this crate.
///
/// Low-level decode/container helpers keep returning `Result<T, String>`, matching
/// how this codebase has always reported malformed-wire-data details; anything that
/// crosses a public boundary gets folded into one of these variants instead, so a
/// caller can match on a kind rather than parse a message.
#[derive(thiserror::Error, Debug)]
pub enum WharfError {
  #[error("{action}: {source}")]
  Io {
    action: String,
    #[source]
    source: io::Error,
  },

  #[error("malformed wire data: {0}")]
  Format(String),

  #[error("internal consistency error: {0}")]
  Consistency(String),

  #[error("integrity check failed\n  expected: {expected:x?}\n  found: {found:x?}")]
  Integrity { expected: Vec<u8>, found: Vec<u8> },

  #[error("invalid configuration: {0}")]
  Config(String),

  #[error("operation cancelled because a concurrent task failed")]
  Cancelled,
}

impl WharfError {
  pub fn io(action: impl Into<String>, source: io::Error) -> Self {
    WharfError::Io {
      action: action.into(),
      source,
    }
  }
}

/// Folds one of this crate's internal `Result<T, String>` helpers into a [`WharfError`].
///
/// Internal helpers already describe *what* went wrong in their message; at a public
/// boundary that's wire-format or invariant information, never an I/O failure, so it
/// becomes [`WharfError::Format`].
pub(crate) trait IntoWharfError<T> {
  fn format_err(self) -> Result<T, WharfError>;
  fn consistency_err(self) -> Result<T, WharfError>;
}

impl<T> IntoWharfError<T> for Result<T, String> {
  fn format_err(self) -> Result<T, WharfError> {
    self.map_err(WharfError::Format)
  }

  fn consistency_err(self) -> Result<T, WharfError> {
    self.map_err(WharfError::Consistency)
  }
}
