//! Error type for `quickdesk-store-sqlite`.

use std::time::Duration;

use quickdesk_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] quickdesk_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// The operation did not finish within the store's deadline.
  #[error("storage timed out after {0:?}")]
  Timeout(Duration),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unexpected column value: {0}")]
  Decode(String),
}

impl StoreError for Error {
  fn domain(&self) -> Option<&quickdesk_core::Error> {
    match self {
      Self::Core(e) => Some(e),
      _ => None,
    }
  }

  fn is_timeout(&self) -> bool { matches!(self, Self::Timeout(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
