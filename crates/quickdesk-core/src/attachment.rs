//! The `AttachmentStorage` capability.
//!
//! Ticket creation hands uploaded bytes to an injected storage backend and
//! persists only the path it returns, so local disk can later be swapped for
//! object storage without touching the ticket store.

use std::future::Future;

/// A file received with a new ticket.
#[derive(Debug, Clone)]
pub struct Upload {
  /// Client-supplied file name; untrusted.
  pub file_name:    String,
  pub content_type: Option<String>,
  pub bytes:        Vec<u8>,
}

/// Stores attachment bytes and hands back a stable relative path.
pub trait AttachmentStorage: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist `upload` and return the path clients fetch it from, e.g.
  /// `/uploads/3f2a…-screenshot.png`.
  fn store(
    &self,
    upload: Upload,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  /// Remove a previously stored attachment. Unknown paths are not an error.
  fn discard<'a>(
    &'a self,
    path: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
