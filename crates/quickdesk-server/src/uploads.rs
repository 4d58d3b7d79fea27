//! Attachment storage on the local disk.
//!
//! Files land directly in the uploads directory as
//! `<random hex>-<sanitised name>` and are served back under
//! [`UPLOADS_PREFIX`] by the static file layer.

use std::path::{Path, PathBuf};

use quickdesk_core::attachment::{AttachmentStorage, Upload};
use thiserror::Error;
use uuid::Uuid;

/// URL prefix under which stored attachments are served.
pub const UPLOADS_PREFIX: &str = "/uploads";

/// Longest kept portion of a client file name, in characters.
const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Error)]
pub enum AttachmentError {
  #[error("attachment I/O error: {0}")]
  Io(#[from] std::io::Error),
}

/// Stores attachments as plain files under `root`.
#[derive(Debug, Clone)]
pub struct DiskAttachments {
  root: PathBuf,
}

impl DiskAttachments {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  pub fn root(&self) -> &Path { &self.root }

  /// Map a stored `/uploads/<name>` path back to its file. Anything that is
  /// not a single plain file name under the prefix resolves to nothing.
  fn resolve(&self, path: &str) -> Option<PathBuf> {
    let name = path.strip_prefix(UPLOADS_PREFIX)?.strip_prefix('/')?;
    let plain = !name.is_empty()
      && !name.starts_with('.')
      && !name.contains(['/', '\\']);
    plain.then(|| self.root.join(name))
  }
}

/// Reduce a client-supplied file name to a safe single path component.
pub fn sanitize_file_name(raw: &str) -> String {
  let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
  let cleaned: String = base
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
    .take(MAX_NAME_LEN)
    .collect();
  let cleaned = cleaned.trim_start_matches('.');
  if cleaned.is_empty() { "file".to_owned() } else { cleaned.to_owned() }
}

impl AttachmentStorage for DiskAttachments {
  type Error = AttachmentError;

  async fn store(&self, upload: Upload) -> Result<String, AttachmentError> {
    tokio::fs::create_dir_all(&self.root).await?;

    let name = format!(
      "{}-{}",
      Uuid::new_v4().simple(),
      sanitize_file_name(&upload.file_name)
    );
    tokio::fs::write(self.root.join(&name), &upload.bytes).await?;

    tracing::debug!(
      %name,
      size = upload.bytes.len(),
      content_type = upload.content_type.as_deref().unwrap_or("unknown"),
      "attachment stored"
    );
    Ok(format!("{UPLOADS_PREFIX}/{name}"))
  }

  async fn discard<'a>(&'a self, path: &'a str) -> Result<(), AttachmentError> {
    let Some(file) = self.resolve(path) else {
      return Ok(());
    };
    match tokio::fs::remove_file(&file).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}
