//! Categories: static classification labels chosen at ticket creation.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub type CategoryId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
  pub id:   CategoryId,
  pub name: String,
}

/// Trim a proposed category name and reject empty ones.
pub fn validate_name(name: &str) -> Result<String> {
  let name = name.trim();
  if name.is_empty() {
    return Err(Error::validation("Category name is required."));
  }
  Ok(name.to_owned())
}
