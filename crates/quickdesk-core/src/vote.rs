//! Votes: one signed opinion per user per ticket.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A single user's +1/−1 signal on a ticket. Serialised as the bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum VoteValue {
  Up,
  Down,
}

impl VoteValue {
  pub fn as_i64(self) -> i64 {
    match self {
      Self::Up => 1,
      Self::Down => -1,
    }
  }
}

impl From<VoteValue> for i64 {
  fn from(v: VoteValue) -> Self { v.as_i64() }
}

impl TryFrom<i64> for VoteValue {
  type Error = Error;

  fn try_from(value: i64) -> Result<Self> {
    match value {
      1 => Ok(Self::Up),
      -1 => Ok(Self::Down),
      other => Err(Error::validation(format!(
        "vote value must be 1 or -1, got {other}"
      ))),
    }
  }
}

/// How much a ticket's `vote_count` moves when a user's vote goes from
/// `previous` to `next`. Resubmitting the same vote moves nothing.
pub fn vote_delta(previous: Option<VoteValue>, next: VoteValue) -> i64 {
  next.as_i64() - previous.map_or(0, VoteValue::as_i64)
}

/// Result of [`crate::store::HelpdeskStore::cast_vote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOutcome {
  pub vote_count: i64,
  pub my_vote:    VoteValue,
}
