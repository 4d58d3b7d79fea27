//! Handler for `POST /tickets/:id/vote`. Body: `{"value": 1}` or `{"value": -1}`.

use axum::{Json, extract::State};
use quickdesk_core::{
  attachment::AttachmentStorage,
  store::HelpdeskStore,
  ticket::TicketId,
  vote::{VoteOutcome, VoteValue},
};
use serde::Deserialize;

use crate::{
  AppState,
  auth::Authenticated,
  error::ApiError,
  extract::{ApiJson, ApiPath},
};

#[derive(Debug, Deserialize)]
pub struct VoteBody {
  pub value: i64,
}

/// `POST /tickets/:id/vote`
pub async fn cast<S, A>(
  Authenticated(actor): Authenticated,
  State(state): State<AppState<S, A>>,
  ApiPath(id): ApiPath<TicketId>,
  ApiJson(body): ApiJson<VoteBody>,
) -> Result<Json<VoteOutcome>, ApiError>
where
  S: HelpdeskStore + 'static,
  A: AttachmentStorage + 'static,
{
  let value = VoteValue::try_from(body.value)?;
  let outcome = state
    .store
    .cast_vote(id, actor.user_id, value)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(outcome))
}
