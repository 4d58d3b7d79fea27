//! Handlers for a ticket's comment thread.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/tickets/:id/comments` | Oldest first |
//! | `POST` | `/tickets/:id/comments` | Body: `{"message":"…"}` |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use quickdesk_core::{
  attachment::AttachmentStorage,
  comment::{Comment, NewComment},
  store::HelpdeskStore,
  ticket::TicketId,
};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  auth::Authenticated,
  error::ApiError,
  extract::{ApiJson, ApiPath},
};

#[derive(Debug, Serialize)]
pub struct CommentList {
  pub comments: Vec<Comment>,
}

/// `GET /tickets/:id/comments`
pub async fn list<S, A>(
  Authenticated(_): Authenticated,
  State(state): State<AppState<S, A>>,
  ApiPath(id): ApiPath<TicketId>,
) -> Result<Json<CommentList>, ApiError>
where
  S: HelpdeskStore + 'static,
  A: AttachmentStorage + 'static,
{
  let comments = state.store.list_comments(id).await.map_err(ApiError::store)?;
  Ok(Json(CommentList { comments }))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub message: String,
}

/// `POST /tickets/:id/comments`
pub async fn create<S, A>(
  Authenticated(actor): Authenticated,
  State(state): State<AppState<S, A>>,
  ApiPath(id): ApiPath<TicketId>,
  ApiJson(body): ApiJson<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: HelpdeskStore + 'static,
  A: AttachmentStorage + 'static,
{
  let comment = state
    .store
    .add_comment(NewComment {
      ticket_id: id,
      author_id: actor.user_id,
      message:   body.message,
    })
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(comment)))
}
