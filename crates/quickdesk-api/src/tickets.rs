//! Handlers for `/tickets` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/tickets` | `?status=&search=&category_id=&mine=&limit=&offset=` |
//! | `POST`   | `/tickets` | Multipart: `subject`, `description`, `category_id`, `attachment?` |
//! | `GET`    | `/tickets/:id` | 404 if not found |
//! | `DELETE` | `/tickets/:id` | Admin only |
//! | `PATCH`  | `/tickets/:id/status` | Body: `{"status":"in_progress"}` |
//! | `PATCH`  | `/tickets/:id/assignee` | Body: `{"assignee_id": 4}` or `null` |

use axum::{
  Json,
  extract::{Multipart, State, multipart::MultipartRejection},
  http::StatusCode,
  response::IntoResponse,
};
use quickdesk_core::{
  attachment::{AttachmentStorage, Upload},
  authz,
  store::HelpdeskStore,
  ticket::{
    NewTicket, Ticket, TicketDetail, TicketFilter, TicketId, TicketStatus, TicketSummary,
    parse_category_id,
  },
  user::UserId,
};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  auth::Authenticated,
  error::ApiError,
  extract::{ApiJson, ApiPath, ApiQuery},
};

fn ticket_not_found(id: TicketId) -> ApiError { ApiError::NotFound(format!("Ticket {id} not found")) }

/// Query values arrive as text; an empty value means "no filter".
fn non_empty(value: Option<String>) -> Option<String> {
  value.filter(|v| !v.trim().is_empty())
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub status:      Option<String>,
  pub search:      Option<String>,
  pub category_id: Option<String>,
  pub mine:        Option<String>,
  pub limit:       Option<usize>,
  pub offset:      Option<usize>,
}

impl ListParams {
  /// Turn the raw query into a store filter for `viewer`.
  pub fn into_filter(self, viewer: UserId) -> Result<TicketFilter, ApiError> {
    let status = non_empty(self.status)
      .map(|s| TicketStatus::parse_filter(&s))
      .transpose()?;
    let category_id = non_empty(self.category_id)
      .map(|c| parse_category_id(&c))
      .transpose()?;
    let mine = match non_empty(self.mine).as_deref().map(str::trim) {
      None | Some("false" | "0") => false,
      Some("true" | "1") => true,
      Some(other) => {
        return Err(ApiError::Validation(format!("invalid value for mine: {other:?}")));
      }
    };

    Ok(TicketFilter {
      status,
      search: non_empty(self.search),
      category_id,
      created_by: mine.then_some(viewer),
      limit: self.limit,
      offset: self.offset,
    })
  }
}

#[derive(Debug, Serialize)]
pub struct TicketList {
  pub tickets: Vec<TicketSummary>,
}

/// `GET /tickets`
pub async fn list<S, A>(
  Authenticated(actor): Authenticated,
  State(state): State<AppState<S, A>>,
  ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<TicketList>, ApiError>
where
  S: HelpdeskStore + 'static,
  A: AttachmentStorage + 'static,
{
  let filter = params.into_filter(actor.user_id)?;
  let tickets = state
    .store
    .list_tickets(filter, actor.user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(TicketList { tickets }))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct TicketForm {
  subject:     Option<String>,
  description: Option<String>,
  category_id: Option<String>,
  attachment:  Option<Upload>,
}

async fn read_form(mut multipart: Multipart) -> Result<TicketForm, ApiError> {
  let mut form = TicketForm::default();

  while let Some(field) = multipart.next_field().await? {
    let name = field.name().unwrap_or_default().to_owned();
    match name.as_str() {
      "subject" => form.subject = Some(field.text().await?),
      "description" => form.description = Some(field.text().await?),
      "category_id" => form.category_id = Some(field.text().await?),
      "attachment" => {
        let file_name = field.file_name().unwrap_or_default().to_owned();
        let content_type = field.content_type().map(str::to_owned);
        let bytes = field.bytes().await?;
        // Browsers send an empty part when no file was chosen.
        if !file_name.is_empty() && !bytes.is_empty() {
          form.attachment = Some(Upload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
          });
        }
      }
      _ => {}
    }
  }
  Ok(form)
}

/// `POST /tickets` (multipart form)
pub async fn create<S, A>(
  Authenticated(actor): Authenticated,
  State(state): State<AppState<S, A>>,
  multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: HelpdeskStore + 'static,
  A: AttachmentStorage + 'static,
{
  let form = read_form(multipart?).await?;

  let input = NewTicket {
    subject:         form.subject.unwrap_or_default(),
    description:     form.description.unwrap_or_default(),
    category_id:     parse_category_id(form.category_id.as_deref().unwrap_or_default())?,
    created_by:      actor.user_id,
    attachment_path: None,
  }
  .validate()?;

  let attachment_path = match form.attachment {
    Some(upload) => Some(
      state
        .attachments
        .store(upload)
        .await
        .map_err(|e| ApiError::Internal(format!("storing attachment failed: {e}")))?,
    ),
    None => None,
  };

  let created = state
    .store
    .create_ticket(NewTicket { attachment_path: attachment_path.clone(), ..input })
    .await;

  match created {
    Ok(ticket) => Ok((StatusCode::CREATED, Json(ticket))),
    Err(e) => {
      if let Some(path) = attachment_path {
        if let Err(discard) = state.attachments.discard(&path).await {
          tracing::warn!(%path, error = %discard, "orphaned attachment left behind");
        }
      }
      Err(ApiError::store(e))
    }
  }
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /tickets/:id`
pub async fn get_one<S, A>(
  Authenticated(actor): Authenticated,
  State(state): State<AppState<S, A>>,
  ApiPath(id): ApiPath<TicketId>,
) -> Result<Json<TicketDetail>, ApiError>
where
  S: HelpdeskStore + 'static,
  A: AttachmentStorage + 'static,
{
  let detail = state
    .store
    .get_ticket(id, actor.user_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ticket_not_found(id))?;
  Ok(Json(detail))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /tickets/:id`
pub async fn delete_one<S, A>(
  Authenticated(actor): Authenticated,
  State(state): State<AppState<S, A>>,
  ApiPath(id): ApiPath<TicketId>,
) -> Result<StatusCode, ApiError>
where
  S: HelpdeskStore + 'static,
  A: AttachmentStorage + 'static,
{
  authz::require_admin(&actor, "delete tickets")?;
  let removed = state
    .store
    .delete_ticket(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ticket_not_found(id))?;

  if let Some(path) = removed.attachment_path {
    if let Err(e) = state.attachments.discard(&path).await {
      tracing::warn!(%path, error = %e, "could not remove attachment of deleted ticket");
    }
  }
  Ok(StatusCode::NO_CONTENT)
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: String,
}

/// `PATCH /tickets/:id/status`
pub async fn update_status<S, A>(
  Authenticated(actor): Authenticated,
  State(state): State<AppState<S, A>>,
  ApiPath(id): ApiPath<TicketId>,
  ApiJson(body): ApiJson<StatusBody>,
) -> Result<Json<Ticket>, ApiError>
where
  S: HelpdeskStore + 'static,
  A: AttachmentStorage + 'static,
{
  let to = TicketStatus::parse_filter(&body.status)?;
  let current = state
    .store
    .get_ticket(id, actor.user_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ticket_not_found(id))?
    .ticket;

  authz::authorize_status_change(&actor, &current)?;
  let claim = authz::claimant(&actor, &current, to);

  let ticket = state
    .store
    .update_status(id, to, claim)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(ticket))
}

// ─── Assignee ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AssignBody {
  pub assignee_id: Option<UserId>,
}

/// `PATCH /tickets/:id/assignee`
pub async fn assign<S, A>(
  Authenticated(actor): Authenticated,
  State(state): State<AppState<S, A>>,
  ApiPath(id): ApiPath<TicketId>,
  ApiJson(body): ApiJson<AssignBody>,
) -> Result<Json<Ticket>, ApiError>
where
  S: HelpdeskStore + 'static,
  A: AttachmentStorage + 'static,
{
  authz::authorize_assignment(&actor, body.assignee_id)?;
  let ticket = state
    .store
    .assign_ticket(id, body.assignee_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(ticket))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn params(pairs: &[(&str, &str)]) -> ListParams {
    let mut p = ListParams::default();
    for (key, value) in pairs {
      let value = Some(value.to_string());
      match *key {
        "status" => p.status = value,
        "search" => p.search = value,
        "category_id" => p.category_id = value,
        "mine" => p.mine = value,
        _ => unreachable!(),
      }
    }
    p
  }

  #[test]
  fn empty_values_mean_no_filter() {
    let filter = params(&[("status", ""), ("search", "  "), ("category_id", ""), ("mine", "")])
      .into_filter(9)
      .unwrap();
    assert_eq!(filter.status, None);
    assert_eq!(filter.search, None);
    assert_eq!(filter.category_id, None);
    assert_eq!(filter.created_by, None);
  }

  #[test]
  fn mine_restricts_to_the_viewer() {
    let filter = params(&[("mine", "true"), ("status", "resolved")]).into_filter(9).unwrap();
    assert_eq!(filter.created_by, Some(9));
    assert_eq!(filter.status, Some(TicketStatus::Resolved));
  }

  #[test]
  fn unknown_status_is_rejected() {
    let err = params(&[("status", "pending")]).into_filter(9).unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
  }

  #[test]
  fn bad_category_is_rejected() {
    assert!(params(&[("category_id", "abc")]).into_filter(9).is_err());
    assert!(params(&[("mine", "maybe")]).into_filter(9).is_err());
  }
}
