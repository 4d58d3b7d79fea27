//! Async HTTP client wrapping the QuickDesk JSON API.

use std::time::Duration;

use chrono::{DateTime, Utc};
use quickdesk_core::{
  category::{Category, CategoryId},
  comment::Comment,
  ticket::{Ticket, TicketDetail, TicketId, TicketStatus, TicketSummary},
  user::{Role, User, UserId},
  vote::{VoteOutcome, VoteValue},
};
use reqwest::{Client, RequestBuilder, Response, multipart};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use thiserror::Error;

use crate::forms::{RegisterForm, TicketForm};

#[derive(Debug, Error)]
pub enum ClientError {
  /// The server answered with a non-success status.
  #[error("{message}")]
  Api { status: u16, message: String },

  #[error("Network error.")]
  Network(#[source] reqwest::Error),

  #[error("unexpected response body: {0}")]
  Decode(#[source] reqwest::Error),

  #[error("cannot read attachment: {0}")]
  Attachment(#[from] std::io::Error),
}

impl ClientError {
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Api { status, .. } => Some(*status),
      _ => None,
    }
  }
}

/// Response of `POST /api/auth/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
  pub token:      String,
  pub expires_at: DateTime<Utc>,
  pub user:       User,
}

/// Filters for [`ApiClient::list_tickets`]. Unset fields are not sent.
#[derive(Debug, Clone, Default)]
pub struct TicketQuery {
  pub status:      Option<TicketStatus>,
  pub search:      Option<String>,
  pub category_id: Option<CategoryId>,
  pub mine:        bool,
  pub limit:       Option<usize>,
  pub offset:      Option<usize>,
}

impl TicketQuery {
  fn pairs(&self) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if let Some(status) = self.status {
      pairs.push(("status", status.to_string()));
    }
    if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
      pairs.push(("search", search.to_owned()));
    }
    if let Some(category_id) = self.category_id {
      pairs.push(("category_id", category_id.to_string()));
    }
    if self.mine {
      pairs.push(("mine", "true".to_owned()));
    }
    if let Some(limit) = self.limit {
      pairs.push(("limit", limit.to_string()));
    }
    if let Some(offset) = self.offset {
      pairs.push(("offset", offset.to_string()));
    }
    pairs
  }
}

#[derive(Deserialize)]
struct ErrorBody {
  message: Option<String>,
}

#[derive(Deserialize)]
struct Registered {
  user: User,
}

#[derive(Deserialize)]
struct Categories {
  categories: Vec<Category>,
}

#[derive(Deserialize)]
struct Tickets {
  tickets: Vec<TicketSummary>,
}

#[derive(Deserialize)]
struct Comments {
  comments: Vec<Comment>,
}

/// Async HTTP client for the QuickDesk REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client:   Client,
  base_url: String,
  token:    Option<String>,
}

impl ApiClient {
  pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, ClientError> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(ClientError::Network)?;
    Ok(Self { client, base_url: base_url.into(), token })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    match &self.token {
      Some(token) => req.bearer_auth(token),
      None => req,
    }
  }

  /// Send `req`, turning an error status into [`ClientError::Api`] with the
  /// server's message, or `fallback` when the body carries none.
  async fn execute(&self, req: RequestBuilder, fallback: &str) -> Result<Response, ClientError> {
    let resp = self.auth(req).send().await.map_err(ClientError::Network)?;
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let message = resp
      .json::<ErrorBody>()
      .await
      .ok()
      .and_then(|b| b.message)
      .filter(|m| !m.is_empty())
      .unwrap_or_else(|| fallback.to_owned());
    tracing::debug!(status = status.as_u16(), %message, "request failed");
    Err(ClientError::Api { status: status.as_u16(), message })
  }

  async fn send<T: DeserializeOwned>(
    &self,
    req: RequestBuilder,
    fallback: &str,
  ) -> Result<T, ClientError> {
    let resp = self.execute(req, fallback).await?;
    resp.json().await.map_err(ClientError::Decode)
  }

  // ── Accounts ──────────────────────────────────────────────────────────────

  /// `POST /api/auth/register`
  pub async fn register(&self, form: &RegisterForm) -> Result<User, ClientError> {
    let body = json!({ "name": form.name, "email": form.email, "password": form.password });
    let registered: Registered = self
      .send(self.client.post(self.url("/auth/register")).json(&body), "Registration failed.")
      .await?;
    Ok(registered.user)
  }

  /// `POST /api/auth/login`
  pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
    let body = json!({ "email": email, "password": password });
    self
      .send(self.client.post(self.url("/auth/login")).json(&body), "Login failed.")
      .await
  }

  /// `GET /api/users/me`
  pub async fn me(&self) -> Result<User, ClientError> {
    self
      .send(self.client.get(self.url("/users/me")), "Failed to load account.")
      .await
  }

  /// `PATCH /api/users/:id/role`
  pub async fn set_role(&self, user_id: UserId, role: Role) -> Result<User, ClientError> {
    self
      .send(
        self
          .client
          .patch(self.url(&format!("/users/{user_id}/role")))
          .json(&json!({ "role": role })),
        "Failed to change role.",
      )
      .await
  }

  // ── Categories ────────────────────────────────────────────────────────────

  /// `GET /api/categories`
  pub async fn categories(&self) -> Result<Vec<Category>, ClientError> {
    let list: Categories = self
      .send(self.client.get(self.url("/categories")), "Failed to load categories.")
      .await?;
    Ok(list.categories)
  }

  /// `POST /api/categories`
  pub async fn create_category(&self, name: &str) -> Result<Category, ClientError> {
    self
      .send(
        self.client.post(self.url("/categories")).json(&json!({ "name": name })),
        "Failed to create category.",
      )
      .await
  }

  // ── Tickets ───────────────────────────────────────────────────────────────

  /// `GET /api/tickets?...`
  pub async fn list_tickets(&self, query: &TicketQuery) -> Result<Vec<TicketSummary>, ClientError> {
    let list: Tickets = self
      .send(
        self.client.get(self.url("/tickets")).query(&query.pairs()),
        "Failed to load tickets.",
      )
      .await?;
    Ok(list.tickets)
  }

  /// `GET /api/tickets/:id`
  pub async fn get_ticket(&self, id: TicketId) -> Result<TicketDetail, ClientError> {
    self
      .send(self.client.get(self.url(&format!("/tickets/{id}"))), "Failed to load ticket.")
      .await
  }

  /// `POST /api/tickets` as multipart, reading the attachment from disk.
  pub async fn create_ticket(&self, form: &TicketForm) -> Result<Ticket, ClientError> {
    let mut body = multipart::Form::new()
      .text("subject", form.subject.clone())
      .text("description", form.description.clone())
      .text("category_id", form.category_id.to_string());

    if let Some(path) = &form.attachment {
      let bytes = tokio::fs::read(path).await?;
      let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_owned());
      body = body.part("attachment", multipart::Part::bytes(bytes).file_name(file_name));
    }

    self
      .send(
        self.client.post(self.url("/tickets")).multipart(body),
        "Failed to create ticket.",
      )
      .await
  }

  /// `PATCH /api/tickets/:id/status`
  pub async fn update_status(&self, id: TicketId, status: TicketStatus) -> Result<Ticket, ClientError> {
    self
      .send(
        self
          .client
          .patch(self.url(&format!("/tickets/{id}/status")))
          .json(&json!({ "status": status })),
        "Failed to update status.",
      )
      .await
  }

  /// `PATCH /api/tickets/:id/assignee`; `None` unassigns.
  pub async fn assign(&self, id: TicketId, assignee: Option<UserId>) -> Result<Ticket, ClientError> {
    self
      .send(
        self
          .client
          .patch(self.url(&format!("/tickets/{id}/assignee")))
          .json(&json!({ "assignee_id": assignee })),
        "Failed to assign ticket.",
      )
      .await
  }

  /// `DELETE /api/tickets/:id`
  pub async fn delete_ticket(&self, id: TicketId) -> Result<(), ClientError> {
    self
      .execute(
        self.client.delete(self.url(&format!("/tickets/{id}"))),
        "Failed to delete ticket.",
      )
      .await?;
    Ok(())
  }

  // ── Votes ─────────────────────────────────────────────────────────────────

  /// `POST /api/tickets/:id/vote`
  pub async fn vote(&self, id: TicketId, value: VoteValue) -> Result<VoteOutcome, ClientError> {
    self
      .send(
        self
          .client
          .post(self.url(&format!("/tickets/{id}/vote")))
          .json(&json!({ "value": value })),
        "Failed to vote.",
      )
      .await
  }

  // ── Comments ──────────────────────────────────────────────────────────────

  /// `GET /api/tickets/:id/comments`
  pub async fn comments(&self, id: TicketId) -> Result<Vec<Comment>, ClientError> {
    let list: Comments = self
      .send(
        self.client.get(self.url(&format!("/tickets/{id}/comments"))),
        "Failed to load comments.",
      )
      .await?;
    Ok(list.comments)
  }

  /// `POST /api/tickets/:id/comments`
  pub async fn add_comment(&self, id: TicketId, message: &str) -> Result<Comment, ClientError> {
    self
      .send(
        self
          .client
          .post(self.url(&format!("/tickets/{id}/comments")))
          .json(&json!({ "message": message })),
        "Failed to add comment.",
      )
      .await
  }
}
