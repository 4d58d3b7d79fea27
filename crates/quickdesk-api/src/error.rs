//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error body is `{"message": …}`. Server-side failures answer with the
//! generic `"Server error"`; their detail rides along in the response
//! extensions as [`ErrorDetail`] and is only written into the body by
//! [`reveal_error_detail`], which the server installs in development mode.

use axum::{
  Json,
  extract::{
    Request,
    multipart::{MultipartError, MultipartRejection},
    rejection::{JsonRejection, PathRejection, QueryRejection},
  },
  http::{StatusCode, header},
  middleware::Next,
  response::{IntoResponse, Response},
};
use quickdesk_core::store::StoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  Validation(String),

  /// Missing, malformed, or expired credentials.
  #[error("{0}")]
  Unauthorized(String),

  #[error("{0}")]
  Forbidden(String),

  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  InvalidTransition(String),

  #[error("{0}")]
  Conflict(String),

  #[error("{0}")]
  PayloadTooLarge(String),

  #[error("storage timed out")]
  StorageTimeout,

  #[error("storage error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("{0}")]
  Internal(String),
}

impl ApiError {
  /// Classify a backend error: domain failures keep their meaning, timeouts
  /// and everything else become server errors.
  pub fn store<E: StoreError>(err: E) -> Self {
    if let Some(domain) = err.domain() {
      return domain.clone().into();
    }
    if err.is_timeout() {
      return Self::StorageTimeout;
    }
    Self::Store(Box::new(err))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Self::Validation(_) => StatusCode::BAD_REQUEST,
      Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      Self::Forbidden(_) => StatusCode::FORBIDDEN,
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::InvalidTransition(_) | Self::Conflict(_) => StatusCode::CONFLICT,
      Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
      Self::StorageTimeout | Self::Store(_) | Self::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }
}

impl From<quickdesk_core::Error> for ApiError {
  fn from(err: quickdesk_core::Error) -> Self {
    use quickdesk_core::Error as E;
    match err {
      E::Validation(m) => Self::Validation(m),
      E::Forbidden(m) => Self::Forbidden(m),
      E::Conflict(m) => Self::Conflict(m),
      e @ E::NotFound(_) => Self::NotFound(capitalize(&e.to_string())),
      e @ E::InvalidTransition { .. } => {
        Self::InvalidTransition(capitalize(&e.to_string()))
      }
    }
  }
}

fn capitalize(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

// ─── Rejections ──────────────────────────────────────────────────────────────

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { Self::Validation(rejection.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self { Self::Validation(rejection.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self { Self::Validation(rejection.body_text()) }
}

impl From<MultipartRejection> for ApiError {
  fn from(rejection: MultipartRejection) -> Self {
    Self::Validation(rejection.body_text())
  }
}

impl From<MultipartError> for ApiError {
  fn from(err: MultipartError) -> Self {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
      Self::PayloadTooLarge("Attachment is too large.".into())
    } else {
      Self::Validation(err.body_text())
    }
  }
}

// ─── Response ────────────────────────────────────────────────────────────────

/// The text of a server-side failure, attached to the response so that a
/// development-mode layer can reveal it.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();

    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
      let mut response =
        (status, Json(json!({ "message": "Server error" }))).into_response();
      response.extensions_mut().insert(ErrorDetail(self.to_string()));
      return response;
    }

    let mut response = (status, Json(json!({ "message": self.to_string() }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, header::HeaderValue::from_static("Bearer"));
    }
    response
  }
}

/// Middleware that adds `"error": <detail>` to server-error bodies. Status,
/// headers and extensions of the inner response are kept.
pub async fn reveal_error_detail(request: Request, next: Next) -> Response {
  let response = next.run(request).await;
  let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
    return response;
  };

  let (mut parts, _) = response.into_parts();
  let body = Json(json!({ "message": "Server error", "error": detail }))
    .into_response()
    .into_body();
  parts.headers.remove(header::CONTENT_LENGTH);
  parts.headers.insert(
    header::CONTENT_TYPE,
    header::HeaderValue::from_static("application/json"),
  );
  Response::from_parts(parts, body)
}
