//! Handlers for `/categories` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/categories` | Ordered by name |
//! | `POST` | `/categories` | Admin only. Body: `{"name":"Hardware"}` |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use quickdesk_core::{
  attachment::AttachmentStorage,
  authz,
  category::Category,
  store::HelpdeskStore,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, auth::Authenticated, error::ApiError, extract::ApiJson};

#[derive(Debug, Serialize)]
pub struct CategoryList {
  pub categories: Vec<Category>,
}

/// `GET /categories`
pub async fn list<S, A>(
  Authenticated(_): Authenticated,
  State(state): State<AppState<S, A>>,
) -> Result<Json<CategoryList>, ApiError>
where
  S: HelpdeskStore + 'static,
  A: AttachmentStorage + 'static,
{
  let categories = state.store.list_categories().await.map_err(ApiError::store)?;
  Ok(Json(CategoryList { categories }))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name: String,
}

/// `POST /categories`
pub async fn create<S, A>(
  Authenticated(actor): Authenticated,
  State(state): State<AppState<S, A>>,
  ApiJson(body): ApiJson<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: HelpdeskStore + 'static,
  A: AttachmentStorage + 'static,
{
  authz::require_admin(&actor, "create categories")?;
  let category = state
    .store
    .create_category(body.name)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(category_id = category.id, name = %category.name, "category created");
  Ok((StatusCode::CREATED, Json(category)))
}
