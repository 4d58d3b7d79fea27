//! HTTP server assembly for QuickDesk.
//!
//! Wraps the [`quickdesk_api`] router with everything a deployed instance
//! needs around it: configuration, the `/uploads` file service, the JSON 404
//! fallback, body limits, CORS, request tracing, and the development-mode
//! error detail layer.

pub mod uploads;

use std::{any::Any, path::PathBuf};

use anyhow::Context as _;
use axum::{
  Router,
  extract::DefaultBodyLimit,
  middleware,
  response::{IntoResponse, Response},
  routing::get,
};
use quickdesk_api::{ApiError, AppState, api_router, endpoint_not_found, reveal_error_detail};
use quickdesk_core::{
  attachment::AttachmentStorage,
  store::HelpdeskStore,
  user::{Role, User},
};
use serde::Deserialize;
use tower_http::{
  catch_panic::CatchPanicLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

pub use uploads::{DiskAttachments, UPLOADS_PREFIX};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Whether internal error detail may be shown to clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
  #[default]
  Production,
  Development,
}

/// Runtime server configuration, deserialised from `config.toml` and
/// `QUICKDESK_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  #[serde(default = "default_store_path")]
  pub store_path:         PathBuf,
  #[serde(default = "default_uploads_dir")]
  pub uploads_dir:        PathBuf,
  /// HMAC key for bearer tokens. Required.
  pub token_secret:       String,
  #[serde(default = "default_token_ttl_hours")]
  pub token_ttl_hours:    i64,
  #[serde(default = "default_storage_timeout_ms")]
  pub storage_timeout_ms: u64,
  #[serde(default = "default_max_upload_bytes")]
  pub max_upload_bytes:   usize,
  #[serde(default)]
  pub environment:        Environment,
  /// Allow any origin. Meant for local frontends served from elsewhere.
  #[serde(default)]
  pub cors_permissive:    bool,
  /// Categories created at startup if missing.
  #[serde(default = "default_seed_categories")]
  pub seed_categories:    Vec<String>,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 3000 }
fn default_store_path() -> PathBuf { PathBuf::from("quickdesk.db") }
fn default_uploads_dir() -> PathBuf { PathBuf::from("uploads") }
fn default_token_ttl_hours() -> i64 { quickdesk_api::TokenKeys::DEFAULT_TTL_HOURS }
fn default_storage_timeout_ms() -> u64 { 5_000 }
fn default_max_upload_bytes() -> usize { 10 * 1024 * 1024 }

fn default_seed_categories() -> Vec<String> {
  ["General", "Hardware", "Software", "Network", "Account"]
    .map(String::from)
    .to_vec()
}

// ─── Router ──────────────────────────────────────────────────────────────────

async fn root() -> &'static str { "QuickDesk API is running!" }

/// Turn a handler panic into the generic 500 body.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
  let detail = panic
    .downcast_ref::<&str>()
    .map(|s| s.to_string())
    .or_else(|| panic.downcast_ref::<String>().cloned())
    .unwrap_or_else(|| "unknown panic".to_owned());
  ApiError::Internal(format!("request handler panicked: {detail}")).into_response()
}

/// Build the complete application router.
pub fn app<S, A>(state: AppState<S, A>, config: &ServerConfig) -> Router
where
  S: HelpdeskStore + 'static,
  A: AttachmentStorage + 'static,
{
  let router = Router::new()
    .route("/", get(root))
    .nest("/api", api_router(state))
    .nest_service(UPLOADS_PREFIX, ServeDir::new(&config.uploads_dir));
  with_layers(router, config)
}

/// Fallbacks and middleware wrapped around every route in `router`.
fn with_layers(router: Router, config: &ServerConfig) -> Router {
  let mut router = router
    .fallback(endpoint_not_found)
    .method_not_allowed_fallback(endpoint_not_found)
    .layer(CatchPanicLayer::custom(panic_response))
    .layer(DefaultBodyLimit::max(config.max_upload_bytes));

  if config.environment == Environment::Development {
    router = router.layer(middleware::from_fn(reveal_error_detail));
  }
  if config.cors_permissive {
    router = router.layer(CorsLayer::permissive());
  }
  router.layer(TraceLayer::new_for_http())
}

// ─── Bootstrap ───────────────────────────────────────────────────────────────

/// Create each configured category that does not exist yet.
pub async fn seed_categories<S: HelpdeskStore>(store: &S, names: &[String]) -> anyhow::Result<()> {
  for name in names.iter().filter(|n| !n.trim().is_empty()) {
    store
      .ensure_category(name.clone())
      .await
      .with_context(|| format!("failed to seed category {name:?}"))?;
  }
  Ok(())
}

/// Grant the admin role to the account registered under `email`.
pub async fn promote_admin<S: HelpdeskStore>(store: &S, email: &str) -> anyhow::Result<User> {
  let credentials = store
    .find_credentials(email.to_owned())
    .await
    .context("failed to look up user")?
    .with_context(|| format!("no account registered for {email}"))?;
  let user = store
    .set_role(credentials.user.id, Role::Admin)
    .await
    .context("failed to update role")?;
  Ok(user)
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, Response, StatusCode, header},
  };
  use chrono::Duration;
  use quickdesk_api::TokenKeys;
  use quickdesk_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  const BOUNDARY: &str = "quickdesk-test-boundary";

  struct Harness {
    app:   Router,
    state: AppState<SqliteStore, DiskAttachments>,
    _dir:  tempfile::TempDir,
  }

  fn config(uploads_dir: &std::path::Path, environment: &str) -> ServerConfig {
    serde_json::from_value(json!({
      "token_secret": "integration secret",
      "uploads_dir":  uploads_dir,
      "environment":  environment,
    }))
    .unwrap()
  }

  async fn harness_with(environment: &str, attachments_root: Option<PathBuf>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir.path().join("uploads"), environment);
    let store = SqliteStore::open_in_memory().await.unwrap();
    seed_categories(&store, &config.seed_categories).await.unwrap();

    let attachments = DiskAttachments::new(attachments_root.unwrap_or(config.uploads_dir.clone()));
    let tokens = TokenKeys::new(&config.token_secret, Duration::hours(config.token_ttl_hours)).unwrap();
    let state = AppState::new(store, attachments, tokens);

    Harness { app: app(state.clone(), &config), state, _dir: dir }
  }

  async fn harness() -> Harness { harness_with("production", None).await }

  async fn send(h: &Harness, req: Request<Body>) -> Response<Body> {
    h.app.clone().oneshot(req).await.unwrap()
  }

  async fn body_json(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn json_req(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
      builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
  }

  fn get_req(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
      .uri(uri)
      .header(header::AUTHORIZATION, format!("Bearer {token}"))
      .body(Body::empty())
      .unwrap()
  }

  fn multipart_req(token: &str, fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
      body.extend_from_slice(
        format!(
          "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
        .as_bytes(),
      );
    }
    if let Some((file_name, bytes)) = file {
      body.extend_from_slice(
        format!(
          "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"attachment\"; \
           filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
      );
      body.extend_from_slice(bytes);
      body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
      .method("POST")
      .uri("/api/tickets")
      .header(header::AUTHORIZATION, format!("Bearer {token}"))
      .header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
      )
      .body(Body::from(body))
      .unwrap()
  }

  /// Register `name`, give them `role`, and log in. Returns (user id, token).
  async fn sign_in(h: &Harness, name: &str, role: Role) -> (i64, String) {
    let email = format!("{}@example.com", name.to_lowercase());
    let resp = send(
      h,
      json_req(
        "POST",
        "/api/auth/register",
        None,
        json!({ "name": name, "email": email, "password": "secret1" }),
      ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id = body_json(resp).await["user"]["id"].as_i64().unwrap();

    if role != Role::Requester {
      h.state.store.set_role(id, role).await.unwrap();
    }

    let resp = send(
      h,
      json_req("POST", "/api/auth/login", None, json!({ "email": email, "password": "secret1" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let token = body_json(resp).await["token"].as_str().unwrap().to_owned();
    (id, token)
  }

  async fn general_category(h: &Harness, token: &str) -> i64 {
    let cats = body_json(send(h, get_req("/api/categories", token)).await).await;
    cats["categories"]
      .as_array()
      .unwrap()
      .iter()
      .find(|c| c["name"] == "General")
      .and_then(|c| c["id"].as_i64())
      .unwrap()
  }

  async fn create_ticket(h: &Harness, token: &str, subject: &str) -> i64 {
    let category = general_category(h, token).await.to_string();
    let resp = send(
      h,
      multipart_req(
        token,
        &[("subject", subject), ("description", "details"), ("category_id", &category)],
        None,
      ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await["id"].as_i64().unwrap()
  }

  // ── Plumbing ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn root_reports_liveness() {
    let h = harness().await;
    let resp = send(&h, Request::builder().uri("/").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"QuickDesk API is running!");
  }

  #[tokio::test]
  async fn unknown_routes_get_json_404() {
    let h = harness().await;
    for uri in ["/nope", "/api/nope"] {
      let resp = send(&h, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;
      assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
      assert_eq!(body_json(resp).await, json!({ "message": "Endpoint not found" }));
    }
  }

  #[tokio::test]
  async fn malformed_json_is_a_400_with_message() {
    let h = harness().await;
    let req = Request::builder()
      .method("POST")
      .uri("/api/auth/login")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from("{not json"))
      .unwrap();
    let resp = send(&h, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(resp).await["message"].is_string());
  }

  // ── Accounts ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn duplicate_registration_conflicts() {
    let h = harness().await;
    sign_in(&h, "Ada", Role::Requester).await;

    let resp = send(
      &h,
      json_req(
        "POST",
        "/api/auth/register",
        None,
        json!({ "name": "Ada", "email": "ADA@example.com", "password": "secret1" }),
      ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(
      body_json(resp).await["message"],
      "An account with this email already exists."
    );
  }

  #[tokio::test]
  async fn wrong_password_is_unauthorized() {
    let h = harness().await;
    sign_in(&h, "Ada", Role::Requester).await;
    let resp = send(
      &h,
      json_req(
        "POST",
        "/api/auth/login",
        None,
        json!({ "email": "ada@example.com", "password": "wrong-one" }),
      ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["message"], "Invalid email or password.");
  }

  #[tokio::test]
  async fn me_returns_the_callers_account() {
    let h = harness().await;
    let (id, token) = sign_in(&h, "Ada", Role::Agent).await;
    let me = body_json(send(&h, get_req("/api/users/me", &token)).await).await;
    assert_eq!(me["id"], id);
    assert_eq!(me["role"], "agent");
    assert!(me.get("password_hash").is_none());
  }

  #[tokio::test]
  async fn only_admins_change_roles() {
    let h = harness().await;
    let (ada, ada_token) = sign_in(&h, "Ada", Role::Requester).await;
    let (_, admin_token) = sign_in(&h, "Root", Role::Admin).await;

    let uri = format!("/api/users/{ada}/role");
    let resp = send(&h, json_req("PATCH", &uri, Some(&ada_token), json!({ "role": "admin" }))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = send(&h, json_req("PATCH", &uri, Some(&admin_token), json!({ "role": "agent" }))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["role"], "agent");
  }

  // ── Tickets ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn ticket_with_attachment_is_served_back() {
    let h = harness().await;
    let (_, token) = sign_in(&h, "Ada", Role::Requester).await;
    let category = general_category(&h, &token).await.to_string();

    let resp = send(
      &h,
      multipart_req(
        &token,
        &[
          ("subject", "Cannot login to portal"),
          ("description", "Password rejected"),
          ("category_id", &category),
        ],
        Some(("error shot.png", b"PNGDATA")),
      ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let ticket = body_json(resp).await;
    assert_eq!(ticket["status"], "open");
    assert_eq!(ticket["vote_count"], 0);
    let path = ticket["attachment_path"].as_str().unwrap().to_owned();
    assert!(path.starts_with("/uploads/") && path.ends_with("error_shot.png"), "{path}");

    let resp = send(&h, Request::builder().uri(&path).body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"PNGDATA");
  }

  #[tokio::test]
  async fn missing_fields_are_rejected() {
    let h = harness().await;
    let (_, token) = sign_in(&h, "Ada", Role::Requester).await;
    let resp = send(&h, multipart_req(&token, &[("subject", "Only a subject")], None)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
      body_json(resp).await["message"],
      "All fields except attachment are required."
    );
  }

  #[tokio::test]
  async fn unknown_category_discards_the_attachment() {
    let h = harness().await;
    let (_, token) = sign_in(&h, "Ada", Role::Requester).await;
    let resp = send(
      &h,
      multipart_req(
        &token,
        &[("subject", "S"), ("description", "D"), ("category_id", "999")],
        Some(("orphan.txt", b"bytes")),
      ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let root = h.state.attachments.root().to_path_buf();
    let mut entries = tokio::fs::read_dir(&root).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none());
  }

  #[tokio::test]
  async fn list_filters_by_status_and_search() {
    let h = harness().await;
    let (_, token) = sign_in(&h, "Ada", Role::Requester).await;
    let (_, agent) = sign_in(&h, "Bob", Role::Agent).await;
    let login = create_ticket(&h, &token, "Cannot login to portal").await;
    create_ticket(&h, &token, "Billing question").await;

    for status in ["in_progress", "resolved"] {
      let uri = format!("/api/tickets/{login}/status");
      let resp = send(&h, json_req("PATCH", &uri, Some(&agent), json!({ "status": status }))).await;
      assert_eq!(resp.status(), StatusCode::OK);
    }

    let found = body_json(send(&h, get_req("/api/tickets?search=login&status=", &token)).await).await;
    let subjects: Vec<_> = found["tickets"].as_array().unwrap().iter().map(|t| t["subject"].clone()).collect();
    assert_eq!(subjects, [json!("Cannot login to portal")]);

    let resolved = body_json(send(&h, get_req("/api/tickets?status=resolved", &token)).await).await;
    let resolved = resolved["tickets"].as_array().unwrap();
    assert_eq!(resolved.len(), 1);
    assert!(resolved.iter().all(|t| t["status"] == "resolved"));

    let resp = send(&h, get_req("/api/tickets?status=pending", &token)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn status_rules_are_enforced() {
    let h = harness().await;
    let (_, requester) = sign_in(&h, "Ada", Role::Requester).await;
    let (bob, agent) = sign_in(&h, "Bob", Role::Agent).await;
    let id = create_ticket(&h, &requester, "Printer").await;
    let uri = format!("/api/tickets/{id}/status");

    let resp = send(&h, json_req("PATCH", &uri, Some(&requester), json!({ "status": "in_progress" }))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = send(&h, json_req("PATCH", &uri, Some(&agent), json!({ "status": "resolved" }))).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = send(&h, json_req("PATCH", &uri, Some(&agent), json!({ "status": "in_progress" }))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    // Starting work on an unassigned ticket claims it.
    assert_eq!(body_json(resp).await["assigned_to"], bob);

    let detail = body_json(send(&h, get_req(&format!("/api/tickets/{id}"), &requester)).await).await;
    assert_eq!(detail["assigned_to_name"], "Bob");
    assert_eq!(detail["category_name"], "General");
    assert_eq!(detail["created_by_name"], "Ada");
  }

  #[tokio::test]
  async fn assignment_policy() {
    let h = harness().await;
    let (_, requester) = sign_in(&h, "Ada", Role::Requester).await;
    let (bob, agent) = sign_in(&h, "Bob", Role::Agent).await;
    let (cat, _) = sign_in(&h, "Cat", Role::Agent).await;
    let (_, admin) = sign_in(&h, "Root", Role::Admin).await;
    let id = create_ticket(&h, &requester, "Laptop").await;
    let uri = format!("/api/tickets/{id}/assignee");

    let resp = send(&h, json_req("PATCH", &uri, Some(&agent), json!({ "assignee_id": cat }))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = send(&h, json_req("PATCH", &uri, Some(&agent), json!({ "assignee_id": bob }))).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&h, json_req("PATCH", &uri, Some(&admin), json!({ "assignee_id": cat }))).await;
    assert_eq!(body_json(resp).await["assigned_to"], cat);

    let resp = send(&h, json_req("PATCH", &uri, Some(&admin), json!({ "assignee_id": null }))).await;
    assert_eq!(body_json(resp).await["assigned_to"], Value::Null);
  }

  #[tokio::test]
  async fn voting_round_trip() {
    let h = harness().await;
    let (_, ada) = sign_in(&h, "Ada", Role::Requester).await;
    let (_, bob) = sign_in(&h, "Bob", Role::Requester).await;
    let id = create_ticket(&h, &ada, "Wifi").await;
    let uri = format!("/api/tickets/{id}/vote");

    let resp = send(&h, json_req("POST", &uri, Some(&ada), json!({ "value": 1 }))).await;
    assert_eq!(body_json(resp).await, json!({ "vote_count": 1, "my_vote": 1 }));
    let resp = send(&h, json_req("POST", &uri, Some(&ada), json!({ "value": 1 }))).await;
    assert_eq!(body_json(resp).await["vote_count"], 1);
    let resp = send(&h, json_req("POST", &uri, Some(&bob), json!({ "value": -1 }))).await;
    assert_eq!(body_json(resp).await["vote_count"], 0);

    let resp = send(&h, json_req("POST", &uri, Some(&bob), json!({ "value": 2 }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let list = body_json(send(&h, get_req("/api/tickets", &bob)).await).await;
    assert_eq!(list["tickets"][0]["my_vote"], -1);

    let resp = send(&h, json_req("POST", "/api/tickets/999/vote", Some(&bob), json!({ "value": 1 }))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn comment_thread() {
    let h = harness().await;
    let (_, ada) = sign_in(&h, "Ada", Role::Requester).await;
    let id = create_ticket(&h, &ada, "Email").await;
    let uri = format!("/api/tickets/{id}/comments");

    let resp = send(&h, json_req("POST", &uri, Some(&ada), json!({ "message": "   " }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["message"], "Comment cannot be empty.");

    for message in ["first", "second", "third"] {
      let resp = send(&h, json_req("POST", &uri, Some(&ada), json!({ "message": message }))).await;
      assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let thread = body_json(send(&h, get_req(&uri, &ada)).await).await;
    let messages: Vec<_> = thread["comments"].as_array().unwrap().iter().map(|c| c["message"].clone()).collect();
    assert_eq!(messages, [json!("first"), json!("second"), json!("third")]);
    assert_eq!(thread["comments"][0]["user_name"], "Ada");
  }

  #[tokio::test]
  async fn admin_deletes_ticket() {
    let h = harness().await;
    let (_, ada) = sign_in(&h, "Ada", Role::Requester).await;
    let (_, admin) = sign_in(&h, "Root", Role::Admin).await;
    let id = create_ticket(&h, &ada, "Obsolete").await;
    let uri = format!("/api/tickets/{id}");

    let delete = |token: &str| {
      Request::builder()
        .method("DELETE")
        .uri(&uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
    };

    assert_eq!(send(&h, delete(&ada)).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(send(&h, delete(&admin)).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(send(&h, get_req(&uri, &ada)).await.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn admin_creates_categories() {
    let h = harness().await;
    let (_, ada) = sign_in(&h, "Ada", Role::Requester).await;
    let (_, admin) = sign_in(&h, "Root", Role::Admin).await;

    let resp = send(&h, json_req("POST", "/api/categories", Some(&ada), json!({ "name": "Printers" }))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = send(&h, json_req("POST", "/api/categories", Some(&admin), json!({ "name": "Printers" }))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = send(&h, json_req("POST", "/api/categories", Some(&admin), json!({ "name": "printers" }))).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn unsupported_methods_get_json_404() {
    let h = harness().await;
    let (_, token) = sign_in(&h, "Ada", Role::Requester).await;

    for (method, uri) in [("PUT", "/api/tickets"), ("DELETE", "/api/categories"), ("POST", "/")] {
      let resp = send(&h, json_req(method, uri, Some(&token), json!({}))).await;
      assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{method} {uri}");
      assert_eq!(body_json(resp).await, json!({ "message": "Endpoint not found" }));
    }
  }

  // ── Error detail ──────────────────────────────────────────────────────────

  async fn explode() -> &'static str { panic!("exploded on purpose") }

  async fn panicking_route_response(environment: &str) -> Response<Body> {
    let dir = tempfile::tempdir().unwrap();
    let router = with_layers(
      Router::new().route("/explode", get(explode)),
      &config(dir.path(), environment),
    );
    router
      .oneshot(Request::builder().uri("/explode").body(Body::empty()).unwrap())
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn handler_panic_becomes_generic_500() {
    let resp = panicking_route_response("production").await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(resp).await, json!({ "message": "Server error" }));
  }

  #[tokio::test]
  async fn handler_panic_detail_is_shown_in_development() {
    let resp = panicking_route_response("development").await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(resp).await;
    assert_eq!(body["message"], "Server error");
    assert!(body["error"].as_str().unwrap().contains("exploded on purpose"), "{body}");
  }


  /// Points attachment storage at a regular file so that storing fails.
  async fn broken_upload_response(environment: &str) -> Value {
    let blocker = tempfile::NamedTempFile::new().unwrap();
    let h = harness_with(environment, Some(blocker.path().join("sub"))).await;
    let (_, token) = sign_in(&h, "Ada", Role::Requester).await;
    let category = general_category(&h, &token).await.to_string();

    let resp = send(
      &h,
      multipart_req(
        &token,
        &[("subject", "S"), ("description", "D"), ("category_id", &category)],
        Some(("a.txt", b"a")),
      ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    body_json(resp).await
  }

  #[tokio::test]
  async fn development_mode_reveals_error_detail() {
    let body = broken_upload_response("development").await;
    assert_eq!(body["message"], "Server error");
    assert!(body["error"].as_str().unwrap().contains("storing attachment failed"));
  }

  #[tokio::test]
  async fn production_mode_hides_error_detail() {
    let body = broken_upload_response("production").await;
    assert_eq!(body, json!({ "message": "Server error" }));
  }

  // ── Bootstrap ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn seeding_twice_keeps_one_of_each() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let names = default_seed_categories();
    seed_categories(&store, &names).await.unwrap();
    seed_categories(&store, &names).await.unwrap();
    assert_eq!(store.list_categories().await.unwrap().len(), names.len());
  }

  #[tokio::test]
  async fn promote_admin_requires_an_existing_account() {
    let h = harness().await;
    let (id, _) = sign_in(&h, "Ada", Role::Requester).await;

    let user = promote_admin(h.state.store.as_ref(), "ADA@example.com").await.unwrap();
    assert_eq!(user.id, id);
    assert_eq!(user.role, Role::Admin);

    assert!(promote_admin(h.state.store.as_ref(), "ghost@example.com").await.is_err());
  }

  #[test]
  fn config_defaults_apply() {
    let cfg: ServerConfig = serde_json::from_value(json!({ "token_secret": "s" })).unwrap();
    assert_eq!(cfg.port, 3000);
    assert_eq!(cfg.environment, Environment::Production);
    assert_eq!(cfg.storage_timeout_ms, 5_000);
    assert_eq!(cfg.max_upload_bytes, 10 * 1024 * 1024);
    assert!(!cfg.cors_permissive);
    assert!(cfg.seed_categories.contains(&"General".to_owned()));
  }
}
