//! [`SqliteStore`], the SQLite implementation of [`HelpdeskStore`].

use std::{
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
  },
  time::Duration,
};

use chrono::Utc;
use quickdesk_core::{
  authz::check_assignee_role,
  category::{self, Category},
  comment::{Comment, NewComment},
  store::HelpdeskStore,
  ticket::{NewTicket, Ticket, TicketDetail, TicketFilter, TicketId, TicketStatus, TicketSummary},
  user::{Credentials, NewUser, Role, User, UserId, normalize_email},
  vote::{VoteOutcome, VoteValue, vote_delta},
};
use rusqlite::{Connection, OptionalExtension as _, Transaction, TransactionBehavior};

use crate::{
  Error, Result,
  encode::{
    RawComment, RawCredentials, RawTicket, RawTicketDetail, RawTicketSummary, RawUser,
    TICKET_COLUMNS, USER_COLUMNS, encode_dt, like_pattern, parse_column,
  },
  schema::SCHEMA,
};

/// What a connection closure returns when the request itself is refused:
/// the domain error travels out of the closure untouched.
type Outcome<T> = std::result::Result<T, quickdesk_core::Error>;

// ─── Commit gate ─────────────────────────────────────────────────────────────

const PENDING: u8 = 0;
const COMMITTING: u8 = 1;
const ABANDONED: u8 = 2;

/// Shared by a waiting caller and its closure on the connection thread.
/// Exactly one of [`CommitGate::begin_commit`] and [`CommitGate::abandon`]
/// succeeds, so an operation reported as timed out never commits.
#[derive(Clone, Default)]
struct CommitGate(Arc<AtomicU8>);

impl CommitGate {
  fn begin_commit(&self) -> bool { self.settle(COMMITTING) }

  fn abandon(&self) -> bool { self.settle(ABANDONED) }

  fn settle(&self, to: u8) -> bool {
    self
      .0
      .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A QuickDesk store backed by a single SQLite file.
///
/// Every operation runs as one closure on the `tokio-rusqlite` connection
/// thread, so operations are serialised and each mutation commits or rolls
/// back as a whole.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  deadline:        Duration,
}

impl SqliteStore {
  /// How long a single operation may take before it fails with
  /// [`Error::Timeout`].
  pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, deadline: Self::DEFAULT_DEADLINE };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, deadline: Self::DEFAULT_DEADLINE };
    store.init_schema().await?;
    Ok(store)
  }

  /// Replace the per-operation deadline.
  pub fn with_deadline(mut self, deadline: Duration) -> Self {
    self.deadline = deadline;
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
  }

  /// Run a read-only `f` on the connection thread, bounded by the store's
  /// deadline.
  async fn call<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&mut Connection) -> tokio_rusqlite::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    self.call_gated(CommitGate::default(), f).await
  }

  /// Run `f` inside one transaction of the given `behavior`, bounded by the
  /// store's deadline.
  ///
  /// If the caller stops waiting before `f` reaches its commit, the
  /// transaction is rolled back and the call fails with [`Error::Timeout`].
  /// Once the commit has begun the caller waits for it instead.
  async fn write<F, R>(&self, behavior: TransactionBehavior, f: F) -> Result<R>
  where
    F: FnOnce(&Transaction<'_>) -> tokio_rusqlite::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    let gate = CommitGate::default();
    let on_thread = gate.clone();

    self
      .call_gated(gate, move |conn| {
        let tx = conn.transaction_with_behavior(behavior)?;
        let out = f(&tx)?;
        if !on_thread.begin_commit() {
          // Dropping `tx` rolls it back.
          return Err(tokio_rusqlite::Error::Other(
            "caller gave up before commit".into(),
          ));
        }
        tx.commit()?;
        Ok(out)
      })
      .await
  }

  async fn call_gated<F, R>(&self, gate: CommitGate, f: F) -> Result<R>
  where
    F: FnOnce(&mut Connection) -> tokio_rusqlite::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    let mut pending = std::pin::pin!(self.conn.call(f));
    match tokio::time::timeout(self.deadline, pending.as_mut()).await {
      Ok(result) => Ok(result?),
      Err(_) if gate.abandon() => {
        tracing::error!(deadline = ?self.deadline, "sqlite operation timed out");
        Err(Error::Timeout(self.deadline))
      }
      // The commit is already under way; report its real outcome.
      Err(_) => Ok(pending.await?),
    }
  }
}

// ─── Connection-thread helpers ───────────────────────────────────────────────

fn query_ticket(conn: &Connection, id: TicketId) -> rusqlite::Result<Option<RawTicket>> {
  conn
    .query_row(
      &format!("SELECT {TICKET_COLUMNS} FROM tickets t WHERE t.ticket_id = ?1"),
      rusqlite::params![id],
      RawTicket::from_row,
    )
    .optional()
}

fn ticket_exists(conn: &Connection, id: TicketId) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM tickets WHERE ticket_id = ?1",
        rusqlite::params![id],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

fn query_user(conn: &Connection, id: UserId) -> rusqlite::Result<Option<RawUser>> {
  conn
    .query_row(
      &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.user_id = ?1"),
      rusqlite::params![id],
      |row| RawUser::from_row(row, 0),
    )
    .optional()
}

fn ticket_not_found(id: TicketId) -> quickdesk_core::Error {
  quickdesk_core::Error::not_found(format!("ticket {id}"))
}

// ─── HelpdeskStore impl ──────────────────────────────────────────────────────

impl HelpdeskStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<User> {
    let created_at = Utc::now();
    let email      = normalize_email(&input.email);
    let at_str     = encode_dt(created_at);
    let role_str   = input.role.as_ref().to_owned();
    let name       = input.name.clone();
    let email_arg  = email.clone();

    let user_id: Outcome<i64> = self
      .write(TransactionBehavior::Immediate, move |tx| {
        let taken = tx
          .query_row(
            "SELECT 1 FROM users WHERE email = ?1",
            rusqlite::params![email_arg],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Ok(Err(quickdesk_core::Error::Conflict(
            "An account with this email already exists.".into(),
          )));
        }
        tx.execute(
          "INSERT INTO users (name, email, password_hash, role, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![name, email_arg, input.password_hash, role_str, at_str],
        )?;
        Ok(Ok(tx.last_insert_rowid()))
      })
      .await?;

    Ok(User {
      id: user_id?,
      name: input.name,
      email,
      role: input.role,
      created_at,
    })
  }

  async fn find_credentials(&self, email: String) -> Result<Option<Credentials>> {
    let email = normalize_email(&email);

    let raw: Option<RawCredentials> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {USER_COLUMNS}, u.password_hash FROM users u WHERE u.email = ?1"
              ),
              rusqlite::params![email],
              |row| {
                Ok(RawCredentials {
                  user:          RawUser::from_row(row, 0)?,
                  password_hash: row.get(5)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCredentials::into_credentials).transpose()
  }

  async fn get_user(&self, id: UserId) -> Result<Option<User>> {
    let raw = self.call(move |conn| Ok(query_user(conn, id)?)).await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn set_role(&self, id: UserId, role: Role) -> Result<User> {
    let role_str = role.as_ref().to_owned();

    let raw: Outcome<RawUser> = self
      .write(TransactionBehavior::Deferred, move |tx| {
        let changed = tx.execute(
          "UPDATE users SET role = ?2 WHERE user_id = ?1",
          rusqlite::params![id, role_str],
        )?;
        let Some(raw) = query_user(tx, id)?.filter(|_| changed > 0) else {
          return Ok(Err(quickdesk_core::Error::not_found(format!("user {id}"))));
        };
        Ok(Ok(raw))
      })
      .await?;

    let user = raw?.into_user()?;
    tracing::info!(user_id = user.id, role = %user.role, "role changed");
    Ok(user)
  }

  // ── Categories ────────────────────────────────────────────────────────────

  async fn list_categories(&self) -> Result<Vec<Category>> {
    self
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT category_id, name FROM categories
           ORDER BY name COLLATE NOCASE, category_id",
        )?;
        let rows = stmt
          .query_map([], |row| Ok(Category { id: row.get(0)?, name: row.get(1)? }))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn create_category(&self, name: String) -> Result<Category> {
    let name = category::validate_name(&name)?;

    let created: Outcome<Category> = self
      .write(TransactionBehavior::Immediate, move |tx| {
        let taken = tx
          .query_row(
            "SELECT 1 FROM categories WHERE name = ?1",
            rusqlite::params![name],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Ok(Err(quickdesk_core::Error::Conflict(format!(
            "Category {name:?} already exists."
          ))));
        }
        tx.execute("INSERT INTO categories (name) VALUES (?1)", rusqlite::params![name])?;
        Ok(Ok(Category { id: tx.last_insert_rowid(), name }))
      })
      .await?;

    Ok(created?)
  }

  async fn ensure_category(&self, name: String) -> Result<Category> {
    let name = category::validate_name(&name)?;

    self
      .write(TransactionBehavior::Immediate, move |tx| {
        tx.execute(
          "INSERT OR IGNORE INTO categories (name) VALUES (?1)",
          rusqlite::params![name],
        )?;
        Ok(tx.query_row(
          "SELECT category_id, name FROM categories WHERE name = ?1",
          rusqlite::params![name],
          |row| Ok(Category { id: row.get(0)?, name: row.get(1)? }),
        )?)
      })
      .await
  }

  // ── Tickets ───────────────────────────────────────────────────────────────

  async fn create_ticket(&self, input: NewTicket) -> Result<Ticket> {
    let input = input.validate()?;
    let now   = Utc::now();

    let ticket = Ticket {
      id:              0,
      subject:         input.subject,
      description:     input.description,
      category_id:     input.category_id,
      created_by:      input.created_by,
      assigned_to:     None,
      status:          TicketStatus::Open,
      attachment_path: input.attachment_path,
      vote_count:      0,
      created_at:      now,
      updated_at:      now,
    };

    let subject     = ticket.subject.clone();
    let description = ticket.description.clone();
    let category_id = ticket.category_id;
    let created_by  = ticket.created_by;
    let attachment  = ticket.attachment_path.clone();
    let at_str      = encode_dt(now);
    let status_str  = TicketStatus::Open.to_string();

    let id: Outcome<TicketId> = self
      .write(TransactionBehavior::Deferred, move |tx| {
        let category_known = tx
          .query_row(
            "SELECT 1 FROM categories WHERE category_id = ?1",
            rusqlite::params![category_id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !category_known {
          return Ok(Err(quickdesk_core::Error::validation(format!(
            "unknown category {category_id}"
          ))));
        }
        tx.execute(
          "INSERT INTO tickets (
             subject, description, category_id, created_by, assigned_to,
             status, attachment_path, vote_count, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, 0, ?7, ?7)",
          rusqlite::params![
            subject,
            description,
            category_id,
            created_by,
            status_str,
            attachment,
            at_str,
          ],
        )?;
        Ok(Ok(tx.last_insert_rowid()))
      })
      .await?;

    let ticket = Ticket { id: id?, ..ticket };
    tracing::info!(ticket_id = ticket.id, created_by, "ticket created");
    Ok(ticket)
  }

  async fn list_tickets(&self, filter: TicketFilter, viewer: UserId) -> Result<Vec<TicketSummary>> {
    let status_str   = filter.status.map(|s| s.as_ref().to_owned());
    let pattern      = filter.search_text().map(like_pattern);
    let category_id  = filter.category_id;
    let created_by   = filter.created_by;
    let limit_val    = filter.effective_limit() as i64;
    let offset_val   = filter.offset.unwrap_or(0) as i64;

    let raws: Vec<RawTicketSummary> = self
      .call(move |conn| {
        // Every filter is bound on every call; a NULL parameter disables it.
        let mut stmt = conn.prepare(
          r"SELECT
              t.ticket_id, t.subject, t.status, t.category_id, c.name,
              t.created_by, u.name, t.assigned_to, t.vote_count, v.value,
              t.created_at, t.updated_at
            FROM tickets t
            JOIN categories c ON c.category_id = t.category_id
            JOIN users      u ON u.user_id     = t.created_by
            LEFT JOIN votes v ON v.ticket_id   = t.ticket_id AND v.user_id = ?1
            WHERE (?2 IS NULL OR t.status = ?2)
              AND (?3 IS NULL
                   OR t.subject     LIKE ?3 ESCAPE '\'
                   OR t.description LIKE ?3 ESCAPE '\')
              AND (?4 IS NULL OR t.category_id = ?4)
              AND (?5 IS NULL OR t.created_by  = ?5)
            ORDER BY t.updated_at DESC, t.ticket_id DESC
            LIMIT ?6 OFFSET ?7",
        )?;

        let rows = stmt
          .query_map(
            rusqlite::params![
              viewer,
              status_str,
              pattern,
              category_id,
              created_by,
              limit_val,
              offset_val,
            ],
            RawTicketSummary::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTicketSummary::into_summary).collect()
  }

  async fn get_ticket(&self, id: TicketId, viewer: UserId) -> Result<Option<TicketDetail>> {
    let raw: Option<RawTicketDetail> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {TICKET_COLUMNS}, c.name, u.name, a.name, v.value
                 FROM tickets t
                 JOIN categories c ON c.category_id = t.category_id
                 JOIN users      u ON u.user_id     = t.created_by
                 LEFT JOIN users a ON a.user_id     = t.assigned_to
                 LEFT JOIN votes v ON v.ticket_id   = t.ticket_id AND v.user_id = ?2
                 WHERE t.ticket_id = ?1"
              ),
              rusqlite::params![id, viewer],
              RawTicketDetail::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTicketDetail::into_detail).transpose()
  }

  async fn update_status(
    &self,
    id:    TicketId,
    to:    TicketStatus,
    claim: Option<UserId>,
  ) -> Result<Ticket> {
    let at_str = encode_dt(Utc::now());
    let to_str = to.to_string();

    let raw: Outcome<RawTicket> = self
      .write(TransactionBehavior::Immediate, move |tx| {
        let current: Option<String> = tx
          .query_row(
            "SELECT status FROM tickets WHERE ticket_id = ?1",
            rusqlite::params![id],
            |row| row.get(0),
          )
          .optional()?;
        let Some(current) = current else {
          return Ok(Err(ticket_not_found(id)));
        };
        let from: TicketStatus = parse_column(0, &current)?;
        if let Err(e) = from.check_transition(to) {
          return Ok(Err(e));
        }

        // Compare-and-set on the status we just validated against.
        let changed = tx.execute(
          "UPDATE tickets
           SET status = ?2, assigned_to = COALESCE(assigned_to, ?3), updated_at = ?4
           WHERE ticket_id = ?1 AND status = ?5",
          rusqlite::params![id, to_str, claim, at_str, current],
        )?;
        if changed == 0 {
          return Ok(Err(quickdesk_core::Error::InvalidTransition { from, to }));
        }

        let raw = query_ticket(tx, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        Ok(Ok(raw))
      })
      .await?;

    let ticket = raw?.into_ticket()?;
    tracing::info!(ticket_id = id, status = %to, "ticket status changed");
    Ok(ticket)
  }

  async fn assign_ticket(&self, id: TicketId, assignee: Option<UserId>) -> Result<Ticket> {
    let at_str = encode_dt(Utc::now());

    let raw: Outcome<RawTicket> = self
      .write(TransactionBehavior::Immediate, move |tx| {
        if !ticket_exists(tx, id)? {
          return Ok(Err(ticket_not_found(id)));
        }
        if let Some(user_id) = assignee {
          let role: Option<String> = tx
            .query_row(
              "SELECT role FROM users WHERE user_id = ?1",
              rusqlite::params![user_id],
              |row| row.get(0),
            )
            .optional()?;
          let Some(role) = role else {
            return Ok(Err(quickdesk_core::Error::validation(format!(
              "unknown user {user_id}"
            ))));
          };
          if let Err(e) = check_assignee_role(parse_column(0, &role)?) {
            return Ok(Err(e));
          }
        }
        tx.execute(
          "UPDATE tickets SET assigned_to = ?2, updated_at = ?3 WHERE ticket_id = ?1",
          rusqlite::params![id, assignee, at_str],
        )?;
        let raw = query_ticket(tx, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        Ok(Ok(raw))
      })
      .await?;

    let ticket = raw?.into_ticket()?;
    tracing::info!(ticket_id = id, assignee = ?assignee, "ticket assigned");
    Ok(ticket)
  }

  async fn delete_ticket(&self, id: TicketId) -> Result<Option<Ticket>> {
    let raw: Option<RawTicket> = self
      .write(TransactionBehavior::Deferred, move |tx| {
        let Some(raw) = query_ticket(tx, id)? else {
          return Ok(None);
        };
        // Votes and comments go with it via ON DELETE CASCADE.
        tx.execute("DELETE FROM tickets WHERE ticket_id = ?1", rusqlite::params![id])?;
        Ok(Some(raw))
      })
      .await?;

    let ticket = raw.map(RawTicket::into_ticket).transpose()?;
    if ticket.is_some() {
      tracing::info!(ticket_id = id, "ticket deleted");
    }
    Ok(ticket)
  }

  // ── Votes ─────────────────────────────────────────────────────────────────

  async fn cast_vote(
    &self,
    ticket_id: TicketId,
    user_id:   UserId,
    value:     VoteValue,
  ) -> Result<VoteOutcome> {
    let at_str = encode_dt(Utc::now());
    let new    = value.as_i64();

    // IMMEDIATE takes the write lock up front, so the read of the previous
    // vote and the adjustment below cannot interleave with another writer.
    let vote_count: Outcome<i64> = self
      .write(TransactionBehavior::Immediate, move |tx| {
        if !ticket_exists(tx, ticket_id)? {
          return Ok(Err(ticket_not_found(ticket_id)));
        }

        let previous: Option<i64> = tx
          .query_row(
            "SELECT value FROM votes WHERE ticket_id = ?1 AND user_id = ?2",
            rusqlite::params![ticket_id, user_id],
            |row| row.get(0),
          )
          .optional()?;
        let previous = previous
          .map(|v| {
            VoteValue::try_from(v).map_err(|e| {
              rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Integer,
                Box::new(e),
              )
            })
          })
          .transpose()?;

        let delta = vote_delta(previous, value);
        if delta != 0 {
          tx.execute(
            "INSERT INTO votes (ticket_id, user_id, value, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (ticket_id, user_id)
             DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![ticket_id, user_id, new, at_str],
          )?;
          tx.execute(
            "UPDATE tickets SET vote_count = vote_count + ?2, updated_at = ?3
             WHERE ticket_id = ?1",
            rusqlite::params![ticket_id, delta, at_str],
          )?;
        }

        let count: i64 = tx.query_row(
          "SELECT vote_count FROM tickets WHERE ticket_id = ?1",
          rusqlite::params![ticket_id],
          |row| row.get(0),
        )?;
        Ok(Ok(count))
      })
      .await?;

    Ok(VoteOutcome { vote_count: vote_count?, my_vote: value })
  }

  // ── Comments ──────────────────────────────────────────────────────────────

  async fn add_comment(&self, input: NewComment) -> Result<Comment> {
    let input      = input.validate()?;
    let created_at = Utc::now();
    let at_str     = encode_dt(created_at);
    let ticket_id  = input.ticket_id;
    let author_id  = input.author_id;
    let message    = input.message.clone();

    let inserted: Outcome<(i64, String)> = self
      .write(TransactionBehavior::Immediate, move |tx| {
        if !ticket_exists(tx, ticket_id)? {
          return Ok(Err(ticket_not_found(ticket_id)));
        }
        tx.execute(
          "INSERT INTO comments (ticket_id, author_id, message, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![ticket_id, author_id, message, at_str],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
          "UPDATE tickets SET updated_at = ?2 WHERE ticket_id = ?1",
          rusqlite::params![ticket_id, at_str],
        )?;
        let author: String = tx.query_row(
          "SELECT name FROM users WHERE user_id = ?1",
          rusqlite::params![author_id],
          |row| row.get(0),
        )?;
        Ok(Ok((id, author)))
      })
      .await?;

    let (id, user_name) = inserted?;
    Ok(Comment {
      id,
      ticket_id,
      user_id: author_id,
      user_name,
      message: input.message,
      created_at,
    })
  }

  async fn list_comments(&self, ticket_id: TicketId) -> Result<Vec<Comment>> {
    let raws: Outcome<Vec<RawComment>> = self
      .call(move |conn| {
        if !ticket_exists(conn, ticket_id)? {
          return Ok(Err(ticket_not_found(ticket_id)));
        }
        let mut stmt = conn.prepare(
          "SELECT cm.comment_id, cm.ticket_id, cm.author_id, u.name, cm.message, cm.created_at
           FROM comments cm
           JOIN users u ON u.user_id = cm.author_id
           WHERE cm.ticket_id = ?1
           ORDER BY cm.comment_id ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![ticket_id], RawComment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Ok(rows))
      })
      .await?;

    raws?.into_iter().map(RawComment::into_comment).collect()
  }
}
