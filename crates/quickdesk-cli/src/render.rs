//! Plain-text rendering of API results for the terminal.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use quickdesk_core::{
  category::Category,
  comment::Comment,
  ticket::{TicketDetail, TicketSummary},
  user::User,
  vote::VoteValue,
};

fn when(at: DateTime<Utc>) -> String { at.format("%Y-%m-%d %H:%M").to_string() }

fn vote_marker(my_vote: Option<VoteValue>) -> &'static str {
  match my_vote {
    Some(VoteValue::Up) => "▲",
    Some(VoteValue::Down) => "▼",
    None => " ",
  }
}

pub fn user(user: &User) -> String {
  format!("#{} {} <{}> ({})", user.id, user.name, user.email, user.role)
}

pub fn categories(list: &[Category]) -> String {
  list
    .iter()
    .map(|c| format!("{:>4}  {}\n", c.id, c.name))
    .collect()
}

pub fn ticket_list(list: &[TicketSummary]) -> String {
  if list.is_empty() {
    return "No tickets found.\n".to_owned();
  }
  let mut out = String::new();
  for t in list {
    let _ = writeln!(
      out,
      "{:>5}  {:<11}  {:>+4}{}  {:<10}  {}  ({}, {})",
      t.id,
      t.status.to_string(),
      t.vote_count,
      vote_marker(t.my_vote),
      t.category_name,
      t.subject,
      t.created_by_name,
      when(t.updated_at),
    );
  }
  out
}

pub fn ticket_detail(detail: &TicketDetail) -> String {
  let t = &detail.ticket;
  let mut out = String::new();
  let _ = writeln!(out, "#{} {}", t.id, t.subject);
  let _ = writeln!(out, "Status:     {}", t.status);
  let _ = writeln!(out, "Category:   {}", detail.category_name);
  let _ = writeln!(out, "Opened by:  {} on {}", detail.created_by_name, when(t.created_at));
  let _ = writeln!(
    out,
    "Assigned:   {}",
    detail.assigned_to_name.as_deref().unwrap_or("unassigned")
  );
  let _ = writeln!(out, "Votes:      {:+} {}", t.vote_count, vote_marker(detail.my_vote));
  if let Some(path) = &t.attachment_path {
    let _ = writeln!(out, "Attachment: {path}");
  }
  let _ = writeln!(out, "\n{}", t.description);
  out
}

pub fn comments(list: &[Comment]) -> String {
  if list.is_empty() {
    return "No comments yet.\n".to_owned();
  }
  let mut out = String::new();
  for c in list {
    let _ = writeln!(out, "{} · {}\n  {}", c.user_name, when(c.created_at), c.message);
  }
  out
}
