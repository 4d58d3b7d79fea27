//! Checks run on user input before anything is sent to the server.
//!
//! The server validates everything again; these only save a round trip and
//! give the same wording a browser user would see.

use std::path::PathBuf;

use quickdesk_core::{category::CategoryId, user::MIN_PASSWORD_LEN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
  pub email:    String,
  pub password: String,
}

impl LoginForm {
  pub fn check(&self) -> Result<(), String> {
    if self.email.trim().is_empty() || self.password.is_empty() {
      return Err("All fields are required.".into());
    }
    check_password_len(&self.password)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterForm {
  pub name:     String,
  pub email:    String,
  pub password: String,
  pub confirm:  String,
}

impl RegisterForm {
  pub fn check(&self) -> Result<(), String> {
    let blank = [&self.name, &self.email, &self.password, &self.confirm]
      .iter()
      .any(|v| v.trim().is_empty());
    if blank {
      return Err("All fields are required.".into());
    }
    check_password_len(&self.password)?;
    if self.password != self.confirm {
      return Err("Passwords do not match.".into());
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketForm {
  pub subject:     String,
  pub description: String,
  pub category_id: CategoryId,
  pub attachment:  Option<PathBuf>,
}

impl TicketForm {
  pub fn check(&self) -> Result<(), String> {
    if self.subject.trim().is_empty() || self.description.trim().is_empty() {
      return Err("All fields except attachment are required.".into());
    }
    Ok(())
  }
}

pub fn check_comment(message: &str) -> Result<(), String> {
  if message.trim().is_empty() {
    return Err("Comment cannot be empty.".into());
  }
  Ok(())
}

fn check_password_len(password: &str) -> Result<(), String> {
  if password.chars().count() < MIN_PASSWORD_LEN {
    return Err(format!("Password must be at least {MIN_PASSWORD_LEN} characters."));
  }
  Ok(())
}
