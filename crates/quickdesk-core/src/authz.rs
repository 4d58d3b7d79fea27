//! Authorization policy: which actor may perform which privileged action.
//!
//! Every function here is pure. Callers run the check before touching the
//! store, so a refused action never mutates anything.

use crate::{
  Error, Result,
  ticket::{Ticket, TicketStatus},
  user::{Actor, Role, UserId},
};

/// Staff may move any ticket; anyone else only a ticket assigned to them.
pub fn authorize_status_change(actor: &Actor, ticket: &Ticket) -> Result<()> {
  if actor.role.is_staff() || ticket.assigned_to == Some(actor.user_id) {
    Ok(())
  } else {
    Err(Error::forbidden(
      "Only agents, admins, or the assignee may change a ticket's status.",
    ))
  }
}

/// The user who claims the ticket as a side effect of this transition.
///
/// A staff member starting work on an unassigned ticket takes it.
pub fn claimant(actor: &Actor, ticket: &Ticket, to: TicketStatus) -> Option<UserId> {
  let starts_work = ticket.status == TicketStatus::Open && to == TicketStatus::InProgress;
  (starts_work && ticket.assigned_to.is_none() && actor.role.is_staff())
    .then_some(actor.user_id)
}

/// Admins assign anyone (or nobody); agents may only take a ticket
/// themselves.
pub fn authorize_assignment(actor: &Actor, assignee: Option<UserId>) -> Result<()> {
  match actor.role {
    Role::Admin => Ok(()),
    Role::Agent if assignee == Some(actor.user_id) => Ok(()),
    Role::Agent => Err(Error::forbidden("Agents may only assign tickets to themselves.")),
    Role::Requester => Err(Error::forbidden("Requesters cannot assign tickets.")),
  }
}

/// Only an assignee holding a staff role may work a ticket.
pub fn check_assignee_role(role: Role) -> Result<()> {
  if role.is_staff() {
    Ok(())
  } else {
    Err(Error::validation("Tickets can only be assigned to agents or admins."))
  }
}

/// Gate for admin-only actions; `action` completes "Only admins may …".
pub fn require_admin(actor: &Actor, action: &str) -> Result<()> {
  if actor.role == Role::Admin {
    Ok(())
  } else {
    Err(Error::forbidden(format!("Only admins may {action}.")))
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;

  fn actor(user_id: UserId, role: Role) -> Actor { Actor { user_id, role } }

  fn ticket(assigned_to: Option<UserId>, status: TicketStatus) -> Ticket {
    let now = Utc::now();
    Ticket {
      id: 1,
      subject: "VPN drops".into(),
      description: "every hour".into(),
      category_id: 1,
      created_by: 10,
      assigned_to,
      status,
      attachment_path: None,
      vote_count: 0,
      created_at: now,
      updated_at: now,
    }
  }

  #[test]
  fn staff_may_change_any_status() {
    let t = ticket(None, TicketStatus::Open);
    assert!(authorize_status_change(&actor(2, Role::Agent), &t).is_ok());
    assert!(authorize_status_change(&actor(3, Role::Admin), &t).is_ok());
  }

  #[test]
  fn requester_needs_to_be_assignee() {
    let creator = actor(10, Role::Requester);
    let t = ticket(None, TicketStatus::Resolved);
    assert!(matches!(
      authorize_status_change(&creator, &t),
      Err(Error::Forbidden(_))
    ));
    let t = ticket(Some(10), TicketStatus::Resolved);
    assert!(authorize_status_change(&creator, &t).is_ok());
  }

  #[test]
  fn agent_claims_unassigned_ticket_when_starting_work() {
    let agent = actor(2, Role::Agent);
    let open = ticket(None, TicketStatus::Open);
    assert_eq!(claimant(&agent, &open, TicketStatus::InProgress), Some(2));

    let taken = ticket(Some(5), TicketStatus::Open);
    assert_eq!(claimant(&agent, &taken, TicketStatus::InProgress), None);

    let resolved = ticket(None, TicketStatus::Resolved);
    assert_eq!(claimant(&agent, &resolved, TicketStatus::Closed), None);
  }

  #[test]
  fn assignment_rules() {
    assert!(authorize_assignment(&actor(1, Role::Admin), Some(7)).is_ok());
    assert!(authorize_assignment(&actor(1, Role::Admin), None).is_ok());
    assert!(authorize_assignment(&actor(2, Role::Agent), Some(2)).is_ok());
    assert!(authorize_assignment(&actor(2, Role::Agent), Some(3)).is_err());
    assert!(authorize_assignment(&actor(2, Role::Agent), None).is_err());
    assert!(authorize_assignment(&actor(4, Role::Requester), Some(4)).is_err());
  }

  #[test]
  fn admin_gate() {
    assert!(require_admin(&actor(1, Role::Admin), "delete tickets").is_ok());
    assert_eq!(
      require_admin(&actor(1, Role::Agent), "delete tickets"),
      Err(Error::forbidden("Only admins may delete tickets."))
    );
  }
}
