//! Core types and trait definitions for the QuickDesk helpdesk.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; the storage and attachment backends plug in
//! through the traits in [`store`] and [`attachment`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod attachment;
pub mod authz;
pub mod category;
pub mod comment;
pub mod error;
pub mod store;
pub mod ticket;
pub mod user;
pub mod vote;

pub use error::{Error, Result};
