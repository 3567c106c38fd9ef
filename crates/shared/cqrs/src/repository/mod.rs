//! Command and query sides of persistence.
//!
//! Commands load and store business models through a [`Mapper`](crate::Mapper) inside a
//! [`TransactionContext`](crate::TransactionContext). Queries read projections straight from a
//! view and never open a transaction.

mod command;
mod query;

pub use command::{CommandRepository, TableCommandRepository};
pub use query::{All, Filter, QueryRepository, ViewQueryRepository, check_page};
