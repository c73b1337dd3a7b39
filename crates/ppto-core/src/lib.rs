//! Core types for the budget-execution tracker.
//!
//! This crate has no HTTP or database dependencies. It owns
//! the domain records, the operation-class taxonomy, the aggregation engine
//! and the [`store::BudgetStore`] trait every backend implements.

pub mod aggregate;
pub mod batch;
pub mod catalog;
pub mod credential;
pub mod error;
pub mod operation;
pub mod store;
pub mod user;

pub use error::{Error, Result};
