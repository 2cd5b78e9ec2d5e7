// Test code patterns:
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Shared types and database plumbing for the BookshelfAI backend.

pub mod db;
pub mod types;

pub use db::{create_pool, run_migrations};
pub use types::{AccountId, ActionType, SubscriptionTier};
