//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection` (a pooled connection or an open transaction).
//! [`Invoices`] implements the full [`Repository`] trait; [`Users`] only offers the lookups that
//! signup, login and the settings page need.
//!
//! # Available Repositories
//!
//! - [`Users`]: Accounts and login lookups
//! - [`Invoices`]: Invoices with their line items, scoped to an owner where it matters
//! - [`analytics`]: Aggregate queries for the analytics page (free functions over a pool)
//!
//! # Common Pattern
//!
//! ```ignore
//! use invoicer::db::handlers::Users;
//!
//! let mut tx = pool.begin().await?;
//! let mut repo = Users::new(&mut tx);
//! let user = repo.get_user_by_username("alice").await?;
//! tx.commit().await?;
//! ```

pub mod analytics;
pub mod invoices;
pub mod repository;
pub mod users;

pub use invoices::Invoices;
pub use repository::Repository;
pub use users::Users;
