//! Axum handlers for every page.
//!
//! Each handler extracts what it needs (state, the signed-in user, flash messages, a form), calls
//! the repositories in [`crate::db::handlers`], and either renders a template or redirects.
//!
//! # Handler Modules
//!
//! - [`auth`]: Signup, login and logout
//! - [`dashboard`]: Invoice list with headline figures
//! - [`invoices`]: Create, view, edit, delete and paid/unpaid status
//! - [`documents`]: PDF download, emailing and WhatsApp sharing
//! - [`analytics`]: Aggregate figures and top clients
//! - [`pages`]: Home, settings, informational pages and the health check
//! - [`static_assets`]: Embedded CSS, JavaScript and images
//!
//! # Authentication
//!
//! Handlers that take a [`CurrentUser`](crate::api::models::users::CurrentUser) are only reached
//! with a valid session; anonymous requests are redirected to `/login`. Public pages take
//! `Option<CurrentUser>` to adjust their navigation.
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`]. Form problems are not errors: the form is rendered
//! again with status 422.

pub mod analytics;
pub mod auth;
pub mod dashboard;
pub mod documents;
pub mod invoices;
pub mod pages;
pub mod static_assets;
