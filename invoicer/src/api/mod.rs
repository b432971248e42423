//! The web layer: page handlers and the models they exchange with templates.
//!
//! - **[`handlers`]**: Axum handlers for every route
//! - **[`models`]**: Form payloads and page models
//!
//! # Routes
//!
//! - **Accounts**: `/signup`, `/login`, `/logout`
//! - **Invoices**: `/dashboard`, `/invoices/new`, `/invoices/{id}` and its `edit`, `delete`,
//!   `status`, `pdf`, `email` and `whatsapp` sub-pages
//! - **Reporting**: `/analytics`
//! - **Public**: `/`, the informational pages, `/static/*` and `/healthz`

pub mod handlers;
pub mod models;
