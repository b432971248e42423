//! Form payloads and page models.
//!
//! Forms are deserialized from `application/x-www-form-urlencoded` bodies and validate
//! themselves into database requests; page models are what templates render. Both are kept
//! separate from the database models in [`crate::db::models`].
//!
//! - [`users`]: The signed-in user, signup and login forms
//! - [`invoices`]: Invoice form, status and email forms, invoice page models
//! - [`analytics`]: Dashboard and analytics figures
//! - [`forms`]: Validation errors shared by every form

pub mod analytics;
pub mod forms;
pub mod invoices;
pub mod users;
