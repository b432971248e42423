//! Database record structures.
//!
//! Request types (`*CreateDBRequest`, `*UpdateDBRequest`) carry validated input into a
//! repository; response types (`*DBResponse`) are what comes back out. Page handlers convert
//! responses into the models in [`crate::api::models`] before rendering.

pub mod invoices;
pub mod users;
