//! Authentication for the invoicing pages.
//!
//! Users sign up and log in with a username and password. A successful login issues a signed
//! JWT stored in an HTTP-only session cookie; every protected handler takes a [`CurrentUser`]
//! argument, which is extracted from that cookie.
//!
//! # Modules
//!
//! - [`current_user`]: Extractors for getting the authenticated user in handlers
//! - [`password`]: Password hashing and verification using Argon2
//! - [`session`]: Session token creation, verification and cookies
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use invoicer::api::models::users::CurrentUser;
//!
//! async fn protected_handler(current_user: CurrentUser) -> String {
//!     format!("Hello, {}!", current_user.username)
//! }
//!
//! // Public pages render differently for signed-in users
//! async fn public_handler(current_user: Option<CurrentUser>) -> String {
//!     match current_user {
//!         Some(user) => format!("Welcome back, {}", user.username),
//!         None => "Welcome".to_string(),
//!     }
//! }
//! ```
//!
//! Requests to protected pages without a valid session are redirected to `/login`, carrying the
//! original path in `next` so the user lands back where they started.
//!
//! [`CurrentUser`]: crate::api::models::users::CurrentUser

pub mod current_user;
pub mod password;
pub mod session;
