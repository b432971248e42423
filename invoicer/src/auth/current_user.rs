use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    errors::{Error, Result},
};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{Method, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Extract user from JWT session cookie if present and valid
/// Returns:
/// - None: No session cookie present, or it didn't verify
/// - Some(user): Valid JWT found and verified
#[instrument(skip(parts, config))]
fn try_jwt_session_auth(parts: &Parts, config: &crate::config::Config) -> Option<CurrentUser> {
    let token = session::read_cookie(&parts.headers, &config.auth.session.cookie_name)?;

    match session::verify_session_token(token, config) {
        Ok(user) => Some(user),
        Err(e) => {
            // Expired and tampered tokens are expected, the user just logs in again
            trace!("JWT session authentication failed: {:?}", e);
            None
        }
    }
}

/// Where to send the user back to once they've logged in.
fn login_return_path(parts: &Parts) -> Option<String> {
    (parts.method == Method::GET)
        .then(|| parts.uri.path_and_query().map(|pq| pq.as_str().to_string()))
        .flatten()
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match try_jwt_session_auth(parts, &state.config) {
            Some(user) => {
                debug!("Found JWT session authenticated user: {}", user.id);
                Ok(user)
            }
            None => {
                trace!("No authentication credentials found in request");
                Err(Error::Unauthenticated {
                    message: None,
                    next: login_return_path(parts),
                })
            }
        }
    }
}

/// Public pages take `Option<CurrentUser>` to adapt their navigation.
impl OptionalFromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Option<Self>> {
        Ok(try_jwt_session_auth(parts, &state.config))
    }
}
