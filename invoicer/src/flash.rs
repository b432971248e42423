//! One-shot messages shown on the next rendered page.
//!
//! A handler that redirects after a POST attaches a [`Flash`] to the redirect. The messages ride
//! in a short-lived cookie; the page that renders next extracts them with [`IncomingFlash`],
//! shows them, and returns the extractor as a response part so the cookie is cleared.

use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, header::SET_COOKIE, request::Parts},
    response::{IntoResponse, IntoResponseParts, Redirect, Response, ResponseParts},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::{debug, warn};

use crate::auth::session::read_cookie;

pub const FLASH_COOKIE_NAME: &str = "invoicer_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: Level,
    pub text: String,
}

impl FlashMessage {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            text: text.into(),
        }
    }
}

fn encode(messages: &[FlashMessage]) -> Option<String> {
    let json = serde_json::to_vec(messages).ok()?;
    Some(URL_SAFE_NO_PAD.encode(json))
}

fn decode(value: &str) -> Option<Vec<FlashMessage>> {
    let json = URL_SAFE_NO_PAD.decode(value).ok()?;
    serde_json::from_slice(&json).ok()
}

fn set_cookie(res: &mut ResponseParts, value: &str, max_age: u32) {
    let cookie = format!("{FLASH_COOKIE_NAME}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    match HeaderValue::from_str(&cookie) {
        Ok(header) => {
            res.headers_mut().append(SET_COOKIE, header);
        }
        Err(e) => warn!("Dropping flash cookie: {e}"),
    }
}

/// Messages to show on the next page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flash(pub Vec<FlashMessage>);

impl From<FlashMessage> for Flash {
    fn from(message: FlashMessage) -> Self {
        Self(vec![message])
    }
}

impl IntoResponseParts for Flash {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if self.0.is_empty() {
            return Ok(res);
        }
        if let Some(value) = encode(&self.0) {
            set_cookie(&mut res, &value, 300);
        }
        Ok(res)
    }
}

/// Redirect (303) to `to`, showing `message` when the next page renders
pub fn redirect(to: &str, message: FlashMessage) -> Response {
    (Flash::from(message), Redirect::to(to)).into_response()
}

/// Messages left for this request by the previous one
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncomingFlash(pub Vec<FlashMessage>);

impl IncomingFlash {
    pub fn messages(&self) -> &[FlashMessage] {
        &self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for IncomingFlash {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let messages = read_cookie(&parts.headers, FLASH_COOKIE_NAME)
            .and_then(|value| {
                let decoded = decode(value);
                if decoded.is_none() {
                    debug!("Ignoring unreadable flash cookie");
                }
                decoded
            })
            .unwrap_or_default();
        Ok(Self(messages))
    }
}

/// Rendering a page consumes the messages, so the cookie is expired
impl IntoResponseParts for IncomingFlash {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if !self.0.is_empty() {
            set_cookie(&mut res, "", 0);
        }
        Ok(res)
    }
}
