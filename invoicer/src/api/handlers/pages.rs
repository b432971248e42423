//! Home, settings, the informational pages and the liveness check.

use axum::{extract::State, http::StatusCode, response::Response};
use serde::Serialize;
use tracing::instrument;

use crate::{
    AppState,
    api::models::users::CurrentUser,
    db::handlers::Users,
    errors::Error,
    flash::IncomingFlash,
};

/// Informational pages, each served at `/<name>` from `pages/<name>.html`
pub const INFO_PAGES: &[&str] = &[
    "faq",
    "support",
    "features",
    "about",
    "pricing",
    "terms",
    "privacy",
    "contact",
    "careers",
    "status",
    "changelog",
];

pub async fn healthz() -> &'static str {
    "OK"
}

#[derive(Serialize)]
struct Empty {}

pub async fn home(State(state): State<AppState>, current_user: Option<CurrentUser>, flash: IncomingFlash) -> Result<Response, Error> {
    state
        .templates
        .page(StatusCode::OK, "home.html", current_user.as_ref(), flash, Empty {})
}

#[derive(Serialize)]
struct SettingsPage {
    member_since: Option<String>,
    default_currency: String,
    sender_email: String,
}

#[instrument(skip_all)]
pub async fn settings(State(state): State<AppState>, current_user: CurrentUser, flash: IncomingFlash) -> Result<Response, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn).get_by_id(current_user.id).await?;

    let page = SettingsPage {
        member_since: user.map(|user| user.created_at.format("%-d %B %Y").to_string()),
        default_currency: state.config.default_currency.clone(),
        sender_email: state.config.email.from_email.clone(),
    };
    state.templates.page(StatusCode::OK, "settings.html", Some(&current_user), flash, page)
}

#[derive(Serialize)]
struct InfoPage {
    default_currency: String,
    contact_email: String,
    version: &'static str,
}

/// Render `pages/<name>.html`
pub async fn info_page(name: &'static str, state: AppState, current_user: Option<CurrentUser>, flash: IncomingFlash) -> Result<Response, Error> {
    let page = InfoPage {
        default_currency: state.config.default_currency.clone(),
        contact_email: state.config.email.from_email.clone(),
        version: env!("CARGO_PKG_VERSION"),
    };
    state
        .templates
        .page(StatusCode::OK, &format!("pages/{name}.html"), current_user.as_ref(), flash, page)
}

#[cfg(test)]
mod tests {
    use super::INFO_PAGES;
    use crate::test_utils::{create_test_app, create_test_config, create_test_user, session_cookie_for};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_public_pages_render(pool: PgPool) {
        let server = create_test_app(pool).await;

        let home = server.get("/").await;
        home.assert_status_ok();
        assert!(home.text().contains("Get started"));

        for name in INFO_PAGES {
            server.get(&format!("/{name}")).await.assert_status_ok();
        }

        let changelog = server.get("/changelog").await;
        assert!(changelog.text().contains(env!("CARGO_PKG_VERSION")));

        server.get("/healthz").await.assert_text("OK");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_home_greets_signed_in_user(pool: PgPool) {
        let user = create_test_user(&pool, "alice").await;
        let server = create_test_app(pool).await;

        let home = server.get("/").add_header("cookie", session_cookie_for(&user, &create_test_config())).await;

        home.assert_status_ok();
        assert!(home.text().contains("Welcome back, alice."));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_settings_page(pool: PgPool) {
        let user = create_test_user(&pool, "alice").await;
        let config = create_test_config();
        let cookie = session_cookie_for(&user, &config);
        let server = create_test_app(pool).await;

        let response = server.get("/settings").add_header("cookie", cookie).await;

        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("alice@example.com"));
        assert!(body.contains("Member since"));
        assert!(body.contains(&config.default_currency));
    }
}
