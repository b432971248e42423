//! HTML rendering with minijinja.
//!
//! Templates live in `templates/` and are compiled into the binary. Every page is rendered with
//! `current_user` (absent for anonymous visitors) and `messages` (flash messages) alongside its
//! own fields.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use minijinja::{Environment, ErrorKind, Value};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

use crate::{
    api::models::users::CurrentUser,
    errors::Error,
    flash::{FlashMessage, IncomingFlash},
    types::format_money,
};

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("home.html", include_str!("../templates/home.html")),
    ("signup.html", include_str!("../templates/signup.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("dashboard.html", include_str!("../templates/dashboard.html")),
    ("analytics.html", include_str!("../templates/analytics.html")),
    ("settings.html", include_str!("../templates/settings.html")),
    ("invoices/form.html", include_str!("../templates/invoices/form.html")),
    ("invoices/detail.html", include_str!("../templates/invoices/detail.html")),
    ("invoices/confirm_delete.html", include_str!("../templates/invoices/confirm_delete.html")),
    ("invoices/email.html", include_str!("../templates/invoices/email.html")),
    ("invoices/whatsapp.html", include_str!("../templates/invoices/whatsapp.html")),
    ("pages/faq.html", include_str!("../templates/pages/faq.html")),
    ("pages/support.html", include_str!("../templates/pages/support.html")),
    ("pages/features.html", include_str!("../templates/pages/features.html")),
    ("pages/about.html", include_str!("../templates/pages/about.html")),
    ("pages/pricing.html", include_str!("../templates/pages/pricing.html")),
    ("pages/terms.html", include_str!("../templates/pages/terms.html")),
    ("pages/privacy.html", include_str!("../templates/pages/privacy.html")),
    ("pages/contact.html", include_str!("../templates/pages/contact.html")),
    ("pages/careers.html", include_str!("../templates/pages/careers.html")),
    ("pages/status.html", include_str!("../templates/pages/status.html")),
    ("pages/changelog.html", include_str!("../templates/pages/changelog.html")),
];

/// `{{ amount|money }}`: two decimal places with thousands separators.
///
/// Amounts reach templates as decimal strings (or plain numbers).
fn money(value: Value) -> Result<String, minijinja::Error> {
    let text = match value.as_str() {
        Some(text) => text.to_string(),
        None => value.to_string(),
    };
    let amount: Decimal = text.trim().parse().map_err(|_| {
        minijinja::Error::new(ErrorKind::InvalidOperation, format!("money filter expects a number, got '{text}'"))
    })?;
    Ok(format_money(amount))
}

/// `{{ rate|percent }}`: one decimal place.
fn percent(value: f64) -> String {
    format!("{value:.1}")
}

#[derive(Serialize)]
struct PageContext<'a, T: Serialize> {
    current_user: Option<&'a CurrentUser>,
    messages: &'a [FlashMessage],
    #[serde(flatten)]
    page: T,
}

/// The compiled template set. Cheap to clone.
#[derive(Clone)]
pub struct Templates {
    env: Arc<Environment<'static>>,
}

impl std::fmt::Debug for Templates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Templates").field("count", &TEMPLATES.len()).finish()
    }
}

impl Templates {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for &(name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        env.add_filter("money", money);
        env.add_filter("percent", percent);

        Ok(Self { env: Arc::new(env) })
    }

    /// Render `name` with the shared page fields plus `page`.
    pub fn render<T: Serialize>(
        &self,
        name: &str,
        current_user: Option<&CurrentUser>,
        messages: &[FlashMessage],
        page: T,
    ) -> Result<Html<String>, Error> {
        let template = self.env.get_template(name).map_err(|e| Error::Internal {
            operation: format!("load template {name}: {e}"),
        })?;

        let context = PageContext {
            current_user,
            messages,
            page,
        };

        template.render(&context).map(Html).map_err(|e| Error::Internal {
            operation: format!("render template {name}: {e:#}"),
        })
    }

    /// Render a whole page response. Shows and then clears the flash messages left by the
    /// previous request.
    pub fn page<T: Serialize>(
        &self,
        status: StatusCode,
        name: &str,
        current_user: Option<&CurrentUser>,
        flash: IncomingFlash,
        page: T,
    ) -> Result<Response, Error> {
        let html = self.render(name, current_user, flash.messages(), page)?;
        Ok((status, flash, html).into_response())
    }
}
