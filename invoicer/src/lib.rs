//! # invoicer: invoicing for small businesses
//!
//! `invoicer` is a server-rendered web application. Users sign up, create invoices made of line
//! items, mark them paid or unpaid, download them as PDFs, email them to clients, share a summary
//! over WhatsApp, and follow their revenue on a dashboard and an analytics page.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL (through sqlx) for all persistence. Every request follows the same path:
//!
//! ```text
//! page handler -> repository query -> template render
//! ```
//!
//! There are no background tasks and no in-process caches; all state lives in the database and
//! in the signed session cookie.
//!
//! ### Core Components
//!
//! The **page layer** ([`api`]) holds the axum handlers and the form and page models they work
//! with. Forms are posted as `application/x-www-form-urlencoded`; invalid submissions re-render
//! the form with messages, successful ones redirect with a [`flash`] message.
//!
//! The **authentication layer** ([`auth`]) hashes passwords with Argon2, issues JWT session
//! cookies, and provides the [`CurrentUser`](api::models::users::CurrentUser) extractor.
//! Handlers that take a `CurrentUser` send anonymous visitors to the login page.
//!
//! The **database layer** ([`db`]) uses the repository pattern. Invoice queries are always scoped
//! to the owning user, so one user's invoices are invisible to everyone else.
//!
//! **Documents**: [`pdf`] renders invoices with printpdf, [`email`] delivers them with lettre,
//! and [`sharing`] builds WhatsApp links.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use invoicer::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = invoicer::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     invoicer::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod errors;
pub mod flash;
pub mod pdf;
pub mod sharing;
mod static_assets;
pub mod telemetry;
pub mod templates;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::{
    api::{
        handlers::{analytics, auth as auth_handlers, dashboard, documents, invoices, pages, static_assets::serve_embedded_asset},
        models::users::CurrentUser,
    },
    email::EmailService,
    flash::IncomingFlash,
    templates::Templates,
};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, instrument};

pub use types::{InvoiceId, UserId};

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .templates(Templates::new()?)
///     .email(Arc::new(EmailService::new(&config)?))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub templates: Templates,
    pub email: Arc<EmailService>,
}

/// Get the invoicer database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Connect to the configured database and bring its schema up to date
#[instrument(skip_all)]
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool = config.database.pool.pool_options().connect(&config.database.url).await?;
    migrator().run(&pool).await?;
    info!("Database migrations applied");
    Ok(pool)
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Page not found")
}

/// Build the application router with every page, static assets and (optionally) metrics
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let mut pages_router = Router::new()
        .route("/", get(pages::home))
        .route("/signup", get(auth_handlers::signup_page).post(auth_handlers::signup))
        .route("/login", get(auth_handlers::login_page).post(auth_handlers::login))
        .route("/logout", get(auth_handlers::logout).post(auth_handlers::logout))
        .route("/dashboard", get(dashboard::dashboard))
        .route("/analytics", get(analytics::analytics))
        .route("/settings", get(pages::settings))
        .route("/invoices/new", get(invoices::new_invoice_page).post(invoices::create_invoice))
        .route("/invoices/{id}", get(invoices::invoice_detail))
        .route("/invoices/{id}/edit", get(invoices::edit_invoice_page).post(invoices::update_invoice))
        .route("/invoices/{id}/delete", get(invoices::delete_invoice_page).post(invoices::delete_invoice))
        .route(
            "/invoices/{id}/status",
            get(invoices::set_invoice_status_get).post(invoices::set_invoice_status),
        )
        .route("/invoices/{id}/pdf", get(documents::download_pdf))
        .route("/invoices/{id}/email", get(documents::email_page).post(documents::send_email))
        .route("/invoices/{id}/whatsapp", get(documents::whatsapp_page));

    for &name in pages::INFO_PAGES {
        pages_router = pages_router.route(
            &format!("/{name}"),
            get(
                move |State(state): State<AppState>, current_user: Option<CurrentUser>, flash: IncomingFlash| {
                    pages::info_page(name, state, current_user, flash)
                },
            ),
        );
    }

    let mut router = pages_router
        .with_state(state.clone())
        .route("/healthz", get(pages::healthz))
        .route("/static/{*path}", get(serve_embedded_asset))
        .fallback(not_found);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    // Add tracing layer
    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The configured web application.
///
/// 1. **Build**: [`Application::new`] connects to the database, runs migrations and assembles
///    the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles requests until the
///    shutdown future completes
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = setup_database(&config).await?;
        Self::new_with_pool(config, pool).await
    }

    /// Create an application on an existing, already migrated pool
    pub async fn new_with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        debug!("Starting invoicer with configuration: {:#?}", config);

        let templates = Templates::new().map_err(|e| anyhow::anyhow!("Failed to compile templates: {e:#}"))?;
        let email = EmailService::new(&config).map_err(|e| anyhow::anyhow!("Failed to create email service: {e}"))?;

        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .templates(templates)
            .email(Arc::new(email))
            .build();
        let router = build_router(&state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Invoicer listening on http://{}, available at http://localhost:{}", bind_addr, self.config.port);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
