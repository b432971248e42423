//! Test utilities for integration testing (available with `test-utils` feature).

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::{
        password::{Argon2Params, hash_string_with_params},
        session::create_session_token,
    },
    config::{Config, EmailTransportConfig, PoolSettings},
    db::{
        handlers::{Invoices, Repository, Users},
        models::{
            invoices::{InvoiceCreateDBRequest, InvoiceDBResponse, InvoiceFields, InvoiceStatus, LineItemCreateDBRequest, LineItemDBResponse},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    email::EmailService,
    templates::Templates,
    types::UserId,
};
use axum_test::TestServer;
use chrono::{NaiveDate, TimeZone, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Password given to every user made by [`create_test_user`]
pub const TEST_PASSWORD: &str = "correct-horse-battery";

pub fn create_test_config() -> Config {
    // Use temp directory for test emails
    let temp_dir = std::env::temp_dir().join(format!("invoicer-test-emails-{}", std::process::id()));

    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        ..Default::default()
    };
    config.database.pool = PoolSettings {
        max_connections: 1,
        min_connections: 0,
        ..Default::default()
    };
    // Cheap hashing keeps signup/login tests fast
    config.auth.password.argon2_memory_kib = 1024;
    config.auth.password.argon2_iterations = 1;
    config.auth.session.cookie_secure = false;
    config.email.transport = EmailTransportConfig::File {
        path: temp_dir.to_string_lossy().to_string(),
    };
    config
}

pub fn create_test_state_with_config(pool: PgPool, config: Config) -> AppState {
    let email = EmailService::new(&config).expect("Failed to create email service");
    AppState::builder()
        .db(pool)
        .config(config)
        .templates(Templates::new().expect("Failed to compile templates"))
        .email(Arc::new(email))
        .build()
}

pub fn create_test_state(pool: PgPool) -> AppState {
    create_test_state_with_config(pool, create_test_config())
}

pub async fn create_test_app_with_config(pool: PgPool, config: Config) -> TestServer {
    let app = crate::Application::new_with_pool(config, pool)
        .await
        .expect("Failed to create application");
    app.into_test_server()
}

pub async fn create_test_app(pool: PgPool) -> TestServer {
    create_test_app_with_config(pool, create_test_config()).await
}

/// Create a user whose password is [`TEST_PASSWORD`]
pub async fn create_test_user(pool: &PgPool, username: &str) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let password_hash = hash_string_with_params(
        TEST_PASSWORD,
        Some(Argon2Params {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }),
    )
    .expect("Failed to hash test password");

    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash,
        })
        .await
        .expect("Failed to create test user")
}

/// `Cookie` header value carrying a valid session for `user`
pub fn session_cookie_for(user: &UserDBResponse, config: &Config) -> String {
    let token = create_session_token(&CurrentUser::from(user.clone()), config).expect("Failed to create session token");
    format!("{}={token}", config.auth.session.cookie_name)
}

pub fn invoice_fields(client_name: &str, client_email: &str) -> InvoiceFields {
    InvoiceFields {
        client_name: client_name.to_string(),
        client_email: client_email.to_string(),
        client_phone: "+1 555-0100".to_string(),
        client_address: "1 Client Street\nSpringfield".to_string(),
        business_name: "Acme Studio".to_string(),
        business_email: "hello@acme.test".to_string(),
        business_phone: String::new(),
        business_address: "42 Studio Lane".to_string(),
        invoice_date: NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date"),
        due_date: NaiveDate::from_ymd_opt(2024, 3, 31).expect("valid date"),
        currency: "USD".to_string(),
        notes: String::new(),
    }
}

pub fn line_item(description: &str, quantity: &str, unit_price: &str) -> LineItemCreateDBRequest {
    LineItemCreateDBRequest {
        description: description.to_string(),
        quantity: quantity.parse().expect("valid quantity"),
        unit_price: unit_price.parse().expect("valid unit price"),
    }
}

/// Persist an invoice for `user_id` with two line items totalling 1,250.50
pub async fn create_test_invoice(pool: &PgPool, user_id: UserId, client_name: &str) -> InvoiceDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Invoices::new(&mut conn)
        .create(&InvoiceCreateDBRequest {
            user_id,
            fields: invoice_fields(client_name, "jane@client.test"),
            line_items: vec![line_item("Design work", "10", "100.00"), line_item("Hosting", "1", "250.50")],
        })
        .await
        .expect("Failed to create test invoice")
}

/// An invoice that never touches the database, for rendering tests
pub fn sample_invoice() -> InvoiceDBResponse {
    let id = Uuid::new_v4();
    let fields = invoice_fields("Jane Client", "jane@client.test");
    let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
    let line_items = [("Design work", "10", "100.00"), ("Hosting", "1", "250.50")]
        .into_iter()
        .enumerate()
        .map(|(position, (description, quantity, unit_price))| LineItemDBResponse {
            id: Uuid::new_v4(),
            invoice_id: id,
            position: position as i32,
            description: description.to_string(),
            quantity: quantity.parse().unwrap(),
            unit_price: unit_price.parse().unwrap(),
        })
        .collect();

    InvoiceDBResponse {
        id,
        user_id: Uuid::new_v4(),
        invoice_number: "INV-0000ABCD".to_string(),
        client_name: fields.client_name,
        client_email: fields.client_email,
        client_phone: fields.client_phone,
        client_address: fields.client_address,
        business_name: fields.business_name,
        business_email: fields.business_email,
        business_phone: fields.business_phone,
        business_address: fields.business_address,
        invoice_date: fields.invoice_date,
        due_date: fields.due_date,
        currency: fields.currency,
        status: InvoiceStatus::Unpaid,
        notes: "Payment by bank transfer.".to_string(),
        created_at,
        updated_at: created_at,
        line_items,
    }
}
