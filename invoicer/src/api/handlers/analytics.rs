use axum::{extract::State, http::StatusCode, response::Response};
use chrono::Utc;
use tracing::instrument;

use crate::{
    AppState, api::models::users::CurrentUser, db::handlers::analytics::get_invoice_analytics, errors::Error, flash::IncomingFlash,
    types::abbrev_uuid,
};

/// Revenue, payment rates, monthly volume and top clients for the signed-in user
#[instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn analytics(State(state): State<AppState>, current_user: CurrentUser, flash: IncomingFlash) -> Result<Response, Error> {
    let today = Utc::now().date_naive();
    let analytics = get_invoice_analytics(&state.db, current_user.id, today).await?;

    state
        .templates
        .page(StatusCode::OK, "analytics.html", Some(&current_user), flash, analytics)
}

#[cfg(test)]
mod tests {
    use crate::{
        db::{handlers::Invoices, models::invoices::InvoiceStatus},
        test_utils::{create_test_app, create_test_config, create_test_invoice, create_test_user, session_cookie_for},
    };
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_analytics_page(pool: PgPool) {
        let user = create_test_user(&pool, "alice").await;
        let paid = create_test_invoice(&pool, user.id, "Big Client").await;
        create_test_invoice(&pool, user.id, "Small Client").await;
        {
            let mut conn = pool.acquire().await.unwrap();
            Invoices::new(&mut conn).set_status(paid.id, user.id, InvoiceStatus::Paid).await.unwrap();
        }
        let server = create_test_app(pool).await;

        let response = server
            .get("/analytics")
            .add_header("cookie", session_cookie_for(&user, &create_test_config()))
            .await;

        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("Big Client"));
        assert!(body.contains("Small Client"));
        assert!(body.contains("50.0%"));
        assert!(body.contains(&paid.invoice_number));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_analytics_with_no_invoices(pool: PgPool) {
        let user = create_test_user(&pool, "alice").await;
        let server = create_test_app(pool).await;

        let response = server
            .get("/analytics")
            .add_header("cookie", session_cookie_for(&user, &create_test_config()))
            .await;

        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("No clients yet."));
        assert!(body.contains("0.0%"));
    }
}
