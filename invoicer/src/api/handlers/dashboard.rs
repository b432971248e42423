use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Response,
};
use serde::Serialize;
use tracing::instrument;

use crate::{
    AppState,
    api::models::{
        analytics::DashboardStats,
        invoices::{DashboardQuery, InvoiceResponse},
        users::CurrentUser,
    },
    db::{
        handlers::{Invoices, Repository, invoices::InvoiceFilter},
        models::invoices::InvoiceStatus,
    },
    errors::Error,
    flash::IncomingFlash,
};

#[derive(Serialize)]
struct DashboardPage {
    stats: DashboardStats,
    filter_status: &'static str,
    invoices: Vec<InvoiceResponse>,
}

/// The signed-in user's invoices, newest first, with headline figures.
///
/// `?status=paid` or `?status=unpaid` narrows the list. The figures always cover every invoice.
#[instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn dashboard(
    State(state): State<AppState>,
    current_user: CurrentUser,
    flash: IncomingFlash,
    Query(query): Query<DashboardQuery>,
) -> Result<Response, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut invoices = Invoices::new(&mut conn);

    let counts = invoices.count_by_status(current_user.id).await?;
    let stats = DashboardStats {
        total_invoices: counts.total,
        paid_count: counts.paid,
        unpaid_count: counts.unpaid,
        total_revenue: invoices.sum_totals(current_user.id, Some(InvoiceStatus::Paid)).await?,
        unique_clients: invoices.distinct_clients(current_user.id).await?,
    };

    let filter = InvoiceFilter::new(0, i64::MAX)
        .owned_by(current_user.id)
        .with_status(query.status_filter());
    let listed = invoices.list(&filter).await?;

    state.templates.page(
        StatusCode::OK,
        "dashboard.html",
        Some(&current_user),
        flash,
        DashboardPage {
            stats,
            filter_status: query.filter_name(),
            invoices: listed.into_iter().map(InvoiceResponse::from).collect(),
        },
    )
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
    async fn test_dashboard_stats_and_filters(pool: PgPool) {
        let user = create_test_user(&pool, "alice").await;
        let other = create_test_user(&pool, "mallory").await;
        let paid = create_test_invoice(&pool, user.id, "Paid Client").await;
        let unpaid = create_test_invoice(&pool, user.id, "Waiting Client").await;
        let foreign = create_test_invoice(&pool, other.id, "Someone Else").await;
        {
            let mut conn = pool.acquire().await.unwrap();
            assert!(Invoices::new(&mut conn).set_status(paid.id, user.id, InvoiceStatus::Paid).await.unwrap());
        }

        let server = create_test_app(pool).await;
        let cookie = session_cookie_for(&user, &create_test_config());

        let response = server.get("/dashboard").add_header("cookie", cookie.clone()).await;
        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains(&paid.invoice_number));
        assert!(body.contains(&unpaid.invoice_number));
        assert!(!body.contains(&foreign.invoice_number));
        // Only the paid invoice counts towards revenue
        assert!(body.contains("1,250.50"));

        let response = server
            .get("/dashboard")
            .add_query_param("status", "unpaid")
            .add_header("cookie", cookie.clone())
            .await;
        let body = response.text();
        assert!(!body.contains(&paid.invoice_number));
        assert!(body.contains(&unpaid.invoice_number));

        // Unknown filters show everything
        let response = server
            .get("/dashboard")
            .add_query_param("status", "overdue")
            .add_header("cookie", cookie)
            .await;
        let body = response.text();
        assert!(body.contains(&paid.invoice_number));
        assert!(body.contains(&unpaid.invoice_number));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_empty_dashboard(pool: PgPool) {
        let user = create_test_user(&pool, "alice").await;
        let server = create_test_app(pool).await;

        let response = server
            .get("/dashboard")
            .add_header("cookie", session_cookie_for(&user, &create_test_config()))
            .await;

        response.assert_status_ok();
        assert!(response.text().contains("No invoices yet."));
    }
}
