//! Aggregate queries behind the analytics page.

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use tracing::instrument;

use crate::{
    api::models::{
        analytics::{AnalyticsResponse, AnalyticsSummary, ClientStats, MonthlyCount},
        invoices::InvoiceResponse,
    },
    db::{
        errors::Result,
        handlers::{
            Repository,
            invoices::{InvoiceFilter, Invoices},
        },
        models::invoices::InvoiceDBResponse,
    },
    types::{UserId, abbrev_uuid},
};

/// Months shown in the invoice volume chart, including the current one
pub const MONTHLY_WINDOW: u32 = 7;
/// Rows in the top clients table
pub const TOP_CLIENTS_LIMIT: i64 = 10;
/// Rows in the recent invoices table
pub const RECENT_INVOICES_LIMIT: i64 = 10;

/// Totals over one user's invoices
#[derive(FromRow)]
struct SummaryRow {
    pub total_invoices: Option<i64>,
    pub paid_invoices: Option<i64>,
    pub unpaid_invoices: Option<i64>,
    pub total_revenue: Option<Decimal>,
    pub outstanding_amount: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub current_month_invoices: Option<i64>,
}

/// Invoice count for one month
#[derive(FromRow)]
struct MonthRow {
    pub month: Option<NaiveDate>,
    pub count: Option<i64>,
}

/// Per-client totals
#[derive(FromRow)]
struct ClientRow {
    pub client_name: String,
    pub invoice_count: Option<i64>,
    pub paid_count: Option<i64>,
    pub total_revenue: Option<Decimal>,
    pub total_amount: Option<Decimal>,
}

/// First day of the month containing `date`
fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of each of the last `count` months ending with the month containing `today`,
/// oldest first.
pub fn trailing_months(today: NaiveDate, count: u32) -> Vec<NaiveDate> {
    let current = month_start(today);
    (0..count)
        .rev()
        .filter_map(|back| current.checked_sub_months(Months::new(back)))
        .collect()
}

/// Pair every month in the window with its count, zero when there were no invoices.
fn fill_monthly_counts(months: &[NaiveDate], rows: Vec<MonthRow>) -> Vec<MonthlyCount> {
    let counts: HashMap<NaiveDate, i64> = rows
        .into_iter()
        .filter_map(|row| match (row.month, row.count) {
            (Some(month), Some(count)) => Some((month, count)),
            _ => None,
        })
        .collect();

    months
        .iter()
        .map(|month| MonthlyCount {
            month: *month,
            label: month.format("%b %Y").to_string(),
            count: counts.get(month).copied().unwrap_or(0),
        })
        .collect()
}

/// `part` as a percentage of `whole`, 0 when `whole` is 0
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole > 0 {
        (part as f64 * 100.0) / whole as f64
    } else {
        0.0
    }
}

/// Mean of `count` amounts summing to `sum`, rounded to cents. 0 when there are none.
pub fn average(sum: Decimal, count: i64) -> Decimal {
    if count > 0 {
        (sum / Decimal::from(count)).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    } else {
        Decimal::ZERO
    }
}

#[instrument(skip(db), fields(user_id = %abbrev_uuid(&user_id)), err)]
async fn get_summary(db: &PgPool, user_id: UserId, today: NaiveDate) -> Result<AnalyticsSummary> {
    let this_month = month_start(today);
    let next_month = this_month.checked_add_months(Months::new(1)).unwrap_or(this_month);

    let row = sqlx::query_as::<_, SummaryRow>(
        r#"
        WITH totals AS (
            SELECT i.id, i.status, i.invoice_date, COALESCE(SUM(li.quantity * li.unit_price), 0) AS total
            FROM invoices i
            LEFT JOIN line_items li ON li.invoice_id = i.id
            WHERE i.user_id = $1
            GROUP BY i.id
        )
        SELECT
            COUNT(*) AS total_invoices,
            COUNT(*) FILTER (WHERE status = 'paid') AS paid_invoices,
            COUNT(*) FILTER (WHERE status = 'unpaid') AS unpaid_invoices,
            SUM(total) FILTER (WHERE status = 'paid') AS total_revenue,
            SUM(total) FILTER (WHERE status = 'unpaid') AS outstanding_amount,
            SUM(total) AS total_amount,
            COUNT(*) FILTER (WHERE invoice_date >= $2 AND invoice_date < $3) AS current_month_invoices
        FROM totals
        "#,
    )
    .bind(user_id)
    .bind(this_month)
    .bind(next_month)
    .fetch_one(db)
    .await?;

    let total_invoices = row.total_invoices.unwrap_or(0);
    let paid_invoices = row.paid_invoices.unwrap_or(0);

    Ok(AnalyticsSummary {
        total_invoices,
        paid_invoices,
        unpaid_invoices: row.unpaid_invoices.unwrap_or(0),
        total_revenue: row.total_revenue.unwrap_or_default(),
        outstanding_amount: row.outstanding_amount.unwrap_or_default(),
        average_invoice: average(row.total_amount.unwrap_or_default(), total_invoices),
        payment_rate: percentage(paid_invoices, total_invoices),
        current_month_invoices: row.current_month_invoices.unwrap_or(0),
    })
}

#[instrument(skip(db), fields(user_id = %abbrev_uuid(&user_id)), err)]
async fn get_monthly_counts(db: &PgPool, user_id: UserId, today: NaiveDate) -> Result<Vec<MonthlyCount>> {
    let months = trailing_months(today, MONTHLY_WINDOW);
    let (Some(first), Some(last)) = (months.first().copied(), months.last().copied()) else {
        return Ok(Vec::new());
    };
    let end = last.checked_add_months(Months::new(1)).unwrap_or(last);

    let rows = sqlx::query_as::<_, MonthRow>(
        r#"
        SELECT date_trunc('month', invoice_date::timestamp)::date AS month, COUNT(*) AS count
        FROM invoices
        WHERE user_id = $1 AND invoice_date >= $2 AND invoice_date < $3
        GROUP BY 1
        "#,
    )
    .bind(user_id)
    .bind(first)
    .bind(end)
    .fetch_all(db)
    .await?;

    Ok(fill_monthly_counts(&months, rows))
}

#[instrument(skip(db), fields(user_id = %abbrev_uuid(&user_id)), err)]
async fn get_top_clients(db: &PgPool, user_id: UserId, limit: i64) -> Result<Vec<ClientStats>> {
    let rows = sqlx::query_as::<_, ClientRow>(
        r#"
        WITH totals AS (
            SELECT i.id, i.client_name, i.status, COALESCE(SUM(li.quantity * li.unit_price), 0) AS total
            FROM invoices i
            LEFT JOIN line_items li ON li.invoice_id = i.id
            WHERE i.user_id = $1
            GROUP BY i.id
        )
        SELECT
            client_name,
            COUNT(*) AS invoice_count,
            COUNT(*) FILTER (WHERE status = 'paid') AS paid_count,
            COALESCE(SUM(total) FILTER (WHERE status = 'paid'), 0) AS total_revenue,
            SUM(total) AS total_amount
        FROM totals
        GROUP BY client_name
        ORDER BY total_revenue DESC, client_name
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let invoice_count = row.invoice_count.unwrap_or(0);
            let paid_count = row.paid_count.unwrap_or(0);
            ClientStats {
                client_name: row.client_name,
                invoice_count,
                paid_count,
                total_revenue: row.total_revenue.unwrap_or_default(),
                avg_invoice: average(row.total_amount.unwrap_or_default(), invoice_count),
                payment_rate: percentage(paid_count, invoice_count),
            }
        })
        .collect())
}

#[instrument(skip(db), fields(user_id = %abbrev_uuid(&user_id)), err)]
async fn get_recent_invoices(db: &PgPool, user_id: UserId, limit: i64) -> Result<Vec<InvoiceDBResponse>> {
    let mut conn = db.acquire().await?;
    Invoices::new(&mut conn)
        .list(&InvoiceFilter::new(0, limit).owned_by(user_id))
        .await
}

/// Everything the analytics page shows for one user. `today` decides the current month.
#[instrument(skip(db), fields(user_id = %abbrev_uuid(&user_id)), err)]
pub async fn get_invoice_analytics(db: &PgPool, user_id: UserId, today: NaiveDate) -> Result<AnalyticsResponse> {
    // Execute all queries concurrently
    let (summary, monthly, top_clients, recent) = tokio::try_join!(
        get_summary(db, user_id, today),
        get_monthly_counts(db, user_id, today),
        get_top_clients(db, user_id, TOP_CLIENTS_LIMIT),
        get_recent_invoices(db, user_id, RECENT_INVOICES_LIMIT),
    )?;

    Ok(AnalyticsResponse {
        summary,
        monthly,
        top_clients,
        recent_invoices: recent.into_iter().map(InvoiceResponse::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::invoices::{InvoiceCreateDBRequest, InvoiceStatus};
    use crate::test_utils::{create_test_user, invoice_fields, line_item};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_trailing_months_crosses_year_boundary() {
        let months = trailing_months(date(2025, 2, 17), 7);
        assert_eq!(
            months,
            vec![
                date(2024, 8, 1),
                date(2024, 9, 1),
                date(2024, 10, 1),
                date(2024, 11, 1),
                date(2024, 12, 1),
                date(2025, 1, 1),
                date(2025, 2, 1),
            ]
        );
    }

    #[test]
    fn test_fill_monthly_counts_zero_fills() {
        let months = trailing_months(date(2025, 3, 31), 3);
        let rows = vec![
            MonthRow {
                month: Some(date(2025, 2, 1)),
                count: Some(4),
            },
            MonthRow { month: None, count: Some(9) },
        ];

        let filled = fill_monthly_counts(&months, rows);
        let labels: Vec<&str> = filled.iter().map(|m| m.label.as_str()).collect();
        let counts: Vec<i64> = filled.iter().map(|m| m.count).collect();
        assert_eq!(labels, vec!["Jan 2025", "Feb 2025", "Mar 2025"]);
        assert_eq!(counts, vec![0, 4, 0]);
    }

    #[test]
    fn test_percentage_and_average() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
        assert!((percentage(1, 3) - 33.333).abs() < 0.001);

        assert_eq!(average(dec("100"), 0), Decimal::ZERO);
        assert_eq!(average(dec("100"), 3), dec("33.33"));
        assert_eq!(average(dec("0.05"), 2), dec("0.03"));
    }

    async fn seed(pool: &PgPool, user_id: UserId, client: &str, invoice_date: NaiveDate, items: &[(&str, &str)], paid: bool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Invoices::new(&mut conn);
        let mut fields = invoice_fields(client, &format!("{}@clients.test", client.to_lowercase().replace(' ', "")));
        fields.invoice_date = invoice_date;
        fields.due_date = invoice_date;
        let invoice = repo
            .create(&InvoiceCreateDBRequest {
                user_id,
                fields,
                line_items: items.iter().map(|(q, p)| line_item("Work", q, p)).collect(),
            })
            .await
            .unwrap();
        if paid {
            repo.set_status(invoice.id, user_id, InvoiceStatus::Paid).await.unwrap();
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_empty_analytics(pool: PgPool) {
        let user = create_test_user(&pool, "nobody").await;

        let analytics = get_invoice_analytics(&pool, user.id, date(2025, 6, 15)).await.unwrap();

        assert_eq!(analytics.summary.total_invoices, 0);
        assert_eq!(analytics.summary.total_revenue, Decimal::ZERO);
        assert_eq!(analytics.summary.average_invoice, Decimal::ZERO);
        assert_eq!(analytics.summary.payment_rate, 0.0);
        assert_eq!(analytics.monthly.len(), 7);
        assert!(analytics.monthly.iter().all(|m| m.count == 0));
        assert!(analytics.top_clients.is_empty());
        assert!(analytics.recent_invoices.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_analytics_sums_match_invoice_totals(pool: PgPool) {
        let user = create_test_user(&pool, "owner").await;
        let other = create_test_user(&pool, "other").await;
        let today = date(2025, 6, 15);

        // Acme: one paid (200), one unpaid (50)
        seed(&pool, user.id, "Acme", date(2025, 6, 1), &[("2", "100")], true).await;
        seed(&pool, user.id, "Acme", date(2025, 5, 20), &[("1", "30"), ("2", "10")], false).await;
        // Globex: one paid (75.50)
        seed(&pool, user.id, "Globex", date(2025, 1, 10), &[("1", "75.50")], true).await;
        // Initech: unpaid, outside the monthly window
        seed(&pool, user.id, "Initech", date(2024, 11, 30), &[("3", "11.11")], false).await;
        // Someone else's invoice never counts
        seed(&pool, other.id, "Acme", date(2025, 6, 2), &[("1", "9999")], true).await;

        let analytics = get_invoice_analytics(&pool, user.id, today).await.unwrap();
        let summary = &analytics.summary;

        assert_eq!(summary.total_invoices, 4);
        assert_eq!(summary.paid_invoices, 2);
        assert_eq!(summary.unpaid_invoices, 2);
        assert_eq!(summary.total_revenue, dec("275.50"));
        assert_eq!(summary.outstanding_amount, dec("83.33"));
        // (200 + 50 + 75.50 + 33.33) / 4
        assert_eq!(summary.average_invoice, dec("89.71"));
        assert_eq!(summary.payment_rate, 50.0);
        assert_eq!(summary.current_month_invoices, 1);

        let counts: Vec<(String, i64)> = analytics.monthly.iter().map(|m| (m.label.clone(), m.count)).collect();
        assert_eq!(
            counts,
            vec![
                ("Dec 2024".to_string(), 0),
                ("Jan 2025".to_string(), 1),
                ("Feb 2025".to_string(), 0),
                ("Mar 2025".to_string(), 0),
                ("Apr 2025".to_string(), 0),
                ("May 2025".to_string(), 1),
                ("Jun 2025".to_string(), 1),
            ]
        );

        let clients: Vec<&str> = analytics.top_clients.iter().map(|c| c.client_name.as_str()).collect();
        assert_eq!(clients, vec!["Acme", "Globex", "Initech"]);

        let acme = &analytics.top_clients[0];
        assert_eq!(acme.invoice_count, 2);
        assert_eq!(acme.paid_count, 1);
        assert_eq!(acme.total_revenue, dec("200"));
        assert_eq!(acme.avg_invoice, dec("125"));
        assert_eq!(acme.payment_rate, 50.0);

        let initech = &analytics.top_clients[2];
        assert_eq!(initech.total_revenue, Decimal::ZERO);
        assert_eq!(initech.payment_rate, 0.0);

        assert_eq!(analytics.recent_invoices.len(), 4);
        assert_eq!(analytics.recent_invoices[0].client_name, "Initech");
    }
}
