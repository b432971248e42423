//! Page models for the dashboard and analytics views.

use crate::api::models::invoices::InvoiceResponse;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// Headline figures shown on the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_invoices: i64,
    pub paid_count: i64,
    pub unpaid_count: i64,
    /// Sum of paid invoice totals
    pub total_revenue: Decimal,
    /// Distinct client email addresses
    pub unique_clients: i64,
}

/// Aggregate figures over all of a user's invoices
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub total_invoices: i64,
    pub paid_invoices: i64,
    pub unpaid_invoices: i64,
    pub total_revenue: Decimal,
    pub outstanding_amount: Decimal,
    pub average_invoice: Decimal,
    /// Percentage of invoices that are paid, 0 when there are none
    pub payment_rate: f64,
    pub current_month_invoices: i64,
}

/// Invoices dated in one calendar month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyCount {
    /// First day of the month
    pub month: NaiveDate,
    /// e.g. `Mar 2025`
    pub label: String,
    pub count: i64,
}

/// Per-client figures. Clients are identified by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientStats {
    pub client_name: String,
    pub invoice_count: i64,
    pub paid_count: i64,
    /// Paid invoices only
    pub total_revenue: Decimal,
    /// Over all of the client's invoices
    pub avg_invoice: Decimal,
    pub payment_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsResponse {
    pub summary: AnalyticsSummary,
    pub monthly: Vec<MonthlyCount>,
    pub top_clients: Vec<ClientStats>,
    pub recent_invoices: Vec<InvoiceResponse>,
}
