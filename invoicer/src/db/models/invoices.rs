//! Database models for invoices and their line items.

use crate::types::{InvoiceId, LineItemId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Payment status of an invoice. New invoices start out unpaid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Paid,
    #[default]
    Unpaid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Unpaid => "unpaid",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(InvoiceStatus::Paid),
            "unpaid" => Ok(InvoiceStatus::Unpaid),
            other => Err(format!("invalid invoice status '{other}'")),
        }
    }
}

/// The editable header of an invoice: who it's from, who it's for, and when it's due.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceFields {
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub client_address: String,
    pub business_name: String,
    pub business_email: String,
    pub business_phone: String,
    pub business_address: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: String,
    pub notes: String,
}

/// A line item as submitted, before it has been stored
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemCreateDBRequest {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

/// Database request for creating an invoice together with its line items
#[derive(Debug, Clone)]
pub struct InvoiceCreateDBRequest {
    pub user_id: UserId,
    pub fields: InvoiceFields,
    pub line_items: Vec<LineItemCreateDBRequest>,
}

/// Database request for updating an invoice. The line items replace the stored set entirely.
#[derive(Debug, Clone)]
pub struct InvoiceUpdateDBRequest {
    pub fields: InvoiceFields,
    pub line_items: Vec<LineItemCreateDBRequest>,
}

/// Database response for a line item
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct LineItemDBResponse {
    pub id: LineItemId,
    pub invoice_id: InvoiceId,
    pub position: i32,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl LineItemDBResponse {
    pub fn subtotal(&self) -> Decimal {
        self.quantity * self.unit_price
    }
}

/// Database response for an invoice, line items in display order
#[derive(Debug, Clone)]
pub struct InvoiceDBResponse {
    pub id: InvoiceId,
    pub user_id: UserId,
    pub invoice_number: String,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub client_address: String,
    pub business_name: String,
    pub business_email: String,
    pub business_phone: String,
    pub business_address: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: String,
    pub status: InvoiceStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub line_items: Vec<LineItemDBResponse>,
}

impl InvoiceDBResponse {
    /// Sum of the line item subtotals.
    pub fn total(&self) -> Decimal {
        self.line_items.iter().map(LineItemDBResponse::subtotal).sum()
    }

    pub fn fields(&self) -> InvoiceFields {
        InvoiceFields {
            client_name: self.client_name.clone(),
            client_email: self.client_email.clone(),
            client_phone: self.client_phone.clone(),
            client_address: self.client_address.clone(),
            business_name: self.business_name.clone(),
            business_email: self.business_email.clone(),
            business_phone: self.business_phone.clone(),
            business_address: self.business_address.clone(),
            invoice_date: self.invoice_date,
            due_date: self.due_date,
            currency: self.currency.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// Invoice counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct StatusCounts {
    pub total: i64,
    pub paid: i64,
    pub unpaid: i64,
}
