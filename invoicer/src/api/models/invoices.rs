//! Form payloads and page models for invoices.

use crate::api::models::forms::FormErrors;
use crate::db::models::invoices::{InvoiceDBResponse, InvoiceFields, InvoiceStatus, LineItemCreateDBRequest, LineItemDBResponse};
use crate::types::InvoiceId;
use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DATE_FORMAT: &str = "%Y-%m-%d";
const NAME_MAX_LENGTH: usize = 200;
const PHONE_MAX_LENGTH: usize = 32;
const DESCRIPTION_MAX_LENGTH: usize = 500;
/// Due date offered on a fresh invoice form
const DEFAULT_PAYMENT_TERMS_DAYS: u64 = 30;

/// Amounts are stored as NUMERIC(12, 2)
fn max_amount() -> Decimal {
    Decimal::new(10_000_000_000, 0)
}

/// Round a user-supplied amount to cents.
pub fn round_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A line item as shown on invoice pages
#[derive(Debug, Clone, Serialize)]
pub struct LineItemResponse {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl From<LineItemDBResponse> for LineItemResponse {
    fn from(db: LineItemDBResponse) -> Self {
        Self {
            subtotal: db.subtotal(),
            description: db.description,
            quantity: db.quantity,
            unit_price: db.unit_price,
        }
    }
}

/// An invoice as shown on pages, with its derived total
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceResponse {
    pub id: InvoiceId,
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
    pub line_items: Vec<LineItemResponse>,
    pub total: Decimal,
}

impl From<InvoiceDBResponse> for InvoiceResponse {
    fn from(db: InvoiceDBResponse) -> Self {
        let total = db.total();
        Self {
            id: db.id,
            invoice_number: db.invoice_number,
            client_name: db.client_name,
            client_email: db.client_email,
            client_phone: db.client_phone,
            client_address: db.client_address,
            business_name: db.business_name,
            business_email: db.business_email,
            business_phone: db.business_phone,
            business_address: db.business_address,
            invoice_date: db.invoice_date,
            due_date: db.due_date,
            currency: db.currency,
            status: db.status,
            notes: db.notes,
            created_at: db.created_at,
            updated_at: db.updated_at,
            line_items: db.line_items.into_iter().map(LineItemResponse::from).collect(),
            total,
        }
    }
}

/// Dashboard query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    pub status: Option<String>,
}

impl DashboardQuery {
    /// `paid` and `unpaid` filter the list; anything else shows every invoice.
    pub fn status_filter(&self) -> Option<InvoiceStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }

    /// The filter name as echoed back to the page.
    pub fn filter_name(&self) -> &'static str {
        self.status_filter().map(|s| s.as_str()).unwrap_or("all")
    }
}

/// Form posted to `/invoices/{id}/status`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatusForm {
    pub status: String,
}

/// Form posted to `/invoices/{id}/email`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmailForm {
    #[serde(alias = "email")]
    pub recipient_email: String,
}

/// One entry of the `line_items` JSON array carried by the invoice form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemInput {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: Value,
    #[serde(default)]
    pub unit_price: Value,
}

/// The create/edit invoice form. Line items arrive as a JSON array in `line_items`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceForm {
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub client_address: String,
    pub business_name: String,
    pub business_email: String,
    pub business_phone: String,
    pub business_address: String,
    pub invoice_date: String,
    pub due_date: String,
    pub currency: String,
    pub notes: String,
    pub line_items: String,
}

/// What a valid invoice form turns into
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedInvoice {
    pub fields: InvoiceFields,
    pub line_items: Vec<LineItemCreateDBRequest>,
}

impl InvoiceForm {
    /// A blank form dated today, due in thirty days.
    pub fn blank(today: NaiveDate, currency: &str) -> Self {
        let due = today.checked_add_days(Days::new(DEFAULT_PAYMENT_TERMS_DAYS)).unwrap_or(today);
        Self {
            invoice_date: today.format(DATE_FORMAT).to_string(),
            due_date: due.format(DATE_FORMAT).to_string(),
            currency: currency.to_string(),
            line_items: "[]".to_string(),
            ..Default::default()
        }
    }

    /// The form pre-filled from a stored invoice, for editing.
    pub fn from_invoice(invoice: &InvoiceDBResponse) -> Self {
        let items: Vec<LineItemInput> = invoice
            .line_items
            .iter()
            .map(|item| LineItemInput {
                description: item.description.clone(),
                quantity: Value::String(item.quantity.normalize().to_string()),
                unit_price: Value::String(item.unit_price.to_string()),
            })
            .collect();

        Self {
            client_name: invoice.client_name.clone(),
            client_email: invoice.client_email.clone(),
            client_phone: invoice.client_phone.clone(),
            client_address: invoice.client_address.clone(),
            business_name: invoice.business_name.clone(),
            business_email: invoice.business_email.clone(),
            business_phone: invoice.business_phone.clone(),
            business_address: invoice.business_address.clone(),
            invoice_date: invoice.invoice_date.format(DATE_FORMAT).to_string(),
            due_date: invoice.due_date.format(DATE_FORMAT).to_string(),
            currency: invoice.currency.clone(),
            notes: invoice.notes.clone(),
            line_items: serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string()),
        }
    }

    pub fn validate(&self) -> Result<ValidatedInvoice, FormErrors> {
        let mut errors = FormErrors::new();

        let client_name = required_text(&mut errors, "client_name", &self.client_name, NAME_MAX_LENGTH);
        let client_email = required_email(&mut errors, "client_email", &self.client_email);
        let client_phone = optional_text(&mut errors, "client_phone", &self.client_phone, PHONE_MAX_LENGTH);
        let business_name = required_text(&mut errors, "business_name", &self.business_name, NAME_MAX_LENGTH);
        let business_email = required_email(&mut errors, "business_email", &self.business_email);
        let business_phone = optional_text(&mut errors, "business_phone", &self.business_phone, PHONE_MAX_LENGTH);

        let invoice_date = parse_date(&mut errors, "invoice_date", &self.invoice_date);
        let due_date = parse_date(&mut errors, "due_date", &self.due_date);
        if let (Some(invoice_date), Some(due_date)) = (invoice_date, due_date) {
            if due_date < invoice_date {
                errors.add("due_date", "Due date cannot be before the invoice date.");
            }
        }

        let currency = self.currency.trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            errors.add("currency", "Enter a three letter currency code, e.g. USD.");
        }

        let line_items = parse_line_items(&mut errors, &self.line_items);

        match (invoice_date, due_date) {
            (Some(invoice_date), Some(due_date)) if errors.is_empty() => Ok(ValidatedInvoice {
                fields: InvoiceFields {
                    client_name,
                    client_email,
                    client_phone,
                    client_address: self.client_address.trim().to_string(),
                    business_name,
                    business_email,
                    business_phone,
                    business_address: self.business_address.trim().to_string(),
                    invoice_date,
                    due_date,
                    currency,
                    notes: self.notes.trim().to_string(),
                },
                line_items,
            }),
            _ => {
                errors.add_non_field("Please correct the errors below.");
                Err(errors)
            }
        }
    }
}

fn required_text(errors: &mut FormErrors, field: &str, value: &str, max: usize) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, "This field is required.");
    } else if value.chars().count() > max {
        errors.add(field, format!("Ensure this value has at most {max} characters."));
    }
    value.to_string()
}

fn optional_text(errors: &mut FormErrors, field: &str, value: &str, max: usize) -> String {
    let value = value.trim();
    if value.chars().count() > max {
        errors.add(field, format!("Ensure this value has at most {max} characters."));
    }
    value.to_string()
}

fn required_email(errors: &mut FormErrors, field: &str, value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, "This field is required.");
    } else if value.parse::<lettre::Address>().is_err() {
        errors.add(field, "Enter a valid email address.");
    }
    value.to_string()
}

fn parse_date(errors: &mut FormErrors, field: &str, value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, "This field is required.");
        return None;
    }
    match NaiveDate::parse_from_str(value, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            errors.add(field, "Enter a valid date (YYYY-MM-DD).");
            None
        }
    }
}

/// Numbers may arrive as JSON numbers or as numeric strings
fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => number.to_string().parse().ok(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn parse_line_items(errors: &mut FormErrors, raw: &str) -> Vec<LineItemCreateDBRequest> {
    let raw = if raw.trim().is_empty() { "[]" } else { raw };
    let inputs: Vec<LineItemInput> = match serde_json::from_str(raw) {
        Ok(inputs) => inputs,
        Err(_) => {
            errors.add("line_items", "Line items could not be read.");
            return Vec::new();
        }
    };

    if inputs.is_empty() {
        errors.add("line_items", "Add at least one line item.");
        return Vec::new();
    }

    let mut items = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let row = index + 1;
        let description = input.description.trim();
        if description.is_empty() {
            errors.add("line_items", format!("Item {row}: description is required."));
        } else if description.chars().count() > DESCRIPTION_MAX_LENGTH {
            errors.add(
                "line_items",
                format!("Item {row}: description must be at most {DESCRIPTION_MAX_LENGTH} characters."),
            );
        }

        let quantity = parse_decimal(&input.quantity).map(round_amount);
        match quantity {
            None => errors.add("line_items", format!("Item {row}: quantity must be a number.")),
            Some(q) if q <= Decimal::ZERO => errors.add("line_items", format!("Item {row}: quantity must be greater than zero.")),
            Some(q) if q >= max_amount() => errors.add("line_items", format!("Item {row}: quantity is too large.")),
            Some(_) => {}
        }

        let unit_price = parse_decimal(&input.unit_price).map(round_amount);
        match unit_price {
            None => errors.add("line_items", format!("Item {row}: unit price must be a number.")),
            Some(p) if p < Decimal::ZERO => errors.add("line_items", format!("Item {row}: unit price cannot be negative.")),
            Some(p) if p >= max_amount() => errors.add("line_items", format!("Item {row}: unit price is too large.")),
            Some(_) => {}
        }

        if let (Some(quantity), Some(unit_price)) = (quantity, unit_price) {
            items.push(LineItemCreateDBRequest {
                description: description.to_string(),
                quantity,
                unit_price,
            });
        }
    }
    items
}
