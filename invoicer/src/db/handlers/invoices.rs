//! Database repository for invoices and their line items.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::invoices::{
        InvoiceCreateDBRequest, InvoiceDBResponse, InvoiceFields, InvoiceStatus, InvoiceUpdateDBRequest,
        LineItemCreateDBRequest, LineItemDBResponse, StatusCounts,
    },
};
use crate::types::{InvoiceId, UserId, abbrev_uuid};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Connection, FromRow, PgConnection};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

const INVOICE_COLUMNS: &str = "id, user_id, invoice_number, client_name, client_email, client_phone, client_address, \
     business_name, business_email, business_phone, business_address, invoice_date, due_date, currency, status, notes, \
     created_at, updated_at";

const LINE_ITEM_COLUMNS: &str = "id, invoice_id, position, description, quantity, unit_price";

/// Filter for listing invoices
#[derive(Debug, Clone)]
pub struct InvoiceFilter {
    pub user_id: Option<UserId>,
    pub status: Option<InvoiceStatus>,
    pub skip: i64,
    pub limit: i64,
}

impl InvoiceFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            user_id: None,
            status: None,
            skip,
            limit,
        }
    }

    pub fn owned_by(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_status(mut self, status: Option<InvoiceStatus>) -> Self {
        self.status = status;
        self
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Invoice {
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
}

impl From<(Vec<LineItemDBResponse>, Invoice)> for InvoiceDBResponse {
    fn from((line_items, invoice): (Vec<LineItemDBResponse>, Invoice)) -> Self {
        Self {
            id: invoice.id,
            user_id: invoice.user_id,
            invoice_number: invoice.invoice_number,
            client_name: invoice.client_name,
            client_email: invoice.client_email,
            client_phone: invoice.client_phone,
            client_address: invoice.client_address,
            business_name: invoice.business_name,
            business_email: invoice.business_email,
            business_phone: invoice.business_phone,
            business_address: invoice.business_address,
            invoice_date: invoice.invoice_date,
            due_date: invoice.due_date,
            currency: invoice.currency,
            status: invoice.status,
            notes: invoice.notes,
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
            line_items,
        }
    }
}

/// Human-facing invoice number, e.g. `INV-3F2A9C1B`.
pub fn generate_invoice_number() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("INV-{}", hex[..8].to_uppercase())
}

pub struct Invoices<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Invoices<'c> {
    type CreateRequest = InvoiceCreateDBRequest;
    type UpdateRequest = InvoiceUpdateDBRequest;
    type Response = InvoiceDBResponse;
    type Id = InvoiceId;
    type Filter = InvoiceFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), items = request.line_items.len()), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        // The invoice and its items are written together or not at all
        let mut tx = self.db.begin().await?;

        let fields = &request.fields;
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (
                id, user_id, invoice_number,
                client_name, client_email, client_phone, client_address,
                business_name, business_email, business_phone, business_address,
                invoice_date, due_date, currency, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(generate_invoice_number())
        .bind(&fields.client_name)
        .bind(&fields.client_email)
        .bind(&fields.client_phone)
        .bind(&fields.client_address)
        .bind(&fields.business_name)
        .bind(&fields.business_email)
        .bind(&fields.business_phone)
        .bind(&fields.business_address)
        .bind(fields.invoice_date)
        .bind(fields.due_date)
        .bind(&fields.currency)
        .bind(&fields.notes)
        .fetch_one(&mut *tx)
        .await?;

        let line_items = insert_line_items(&mut tx, invoice.id, &request.line_items).await?;

        tx.commit().await?;

        Ok(InvoiceDBResponse::from((line_items, invoice)))
    }

    #[instrument(skip(self), fields(invoice_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match invoice {
            Some(invoice) => {
                let line_items = self.line_items_for(invoice.id).await?;
                Ok(Some(InvoiceDBResponse::from((line_items, invoice))))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<InvoiceId>) -> Result<HashMap<Self::Id, InvoiceDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let invoices = sqlx::query_as::<_, Invoice>(&format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ANY($1)"))
            .bind(ids.as_slice())
            .fetch_all(&mut *self.db)
            .await?;

        let invoices = self.attach_line_items(invoices).await?;
        Ok(invoices.into_iter().map(|invoice| (invoice.id, invoice)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip, status = ?filter.status), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS} FROM invoices
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::invoice_status IS NULL OR status = $2)
            ORDER BY created_at DESC, id
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(filter.user_id)
        .bind(filter.status)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        self.attach_line_items(invoices).await
    }

    #[instrument(skip(self), fields(invoice_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        // Line items go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(invoice_id = %abbrev_uuid(&id), items = request.line_items.len()), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let fields: &InvoiceFields = &request.fields;
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices SET
                client_name = $2,
                client_email = $3,
                client_phone = $4,
                client_address = $5,
                business_name = $6,
                business_email = $7,
                business_phone = $8,
                business_address = $9,
                invoice_date = $10,
                due_date = $11,
                currency = $12,
                notes = $13,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&fields.client_name)
        .bind(&fields.client_email)
        .bind(&fields.client_phone)
        .bind(&fields.client_address)
        .bind(&fields.business_name)
        .bind(&fields.business_email)
        .bind(&fields.business_phone)
        .bind(&fields.business_address)
        .bind(fields.invoice_date)
        .bind(fields.due_date)
        .bind(&fields.currency)
        .bind(&fields.notes)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        // Edits replace the whole set of line items
        sqlx::query("DELETE FROM line_items WHERE invoice_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let line_items = insert_line_items(&mut tx, id, &request.line_items).await?;

        tx.commit().await?;

        Ok(InvoiceDBResponse::from((line_items, invoice)))
    }
}

async fn insert_line_items(
    conn: &mut PgConnection,
    invoice_id: InvoiceId,
    items: &[LineItemCreateDBRequest],
) -> Result<Vec<LineItemDBResponse>> {
    let mut stored = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        let line_item = sqlx::query_as::<_, LineItemDBResponse>(&format!(
            r#"
            INSERT INTO line_items (id, invoice_id, position, description, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {LINE_ITEM_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(position as i32)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price)
        .fetch_one(&mut *conn)
        .await?;
        stored.push(line_item);
    }
    Ok(stored)
}

impl<'c> Invoices<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    async fn line_items_for(&mut self, invoice_id: InvoiceId) -> Result<Vec<LineItemDBResponse>> {
        let items = sqlx::query_as::<_, LineItemDBResponse>(&format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM line_items WHERE invoice_id = $1 ORDER BY position"
        ))
        .bind(invoice_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(items)
    }

    /// Load line items for many invoices in one query, preserving the invoices' order
    async fn attach_line_items(&mut self, invoices: Vec<Invoice>) -> Result<Vec<InvoiceDBResponse>> {
        if invoices.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<InvoiceId> = invoices.iter().map(|invoice| invoice.id).collect();
        let items = sqlx::query_as::<_, LineItemDBResponse>(&format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM line_items WHERE invoice_id = ANY($1) ORDER BY invoice_id, position"
        ))
        .bind(ids.as_slice())
        .fetch_all(&mut *self.db)
        .await?;

        let mut by_invoice: HashMap<InvoiceId, Vec<LineItemDBResponse>> = HashMap::new();
        for item in items {
            by_invoice.entry(item.invoice_id).or_default().push(item);
        }

        Ok(invoices
            .into_iter()
            .map(|invoice| {
                let line_items = by_invoice.remove(&invoice.id).unwrap_or_default();
                InvoiceDBResponse::from((line_items, invoice))
            })
            .collect())
    }

    /// Fetch an invoice only if it belongs to `user_id`. Someone else's invoice looks the same as
    /// a missing one.
    #[instrument(skip(self), fields(invoice_id = %abbrev_uuid(&id), user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_owned(&mut self, id: InvoiceId, user_id: UserId) -> Result<Option<InvoiceDBResponse>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        match invoice {
            Some(invoice) => {
                let line_items = self.line_items_for(invoice.id).await?;
                Ok(Some(InvoiceDBResponse::from((line_items, invoice))))
            }
            None => Ok(None),
        }
    }

    /// Mark an owned invoice paid or unpaid. Returns false when there was no such invoice.
    #[instrument(skip(self), fields(invoice_id = %abbrev_uuid(&id), user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn set_status(&mut self, id: InvoiceId, user_id: UserId, status: InvoiceStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE invoices SET status = $3, updated_at = NOW() WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .bind(status)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn count_by_status(&mut self, user_id: UserId) -> Result<StatusCounts> {
        let counts = sqlx::query_as::<_, StatusCounts>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'paid') AS paid,
                COUNT(*) FILTER (WHERE status = 'unpaid') AS unpaid
            FROM invoices
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(counts)
    }

    /// Number of different clients invoiced, by email address
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn distinct_clients(&mut self, user_id: UserId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT client_email) FROM invoices WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Sum of invoice totals, optionally restricted to one status
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn sum_totals(&mut self, user_id: UserId, status: Option<InvoiceStatus>) -> Result<Decimal> {
        let sum: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT SUM(li.quantity * li.unit_price)
            FROM line_items li
            JOIN invoices i ON i.id = li.invoice_id
            WHERE i.user_id = $1
              AND ($2::invoice_status IS NULL OR i.status = $2)
            "#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(sum.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_user, invoice_fields, line_item};
    use sqlx::PgPool;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    async fn create_invoice(pool: &PgPool, user_id: UserId, items: Vec<LineItemCreateDBRequest>) -> InvoiceDBResponse {
        let mut conn = pool.acquire().await.unwrap();
        Invoices::new(&mut conn)
            .create(&InvoiceCreateDBRequest {
                user_id,
                fields: invoice_fields("Acme Corp", "billing@acme.test"),
                line_items: items,
            })
            .await
            .unwrap()
    }

    #[test]
    fn test_invoice_number_format() {
        let number = generate_invoice_number();
        assert_eq!(number.len(), 12);
        assert!(number.starts_with("INV-"));
        assert!(number[4..].chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert_ne!(number, generate_invoice_number());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_invoice_with_line_items(pool: PgPool) {
        let user = create_test_user(&pool, "owner").await;

        let invoice = create_invoice(
            &pool,
            user.id,
            vec![line_item("Design", "2", "150.00"), line_item("Hosting", "1", "49.99")],
        )
        .await;

        assert_eq!(invoice.user_id, user.id);
        assert_eq!(invoice.status, InvoiceStatus::Unpaid);
        assert!(invoice.invoice_number.starts_with("INV-"));
        assert_eq!(invoice.line_items.len(), 2);
        assert_eq!(invoice.line_items[0].position, 0);
        assert_eq!(invoice.line_items[1].description, "Hosting");
        assert_eq!(invoice.total(), dec("349.99"));

        let mut conn = pool.acquire().await.unwrap();
        let fetched = Invoices::new(&mut conn).get_by_id(invoice.id).await.unwrap().unwrap();
        assert_eq!(fetched.line_items, invoice.line_items);
        assert_eq!(fetched.total(), dec("349.99"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_failed_line_item_rolls_back_invoice(pool: PgPool) {
        let user = create_test_user(&pool, "owner").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Invoices::new(&mut conn);

        let result = repo
            .create(&InvoiceCreateDBRequest {
                user_id: user.id,
                fields: invoice_fields("Acme Corp", "billing@acme.test"),
                line_items: vec![line_item("Fine", "1", "10"), line_item("Negative qty", "-1", "10")],
            })
            .await;
        assert!(matches!(result, Err(DbError::CheckViolation { .. })));

        let listed = repo.list(&InvoiceFilter::new(0, 10).owned_by(user.id)).await.unwrap();
        assert!(listed.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_replaces_line_items(pool: PgPool) {
        let user = create_test_user(&pool, "owner").await;
        let invoice = create_invoice(
            &pool,
            user.id,
            vec![line_item("A", "1", "10"), line_item("B", "1", "20"), line_item("C", "1", "30")],
        )
        .await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Invoices::new(&mut conn);

        let mut fields = invoice.fields();
        fields.client_name = "Renamed Client".to_string();
        let updated = repo
            .update(
                invoice.id,
                &InvoiceUpdateDBRequest {
                    fields,
                    line_items: vec![line_item("Only", "4", "2.50")],
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.client_name, "Renamed Client");
        assert_eq!(updated.invoice_number, invoice.invoice_number);
        assert_eq!(updated.line_items.len(), 1);
        assert_eq!(updated.total(), dec("10.00"));

        let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM line_items WHERE invoice_id = $1")
            .bind(invoice.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stored, 1);

        let missing = repo
            .update(
                Uuid::new_v4(),
                &InvoiceUpdateDBRequest {
                    fields: invoice.fields(),
                    line_items: vec![],
                },
            )
            .await;
        assert!(matches!(missing, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_cascades_to_line_items(pool: PgPool) {
        let user = create_test_user(&pool, "owner").await;
        let invoice = create_invoice(&pool, user.id, vec![line_item("A", "1", "10")]).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Invoices::new(&mut conn);
        assert!(repo.delete(invoice.id).await.unwrap());
        assert!(!repo.delete(invoice.id).await.unwrap());
        assert!(repo.get_by_id(invoice.id).await.unwrap().is_none());

        let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM line_items WHERE invoice_id = $1")
            .bind(invoice.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stored, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_ownership_scoping(pool: PgPool) {
        let owner = create_test_user(&pool, "owner").await;
        let stranger = create_test_user(&pool, "stranger").await;
        let invoice = create_invoice(&pool, owner.id, vec![line_item("A", "1", "10")]).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Invoices::new(&mut conn);

        assert!(repo.get_owned(invoice.id, owner.id).await.unwrap().is_some());
        assert!(repo.get_owned(invoice.id, stranger.id).await.unwrap().is_none());

        assert!(!repo.set_status(invoice.id, stranger.id, InvoiceStatus::Paid).await.unwrap());
        assert_eq!(
            repo.get_by_id(invoice.id).await.unwrap().unwrap().status,
            InvoiceStatus::Unpaid
        );

        assert!(repo.set_status(invoice.id, owner.id, InvoiceStatus::Paid).await.unwrap());
        assert_eq!(repo.get_by_id(invoice.id).await.unwrap().unwrap().status, InvoiceStatus::Paid);

        assert!(repo.set_status(invoice.id, owner.id, InvoiceStatus::Unpaid).await.unwrap());
        assert_eq!(
            repo.get_by_id(invoice.id).await.unwrap().unwrap().status,
            InvoiceStatus::Unpaid
        );
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters_and_counts(pool: PgPool) {
        let owner = create_test_user(&pool, "owner").await;
        let other = create_test_user(&pool, "other").await;

        let first = create_invoice(&pool, owner.id, vec![line_item("A", "1", "100")]).await;
        let second = create_invoice(&pool, owner.id, vec![line_item("B", "2", "25"), line_item("C", "1", "5")]).await;
        create_invoice(&pool, other.id, vec![line_item("D", "1", "1000")]).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Invoices::new(&mut conn);
        repo.set_status(first.id, owner.id, InvoiceStatus::Paid).await.unwrap();

        let all = repo.list(&InvoiceFilter::new(0, 50).owned_by(owner.id)).await.unwrap();
        assert_eq!(all.len(), 2);
        // Newest first
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[0].line_items.len(), 2);

        let paid = repo
            .list(&InvoiceFilter::new(0, 50).owned_by(owner.id).with_status(Some(InvoiceStatus::Paid)))
            .await
            .unwrap();
        assert_eq!(paid.iter().map(|i| i.id).collect::<Vec<_>>(), vec![first.id]);

        let page = repo.list(&InvoiceFilter::new(1, 1).owned_by(owner.id)).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, first.id);

        let everyone = repo.list(&InvoiceFilter::new(0, 50)).await.unwrap();
        assert_eq!(everyone.len(), 3);

        let counts = repo.count_by_status(owner.id).await.unwrap();
        assert_eq!(counts, StatusCounts { total: 2, paid: 1, unpaid: 1 });

        assert_eq!(repo.sum_totals(owner.id, Some(InvoiceStatus::Paid)).await.unwrap(), dec("100"));
        assert_eq!(repo.sum_totals(owner.id, Some(InvoiceStatus::Unpaid)).await.unwrap(), dec("55"));
        assert_eq!(repo.sum_totals(owner.id, None).await.unwrap(), dec("155"));
        assert_eq!(repo.sum_totals(Uuid::new_v4(), None).await.unwrap(), Decimal::ZERO);

        // Both invoices share a client email
        assert_eq!(repo.distinct_clients(owner.id).await.unwrap(), 1);

        let bulk = repo.get_bulk(vec![first.id, second.id]).await.unwrap();
        assert_eq!(bulk[&second.id].total(), dec("55"));
    }
}
