//! Invoice pages: create, view, edit, delete and mark paid/unpaid.
//!
//! Every handler looks the invoice up with its owner, so another user's invoice is a 404 exactly
//! like a missing one.

use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    AppState,
    api::models::{
        forms::FormErrors,
        invoices::{InvoiceForm, InvoiceResponse, StatusForm},
        users::CurrentUser,
    },
    db::{
        handlers::{Invoices, Repository},
        models::invoices::{InvoiceCreateDBRequest, InvoiceDBResponse, InvoiceStatus, InvoiceUpdateDBRequest},
    },
    errors::Error,
    flash::{self, FlashMessage, IncomingFlash},
    types::{InvoiceId, abbrev_uuid},
};

/// Load `id` if `user` owns it, otherwise 404
pub(crate) async fn owned_invoice(state: &AppState, id: InvoiceId, user: &CurrentUser) -> Result<InvoiceDBResponse, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Invoices::new(&mut conn)
        .get_owned(id, user.id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Invoice".to_string(),
            id: id.to_string(),
        })
}

pub(crate) fn detail_path(id: InvoiceId) -> String {
    format!("/invoices/{id}")
}

#[derive(Serialize)]
struct InvoiceRef<'a> {
    id: InvoiceId,
    invoice_number: &'a str,
}

#[derive(Serialize)]
struct FormPage<'a> {
    mode: &'static str,
    invoice: Option<InvoiceRef<'a>>,
    form: &'a InvoiceForm,
    errors: &'a FormErrors,
}

#[derive(Serialize)]
struct InvoicePage {
    invoice: InvoiceResponse,
}

fn form_response(
    state: &AppState,
    status: StatusCode,
    user: &CurrentUser,
    flash: IncomingFlash,
    editing: Option<&InvoiceDBResponse>,
    form: &InvoiceForm,
    errors: &FormErrors,
) -> Result<Response, Error> {
    let page = FormPage {
        mode: if editing.is_some() { "edit" } else { "create" },
        invoice: editing.map(|invoice| InvoiceRef {
            id: invoice.id,
            invoice_number: &invoice.invoice_number,
        }),
        form,
        errors,
    };
    state.templates.page(status, "invoices/form.html", Some(user), flash, page)
}

#[instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn new_invoice_page(State(state): State<AppState>, current_user: CurrentUser, flash: IncomingFlash) -> Result<Response, Error> {
    let form = InvoiceForm::blank(Utc::now().date_naive(), &state.config.default_currency);
    form_response(&state, StatusCode::OK, &current_user, flash, None, &form, &FormErrors::new())
}

#[instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn create_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    flash: IncomingFlash,
    Form(form): Form<InvoiceForm>,
) -> Result<Response, Error> {
    let validated = match form.validate() {
        Ok(validated) => validated,
        Err(errors) => return form_response(&state, StatusCode::UNPROCESSABLE_ENTITY, &current_user, flash, None, &form, &errors),
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let invoice = Invoices::new(&mut conn)
        .create(&InvoiceCreateDBRequest {
            user_id: current_user.id,
            fields: validated.fields,
            line_items: validated.line_items,
        })
        .await?;

    info!("Created invoice {}", invoice.invoice_number);
    Ok(flash::redirect(
        &detail_path(invoice.id),
        FlashMessage::success(format!("Invoice {} created successfully!", invoice.invoice_number)),
    ))
}

#[instrument(skip_all, fields(invoice_id = %abbrev_uuid(&id)))]
pub async fn invoice_detail(
    State(state): State<AppState>,
    current_user: CurrentUser,
    flash: IncomingFlash,
    Path(id): Path<InvoiceId>,
) -> Result<Response, Error> {
    let invoice = owned_invoice(&state, id, &current_user).await?;
    state.templates.page(
        StatusCode::OK,
        "invoices/detail.html",
        Some(&current_user),
        flash,
        InvoicePage { invoice: invoice.into() },
    )
}

#[instrument(skip_all, fields(invoice_id = %abbrev_uuid(&id)))]
pub async fn edit_invoice_page(
    State(state): State<AppState>,
    current_user: CurrentUser,
    flash: IncomingFlash,
    Path(id): Path<InvoiceId>,
) -> Result<Response, Error> {
    let invoice = owned_invoice(&state, id, &current_user).await?;
    let form = InvoiceForm::from_invoice(&invoice);
    form_response(&state, StatusCode::OK, &current_user, flash, Some(&invoice), &form, &FormErrors::new())
}

#[instrument(skip_all, fields(invoice_id = %abbrev_uuid(&id)))]
pub async fn update_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    flash: IncomingFlash,
    Path(id): Path<InvoiceId>,
    Form(form): Form<InvoiceForm>,
) -> Result<Response, Error> {
    let existing = owned_invoice(&state, id, &current_user).await?;

    let validated = match form.validate() {
        Ok(validated) => validated,
        Err(errors) => {
            return form_response(
                &state,
                StatusCode::UNPROCESSABLE_ENTITY,
                &current_user,
                flash,
                Some(&existing),
                &form,
                &errors,
            );
        }
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let invoice = Invoices::new(&mut conn)
        .update(
            existing.id,
            &InvoiceUpdateDBRequest {
                fields: validated.fields,
                line_items: validated.line_items,
            },
        )
        .await?;

    info!("Updated invoice {}", invoice.invoice_number);
    Ok(flash::redirect(
        &detail_path(invoice.id),
        FlashMessage::success(format!("Invoice {} updated successfully!", invoice.invoice_number)),
    ))
}

#[instrument(skip_all, fields(invoice_id = %abbrev_uuid(&id)))]
pub async fn delete_invoice_page(
    State(state): State<AppState>,
    current_user: CurrentUser,
    flash: IncomingFlash,
    Path(id): Path<InvoiceId>,
) -> Result<Response, Error> {
    let invoice = owned_invoice(&state, id, &current_user).await?;
    state.templates.page(
        StatusCode::OK,
        "invoices/confirm_delete.html",
        Some(&current_user),
        flash,
        InvoicePage { invoice: invoice.into() },
    )
}

#[instrument(skip_all, fields(invoice_id = %abbrev_uuid(&id)))]
pub async fn delete_invoice(State(state): State<AppState>, current_user: CurrentUser, Path(id): Path<InvoiceId>) -> Result<Response, Error> {
    let invoice = owned_invoice(&state, id, &current_user).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Invoices::new(&mut conn).delete(invoice.id).await?;

    info!("Deleted invoice {}", invoice.invoice_number);
    Ok(flash::redirect("/dashboard", FlashMessage::success("Invoice deleted successfully!")))
}

#[instrument(skip_all, fields(invoice_id = %abbrev_uuid(&id), status = %form.status))]
pub async fn set_invoice_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<InvoiceId>,
    Form(form): Form<StatusForm>,
) -> Result<Response, Error> {
    let invoice = owned_invoice(&state, id, &current_user).await?;
    let to = detail_path(invoice.id);

    let Ok(status) = form.status.trim().parse::<InvoiceStatus>() else {
        return Ok(flash::redirect(&to, FlashMessage::error("Invalid status.")));
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Invoices::new(&mut conn).set_status(invoice.id, current_user.id, status).await? {
        // Deleted between the lookup and the update
        return Err(Error::NotFound {
            resource: "Invoice".to_string(),
            id: id.to_string(),
        });
    }

    Ok(flash::redirect(&to, FlashMessage::success(format!("Invoice status updated to {status}!"))))
}

/// Status changes are POST only
pub async fn set_invoice_status_get(_current_user: CurrentUser) -> Response {
    Redirect::to("/dashboard").into_response()
}
