//! Getting an invoice to the client: PDF download, email with the PDF attached, and a WhatsApp
//! share link.

use axum::{
    Form,
    extract::{Path, State},
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{instrument, warn};

use crate::{
    AppState,
    api::{
        handlers::invoices::{detail_path, owned_invoice},
        models::{
            invoices::{EmailForm, InvoiceResponse},
            users::CurrentUser,
        },
    },
    email::{invoice_body, invoice_filename, invoice_subject},
    errors::Error,
    flash::{self, FlashMessage, IncomingFlash},
    pdf::render_invoice_pdf,
    sharing::{whatsapp_message, whatsapp_phone, whatsapp_url},
    types::{InvoiceId, abbrev_uuid},
};

#[instrument(skip_all, fields(invoice_id = %abbrev_uuid(&id)))]
pub async fn download_pdf(State(state): State<AppState>, current_user: CurrentUser, Path(id): Path<InvoiceId>) -> Result<Response, Error> {
    let invoice = owned_invoice(&state, id, &current_user).await?;
    let filename = invoice_filename(&invoice);
    let bytes = render_invoice_pdf(invoice).await?;

    Ok((
        [
            (CONTENT_TYPE, "application/pdf".to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Serialize)]
struct EmailPage {
    invoice: InvoiceResponse,
    recipient_email: String,
    subject: String,
    body: String,
}

#[instrument(skip_all, fields(invoice_id = %abbrev_uuid(&id)))]
pub async fn email_page(
    State(state): State<AppState>,
    current_user: CurrentUser,
    flash: IncomingFlash,
    Path(id): Path<InvoiceId>,
) -> Result<Response, Error> {
    let invoice = owned_invoice(&state, id, &current_user).await?;
    let page = EmailPage {
        recipient_email: invoice.client_email.clone(),
        subject: invoice_subject(&invoice),
        body: invoice_body(&invoice),
        invoice: invoice.into(),
    };
    state.templates.page(StatusCode::OK, "invoices/email.html", Some(&current_user), flash, page)
}

/// Email the invoice PDF. A blank recipient means the client's own address.
#[instrument(skip_all, fields(invoice_id = %abbrev_uuid(&id)))]
pub async fn send_email(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<InvoiceId>,
    Form(form): Form<EmailForm>,
) -> Result<Response, Error> {
    let invoice = owned_invoice(&state, id, &current_user).await?;
    let to = detail_path(invoice.id);

    let recipient = match form.recipient_email.trim() {
        "" => invoice.client_email.clone(),
        other => other.to_string(),
    };

    let pdf = render_invoice_pdf(invoice.clone()).await?;
    let message = match state.email.send_invoice(&invoice, &recipient, pdf).await {
        Ok(()) => FlashMessage::success(format!("Invoice sent to {recipient}!")),
        Err(e) => {
            warn!("Failed to send invoice {}: {e}", invoice.invoice_number);
            FlashMessage::error(format!("Failed to send email: {e}"))
        }
    };

    Ok(flash::redirect(&to, message))
}

#[derive(Serialize)]
struct WhatsAppPage {
    invoice: InvoiceResponse,
    phone: String,
    message: String,
    whatsapp_url: String,
}

#[instrument(skip_all, fields(invoice_id = %abbrev_uuid(&id)))]
pub async fn whatsapp_page(
    State(state): State<AppState>,
    current_user: CurrentUser,
    flash: IncomingFlash,
    Path(id): Path<InvoiceId>,
) -> Result<Response, Error> {
    let invoice = owned_invoice(&state, id, &current_user).await?;
    let page = WhatsAppPage {
        phone: whatsapp_phone(&invoice.client_phone),
        message: whatsapp_message(&invoice),
        whatsapp_url: whatsapp_url(&invoice),
        invoice: invoice.into(),
    };
    state.templates.page(StatusCode::OK, "invoices/whatsapp.html", Some(&current_user), flash, page)
}

#[cfg(test)]
mod tests {
    use crate::{
        config::{Config, EmailTransportConfig},
        flash::FLASH_COOKIE_NAME,
        test_utils::{create_test_app_with_config, create_test_config, create_test_invoice, create_test_user, session_cookie_for},
    };
    use axum::http::StatusCode;
    use axum_test::TestResponse;
    use sqlx::PgPool;
    use std::path::Path;

    fn config_writing_to(dir: &Path) -> Config {
        let mut config = create_test_config();
        config.email.transport = EmailTransportConfig::File {
            path: dir.to_string_lossy().to_string(),
        };
        config
    }

    fn sent_emails(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "eml"))
            .map(|entry| std::fs::read_to_string(entry.path()).unwrap())
            .collect()
    }

    fn has_flash(response: &TestResponse) -> bool {
        response
            .headers()
            .get_all("set-cookie")
            .iter()
            .filter_map(|h| h.to_str().ok())
            .any(|h| h.starts_with(&format!("{FLASH_COOKIE_NAME}=")))
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_pdf_download(pool: PgPool) {
        let user = create_test_user(&pool, "alice").await;
        let invoice = create_test_invoice(&pool, user.id, "Jane Client").await;
        let config = create_test_config();
        let cookie = session_cookie_for(&user, &config);
        let server = create_test_app_with_config(pool, config).await;

        let response = server.get(&format!("/invoices/{}/pdf", invoice.id)).add_header("cookie", cookie).await;

        response.assert_status_ok();
        assert_eq!(response.headers().get("content-type").unwrap(), "application/pdf");
        assert_eq!(
            response.headers().get("content-disposition").unwrap().to_str().unwrap(),
            format!("attachment; filename=\"Invoice_{}.pdf\"", invoice.invoice_number)
        );
        assert!(response.as_bytes().starts_with(b"%PDF"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_email_defaults_to_client_address(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        let user = create_test_user(&pool, "alice").await;
        let invoice = create_test_invoice(&pool, user.id, "Jane Client").await;
        let config = config_writing_to(dir.path());
        let cookie = session_cookie_for(&user, &config);
        let server = create_test_app_with_config(pool, config).await;
        let path = format!("/invoices/{}/email", invoice.id);

        let page = server.get(&path).add_header("cookie", cookie.clone()).await;
        page.assert_status_ok();
        let body = page.text();
        assert!(body.contains("value=\"jane@client.test\""));
        assert!(body.contains(&format!("Invoice {} from Acme Studio", invoice.invoice_number)));

        let response = server.post(&path).add_header("cookie", cookie).form(&[("recipient_email", "")]).await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert!(has_flash(&response));

        let emails = sent_emails(dir.path());
        assert_eq!(emails.len(), 1);
        assert!(emails[0].contains("jane@client.test"));
        assert!(emails[0].contains(&format!("Invoice_{}.pdf", invoice.invoice_number)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_email_accepts_email_field_name(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        let user = create_test_user(&pool, "alice").await;
        let invoice = create_test_invoice(&pool, user.id, "Jane Client").await;
        let config = config_writing_to(dir.path());
        let cookie = session_cookie_for(&user, &config);
        let server = create_test_app_with_config(pool, config).await;

        server
            .post(&format!("/invoices/{}/email", invoice.id))
            .add_header("cookie", cookie)
            .form(&[("email", "accounts@client.test")])
            .await
            .assert_status(StatusCode::SEE_OTHER);

        let emails = sent_emails(dir.path());
        assert_eq!(emails.len(), 1);
        assert!(emails[0].contains("accounts@client.test"));
        assert!(!emails[0].contains("To: jane@client.test"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_email_to_invalid_address_sends_nothing(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        let user = create_test_user(&pool, "alice").await;
        let invoice = create_test_invoice(&pool, user.id, "Jane Client").await;
        let config = config_writing_to(dir.path());
        let cookie = session_cookie_for(&user, &config);
        let server = create_test_app_with_config(pool, config).await;

        let response = server
            .post(&format!("/invoices/{}/email", invoice.id))
            .add_header("cookie", cookie.clone())
            .form(&[("recipient_email", "not-an-email")])
            .await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert!(sent_emails(dir.path()).is_empty());

        // The error shows on the invoice page
        let flash = response
            .headers()
            .get_all("set-cookie")
            .iter()
            .filter_map(|h| h.to_str().ok())
            .find(|h| h.starts_with(&format!("{FLASH_COOKIE_NAME}=")))
            .map(|h| h.split(';').next().unwrap().to_string())
            .unwrap();
        let detail = server
            .get(&format!("/invoices/{}", invoice.id))
            .add_header("cookie", format!("{cookie}; {flash}"))
            .await;
        assert!(detail.text().contains("Failed to send email"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_whatsapp_page(pool: PgPool) {
        let user = create_test_user(&pool, "alice").await;
        let invoice = create_test_invoice(&pool, user.id, "Jane Client").await;
        let config = create_test_config();
        let cookie = session_cookie_for(&user, &config);
        let server = create_test_app_with_config(pool, config).await;

        let response = server
            .get(&format!("/invoices/{}/whatsapp", invoice.id))
            .add_header("cookie", cookie)
            .await;

        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("wa.me&#x2f;15550100?text="));
        assert!(body.contains("Amount: USD 1250.50"));
    }
}
