//! Email service for delivering invoices to clients.

use lettre::{
    Address, AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment, Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;
use thiserror::Error as ThisError;
use tracing::{info, instrument};

use crate::{
    config::{Config, EmailTransportConfig},
    db::models::invoices::InvoiceDBResponse,
    errors::Error,
};

/// Why an invoice email could not be delivered. Shown to the user as-is.
#[derive(ThisError, Debug)]
pub enum EmailError {
    #[error("'{0}' is not a valid email address")]
    InvalidAddress(String),

    #[error("invalid content type: {0}")]
    ContentType(#[from] lettre::message::header::ContentTypeErr),

    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("{0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("{0}")]
    File(#[from] lettre::transport::file::Error),
}

pub struct EmailService {
    transport: EmailTransport,
    from_email: Address,
    from_name: String,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let transport = match self.transport {
            EmailTransport::Smtp(_) => "smtp",
            EmailTransport::File(_) => "file",
        };
        f.debug_struct("EmailService")
            .field("transport", &transport)
            .field("from_email", &self.from_email)
            .finish()
    }
}

/// Subject line for an invoice email
pub fn invoice_subject(invoice: &InvoiceDBResponse) -> String {
    format!("Invoice {} from {}", invoice.invoice_number, invoice.business_name)
}

/// Plain-text body for an invoice email
pub fn invoice_body(invoice: &InvoiceDBResponse) -> String {
    format!(
        "Dear {},\n\nPlease find attached your invoice {}.\n\nThank you for your business!\n\nBest regards,\n{}",
        invoice.client_name, invoice.invoice_number, invoice.business_name
    )
}

/// File name used for the attached (and downloaded) PDF
pub fn invoice_filename(invoice: &InvoiceDBResponse) -> String {
    format!("Invoice_{}.pdf", invoice.invoice_number)
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port);

                let smtp_builder = match (username, password) {
                    (Some(username), Some(password)) => smtp_builder.credentials(Credentials::new(username.clone(), password.clone())),
                    _ => smtp_builder,
                };

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        let from_email = email_config.from_email.parse::<Address>().map_err(|e| Error::Internal {
            operation: format!("parse from email: {e}"),
        })?;

        Ok(Self {
            transport,
            from_email,
            from_name: email_config.from_name.clone(),
        })
    }

    /// Email `invoice` to `recipient` with the rendered PDF attached.
    ///
    /// The message is sent from the configured address under the invoice's business name, with
    /// replies going to the invoice's business email.
    #[instrument(skip(self, invoice, pdf), fields(invoice_number = %invoice.invoice_number), err)]
    pub async fn send_invoice(&self, invoice: &InvoiceDBResponse, recipient: &str, pdf: Vec<u8>) -> Result<(), EmailError> {
        let message = self.build_invoice_message(invoice, recipient, pdf)?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await?;
            }
            EmailTransport::File(file) => {
                file.send(message).await?;
            }
        }

        info!("Sent invoice {} to {}", invoice.invoice_number, recipient);
        Ok(())
    }

    fn build_invoice_message(&self, invoice: &InvoiceDBResponse, recipient: &str, pdf: Vec<u8>) -> Result<Message, EmailError> {
        let to = recipient
            .trim()
            .parse::<Address>()
            .map_err(|_| EmailError::InvalidAddress(recipient.to_string()))?;

        let display_name = if invoice.business_name.trim().is_empty() {
            self.from_name.clone()
        } else {
            invoice.business_name.clone()
        };
        let from = Mailbox::new(Some(display_name), self.from_email.clone());

        let mut builder = Message::builder().from(from).to(Mailbox::new(None, to)).subject(invoice_subject(invoice));

        if let Ok(reply_to) = invoice.business_email.parse::<Address>() {
            builder = builder.reply_to(Mailbox::new(Some(invoice.business_name.clone()), reply_to));
        }

        let pdf_type = ContentType::parse("application/pdf")?;
        let attachment = Attachment::new(invoice_filename(invoice)).body(pdf, pdf_type);

        Ok(builder.multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(invoice_body(invoice)))
                .singlepart(attachment),
        )?)
    }
}
