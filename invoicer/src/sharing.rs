//! WhatsApp share links for invoices.

use crate::{api::models::invoices::round_amount, db::models::invoices::InvoiceDBResponse};

/// The summary message pre-filled in WhatsApp
pub fn whatsapp_message(invoice: &InvoiceDBResponse) -> String {
    format!(
        "*Invoice {}*\n\nFrom: {}\nTo: {}\n\nAmount: {} {:.2}\n\nThank you for your business!",
        invoice.invoice_number,
        invoice.business_name,
        invoice.client_name,
        invoice.currency,
        round_amount(invoice.total()),
    )
}

/// Client phone number in the digits-only form wa.me expects
pub fn whatsapp_phone(phone: &str) -> String {
    phone.chars().filter(|c| !matches!(c, '+' | ' ' | '-')).collect()
}

/// `https://wa.me/<phone>?text=<message>`. With no phone, WhatsApp asks the sender to pick a chat.
pub fn whatsapp_url(invoice: &InvoiceDBResponse) -> String {
    let text: String = url::form_urlencoded::byte_serialize(whatsapp_message(invoice).as_bytes()).collect();
    // form encoding writes spaces as '+'; a literal '+' is already escaped as %2B
    format!("https://wa.me/{}?text={}", whatsapp_phone(&invoice.client_phone), text.replace('+', "%20"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_invoice;

    #[test]
    fn test_message_format() {
        let invoice = sample_invoice();
        assert_eq!(
            whatsapp_message(&invoice),
            "*Invoice INV-0000ABCD*\n\nFrom: Acme Studio\nTo: Jane Client\n\nAmount: USD 1250.50\n\nThank you for your business!"
        );
    }

    #[test]
    fn test_phone_is_stripped() {
        assert_eq!(whatsapp_phone("+1 555-0100"), "15550100");
        assert_eq!(whatsapp_phone("(020) 7946 0000"), "(020)79460000");
        assert_eq!(whatsapp_phone(""), "");
    }

    #[test]
    fn test_url_encodes_message() {
        let invoice = sample_invoice();
        let url = whatsapp_url(&invoice);

        assert!(url.starts_with("https://wa.me/15550100?text="));
        assert!(url.contains("Invoice%20INV-0000ABCD"));
        assert!(url.contains("%0A%0AFrom%3A%20Acme%20Studio"));
        assert!(!url.contains('+'));
        assert!(!url.contains(' '));
    }

    #[test]
    fn test_url_without_phone() {
        let mut invoice = sample_invoice();
        invoice.client_phone = String::new();
        assert!(whatsapp_url(&invoice).starts_with("https://wa.me/?text="));
    }
}
