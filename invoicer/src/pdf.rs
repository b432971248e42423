//! Invoice PDF rendering.
//!
//! Invoices are laid out on A4 pages with the builtin Helvetica fonts. The line-item table
//! continues on a new page (with its header repeated) when it runs past the bottom margin.

use printpdf::{BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference, Point};
use tracing::{debug, instrument};

use crate::{db::models::invoices::InvoiceDBResponse, errors::Error, types::format_money};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_LEFT: f32 = 15.0;
const MARGIN_RIGHT: f32 = 195.0;
const TOP: f32 = 282.0;
const BOTTOM: f32 = 25.0;

const X_DESCRIPTION: f32 = MARGIN_LEFT;
const X_QUANTITY: f32 = 120.0;
const X_UNIT_PRICE: f32 = 142.0;
const X_SUBTOTAL: f32 = 170.0;

/// Characters per line that fit the description column (and the full width) at 10pt
const DESCRIPTION_WRAP: usize = 55;
const FULL_WIDTH_WRAP: usize = 95;
const LINE_HEIGHT: f32 = 5.0;

fn pdf_error<E: std::fmt::Display>(operation: &str) -> impl Fn(E) -> Error + '_ {
    move |e| Error::Internal {
        operation: format!("{operation}: {e}"),
    }
}

/// Greedy word wrap. Words longer than `width` are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word = word;
            while word.chars().count() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let split = word.char_indices().nth(width).map(|(i, _)| i).unwrap_or(word.len());
                lines.push(word[..split].to_string());
                word = &word[split..];
            }
            if word.is_empty() {
                continue;
            }
            if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }
    // Drop trailing blank lines but keep blank lines between paragraphs
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}

/// Cursor over the document that starts a new page when it runs out of room
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
    pages: usize,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self, Error> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error("load Helvetica"))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error("load Helvetica Bold"))?;

        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: TOP,
            pages: 1,
        })
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), format!("Layer {}", self.pages + 1));
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = TOP;
        self.pages += 1;
    }

    /// Start a new page unless `height` mm still fit above the bottom margin.
    /// Returns whether a page was added.
    fn ensure_space(&mut self, height: f32) -> bool {
        if self.y - height < BOTTOM {
            self.new_page();
            true
        } else {
            false
        }
    }

    fn text(&self, text: &str, size: f32, x: f32, y: f32) {
        self.layer.use_text(text, size, Mm(x), Mm(y), &self.regular);
    }

    fn bold(&self, text: &str, size: f32, x: f32, y: f32) {
        self.layer.use_text(text, size, Mm(x), Mm(y), &self.bold);
    }

    fn rule(&self, y: f32) {
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(MARGIN_LEFT), Mm(y)), false),
                (Point::new(Mm(MARGIN_RIGHT), Mm(y)), false),
            ],
            is_closed: false,
        });
    }

    /// Write a block of wrapped lines down the page at `x`, breaking pages as needed
    fn paragraph(&mut self, text: &str, x: f32, width: usize) {
        for line in wrap(text, width) {
            self.ensure_space(LINE_HEIGHT);
            self.text(&line, 10.0, x, self.y);
            self.y -= LINE_HEIGHT;
        }
    }

    fn finish(self) -> Result<(Vec<u8>, usize), Error> {
        let pages = self.pages;
        let mut writer = std::io::BufWriter::new(Vec::<u8>::new());
        self.doc.save(&mut writer).map_err(pdf_error("write PDF"))?;
        let bytes = writer.into_inner().map_err(|e| Error::Internal {
            operation: format!("flush PDF buffer: {e}"),
        })?;
        Ok((bytes, pages))
    }
}

fn contact_block(email: &str, phone: &str, address: &str) -> Vec<String> {
    let mut lines = vec![email.to_string()];
    if !phone.trim().is_empty() {
        lines.push(phone.to_string());
    }
    for line in address.lines().filter(|line| !line.trim().is_empty()) {
        lines.push(line.trim().to_string());
    }
    lines
}

fn table_header(writer: &mut PageWriter) {
    let y = writer.y;
    writer.bold("Description", 10.0, X_DESCRIPTION, y);
    writer.bold("Qty", 10.0, X_QUANTITY, y);
    writer.bold("Unit price", 10.0, X_UNIT_PRICE, y);
    writer.bold("Subtotal", 10.0, X_SUBTOTAL, y);
    writer.rule(y - 2.5);
    writer.y -= 8.0;
}

fn layout(invoice: &InvoiceDBResponse) -> Result<(Vec<u8>, usize), Error> {
    let mut writer = PageWriter::new(&format!("Invoice {}", invoice.invoice_number))?;

    // Title and business details
    writer.bold("INVOICE", 24.0, 140.0, TOP);
    writer.bold(&invoice.invoice_number, 12.0, 140.0, TOP - 8.0);
    writer.text(&format!("Status: {}", invoice.status.as_str().to_uppercase()), 10.0, 140.0, TOP - 14.0);

    writer.bold(&invoice.business_name, 16.0, MARGIN_LEFT, writer.y);
    writer.y -= 7.0;
    for line in contact_block(&invoice.business_email, &invoice.business_phone, &invoice.business_address) {
        writer.text(&line, 10.0, MARGIN_LEFT, writer.y);
        writer.y -= LINE_HEIGHT;
    }

    writer.y = writer.y.min(TOP - 22.0) - 4.0;
    writer.rule(writer.y);
    writer.y -= 10.0;

    // Client on the left, dates on the right
    let block_top = writer.y;
    writer.bold("Bill to:", 12.0, MARGIN_LEFT, block_top);
    writer.bold("Details:", 12.0, 120.0, block_top);
    writer.text(&format!("Invoice date: {}", invoice.invoice_date), 10.0, 120.0, block_top - 7.0);
    writer.text(&format!("Due date: {}", invoice.due_date), 10.0, 120.0, block_top - 12.0);
    writer.text(&format!("Currency: {}", invoice.currency), 10.0, 120.0, block_top - 17.0);

    writer.y = block_top - 7.0;
    writer.bold(&invoice.client_name, 10.0, MARGIN_LEFT, writer.y);
    writer.y -= LINE_HEIGHT;
    for line in contact_block(&invoice.client_email, &invoice.client_phone, &invoice.client_address) {
        writer.text(&line, 10.0, MARGIN_LEFT, writer.y);
        writer.y -= LINE_HEIGHT;
    }
    writer.y = writer.y.min(block_top - 22.0) - 8.0;

    // Line items
    writer.ensure_space(20.0);
    table_header(&mut writer);
    for item in &invoice.line_items {
        let description = wrap(&item.description, DESCRIPTION_WRAP);
        let height = LINE_HEIGHT * description.len().max(1) as f32 + 1.5;
        if writer.ensure_space(height) {
            table_header(&mut writer);
        }

        let y = writer.y;
        writer.text(&item.quantity.normalize().to_string(), 10.0, X_QUANTITY, y);
        writer.text(&format_money(item.unit_price), 10.0, X_UNIT_PRICE, y);
        writer.text(&format_money(item.subtotal()), 10.0, X_SUBTOTAL, y);
        for (i, line) in description.iter().enumerate() {
            writer.text(line, 10.0, X_DESCRIPTION, y - LINE_HEIGHT * i as f32);
        }
        writer.y -= height;
    }

    // Total
    writer.ensure_space(16.0);
    writer.rule(writer.y + 2.0);
    writer.y -= 6.0;
    writer.bold("Total:", 13.0, X_UNIT_PRICE, writer.y);
    writer.bold(
        &format!("{} {}", invoice.currency, format_money(invoice.total())),
        13.0,
        X_SUBTOTAL - 10.0,
        writer.y,
    );
    writer.y -= 12.0;

    // Notes
    if !invoice.notes.trim().is_empty() {
        writer.ensure_space(12.0);
        writer.bold("Notes:", 11.0, MARGIN_LEFT, writer.y);
        writer.y -= 6.0;
        writer.paragraph(&invoice.notes, MARGIN_LEFT, FULL_WIDTH_WRAP);
    }

    writer.ensure_space(LINE_HEIGHT * 2.0);
    writer.y -= LINE_HEIGHT;
    writer.text("Thank you for your business!", 10.0, MARGIN_LEFT, writer.y);

    writer.finish()
}

/// Render `invoice` to PDF bytes.
pub fn render_invoice(invoice: &InvoiceDBResponse) -> Result<Vec<u8>, Error> {
    let (bytes, pages) = layout(invoice)?;
    debug!(
        "Rendered invoice {} ({} line items) to {} pages, {} bytes",
        invoice.invoice_number,
        invoice.line_items.len(),
        pages,
        bytes.len()
    );
    Ok(bytes)
}

/// Render on a blocking thread so large invoices don't stall the runtime.
#[instrument(skip(invoice), fields(invoice_number = %invoice.invoice_number), err)]
pub async fn render_invoice_pdf(invoice: InvoiceDBResponse) -> Result<Vec<u8>, Error> {
    tokio::task::spawn_blocking(move || render_invoice(&invoice))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn PDF rendering task: {e}"),
        })?
}
