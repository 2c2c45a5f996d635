//! Paginated PDF report for an extracted invoice.
//!
//! Rendering happens in two steps. [`ReportModel::build`] turns the invoice
//! into display strings: amounts are parsed and formatted, long values are
//! truncated. This is the only step that can fail. [`render_pdf`] then lays
//! the model out on A4 pages with printpdf's built-in Helvetica faces,
//! breaking pages as the cursor reaches the bottom margin and repeating the
//! item table header on every page the table spans.
//!
//! The built-in faces are declared with WinAnsiEncoding, so every string is
//! transcoded to Windows-1252 before it reaches the content stream.
//! Characters outside that code page print as `?`.

use encoding_rs::WINDOWS_1252;
use printpdf::{
    BuiltinFont, Color, DictItem, Line, LinePoint, Mm, Op, PaintMode, PdfDocument, PdfPage,
    PdfSaveOptions, Point, Polygon, PolygonRing, Pt, Rgb, TextItem, WindingOrder,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::model::{Invoice, InvoiceLine, Party};
use super::money::format_currency;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("amount '{value}' in {field} is not a number")]
    InvalidAmount { field: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Longer item descriptions are cut and end in `...`.
    pub description_max_len: usize,
    /// Characters of the CUFE shown in the identifiers table.
    pub unique_id_display_len: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            description_max_len: 80,
            unique_id_display_len: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub label: &'static str,
    pub value: String,
}

impl Field {
    fn new(label: &'static str, value: impl Into<String>) -> Self {
        Self {
            label,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub heading: &'static str,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemRow {
    pub id: String,
    pub description: String,
    pub quantity: String,
    pub unit_price: String,
    pub line_total: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TotalRow {
    pub label: &'static str,
    pub amount: String,
    pub emphasized: bool,
}

/// Everything the report shows, already formatted for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportModel {
    pub title: String,
    pub identifiers: Vec<Field>,
    /// Issuer then recipient; a party missing from the invoice has no section.
    pub parties: Vec<Section>,
    pub items: Vec<ItemRow>,
    /// Empty when the invoice has no monetary totals.
    pub totals: Vec<TotalRow>,
    pub validation: Section,
}

impl ReportModel {
    pub fn build(invoice: &Invoice, options: &RenderOptions) -> Result<Self, RenderError> {
        let identifiers = vec![
            Field::new("Invoice number", &invoice.number),
            Field::new(
                "Issue date",
                format!("{} {}", invoice.issue_date, invoice.issue_time),
            ),
            Field::new(
                "CUFE",
                truncate(&invoice.unique_id, options.unique_id_display_len),
            ),
            Field::new("Currency", &invoice.currency),
        ];

        let parties = [("ISSUER", &invoice.issuer), ("RECIPIENT", &invoice.recipient)]
            .into_iter()
            .filter_map(|(heading, party)| party.as_ref().map(|p| party_section(heading, p)))
            .collect();

        let items = invoice
            .lines
            .iter()
            .map(|line| item_row(line, options))
            .collect::<Result<Vec<_>, _>>()?;

        let totals = match &invoice.totals {
            Some(totals) => vec![
                TotalRow {
                    label: "Subtotal",
                    amount: format_currency("subtotal", &totals.subtotal)?,
                    emphasized: false,
                },
                TotalRow {
                    label: "Total incl. tax",
                    amount: format_currency("tax-inclusive total", &totals.tax_inclusive)?,
                    emphasized: false,
                },
                TotalRow {
                    label: "TOTAL",
                    amount: format_currency("payable total", &totals.payable)?,
                    emphasized: true,
                },
            ],
            None => Vec::new(),
        };

        let validation = Section {
            heading: "VALIDATION",
            fields: vec![
                Field::new("Authorization", &invoice.validation.authorization),
                Field::new("QR code", &invoice.validation.qr_code),
            ],
        };

        Ok(Self {
            title: "ELECTRONIC INVOICE".to_string(),
            identifiers,
            parties,
            items,
            totals,
            validation,
        })
    }
}

fn party_section(heading: &'static str, party: &Party) -> Section {
    let mut fields = vec![
        Field::new("Name", &party.name),
        Field::new("Tax ID", &party.tax_id),
        Field::new("Address", &party.address),
        Field::new("City", &party.city),
    ];
    if let Some(phone) = &party.phone {
        fields.push(Field::new("Phone", phone));
    }
    if let Some(email) = &party.email {
        fields.push(Field::new("Email", email));
    }
    Section { heading, fields }
}

fn item_row(line: &InvoiceLine, options: &RenderOptions) -> Result<ItemRow, RenderError> {
    Ok(ItemRow {
        id: line.id.clone(),
        description: truncate(&line.description, options.description_max_len),
        quantity: line.quantity.clone(),
        unit_price: format_currency(&format!("line {} unit price", line.id), &line.unit_price)?,
        line_total: format_currency(&format!("line {} total", line.id), &line.line_total)?,
    })
}

/// First `max` characters of `text`, with `...` appended only if something was cut.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

pub fn render_report(invoice: &Invoice, options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
    let model = ReportModel::build(invoice, options)?;
    Ok(render_pdf(&model))
}

pub fn render_pdf(model: &ReportModel) -> Vec<u8> {
    let pages = layout(model);
    info!(pages = pages.len(), items = model.items.len(), "[INVOICE] Laid out report");

    // Raw `Tj` operators carry the Windows-1252 text and are dropped in secure mode.
    let options = PdfSaveOptions {
        secure: false,
        ..PdfSaveOptions::default()
    };
    let mut warnings = Vec::new();
    let bytes = PdfDocument::new(&model.title)
        .with_pages(pages)
        .save(&options, &mut warnings);
    if !warnings.is_empty() {
        debug!(count = warnings.len(), "[INVOICE] PDF writer reported warnings");
    }
    bytes
}

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
/// 72pt on the left, right and top.
const MARGIN: f32 = 25.4;
/// 18pt.
const BOTTOM_MARGIN: f32 = 6.35;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const PT_TO_MM: f32 = 0.3528;

const TITLE_SIZE: f32 = 16.0;
const HEADING_SIZE: f32 = 12.0;
const BODY_SIZE: f32 = 9.0;
const TABLE_SIZE: f32 = 7.0;
const EMPHASIS_SIZE: f32 = 11.0;

const LABEL_WIDTH: f32 = 40.0;
/// (header, x offset from the margin, width) for each item column.
const ITEM_COLUMNS: [(&str, f32, f32); 5] = [
    ("ID", 0.0, 10.0),
    ("Description", 10.0, 95.0),
    ("Qty", 105.0, 14.0),
    ("Unit price", 119.0, 20.0),
    ("Total", 139.0, CONTENT_WIDTH - 139.0),
];
const TOTALS_LABEL_X: f32 = 85.0;
const TOTALS_AMOUNT_X: f32 = 125.0;

fn line_height(size: f32) -> f32 {
    size * PT_TO_MM * 1.4
}

/// Rough Helvetica capacity of a column, in characters.
fn chars_fitting(width: f32, size: f32) -> usize {
    (width / (size * PT_TO_MM * 0.5)).floor().max(1.0) as usize
}

/// `text` in Windows-1252, the byte encoding of the built-in fonts.
fn win_ansi(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    let mut buf = [0u8; 4];
    for c in text.chars() {
        let (encoded, _, unmappable) = WINDOWS_1252.encode(c.encode_utf8(&mut buf));
        if unmappable {
            bytes.push(b'?');
        } else {
            bytes.extend_from_slice(&encoded);
        }
    }
    bytes
}

/// Show `text` with a built-in font. ASCII goes through printpdf unchanged;
/// anything else is written as a hex string of Windows-1252 bytes.
fn show_text(text: &str, font: BuiltinFont) -> Vec<Op> {
    if text.is_ascii() {
        return vec![Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(text.to_string())],
            font,
        }];
    }
    vec![
        // Emits nothing, but registers `font` in the page resources.
        Op::WriteTextBuiltinFont {
            items: Vec::new(),
            font,
        },
        Op::Unknown {
            key: "Tj".to_string(),
            value: vec![DictItem::String {
                data: win_ansi(text),
                literal: false,
            }],
        },
    ]
}

fn grey(level: f32) -> Color {
    Color::Rgb(Rgb::new(level, level, level, None))
}

/// Top-down page writer. `cursor` is the top of the next line, in mm from the page bottom.
struct Layout {
    pages: Vec<PdfPage>,
    ops: Vec<Op>,
    cursor: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            ops: Vec::new(),
            cursor: PAGE_HEIGHT - MARGIN,
        }
    }

    fn break_page(&mut self) {
        let ops = std::mem::take(&mut self.ops);
        self.pages.push(PdfPage::new(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), ops));
        self.cursor = PAGE_HEIGHT - MARGIN;
    }

    /// Start a new page unless `height` still fits; true if a page was started.
    fn reserve(&mut self, height: f32) -> bool {
        if self.cursor - height >= BOTTOM_MARGIN {
            false
        } else {
            self.break_page();
            true
        }
    }

    fn advance(&mut self, height: f32) {
        self.cursor -= height;
    }

    fn text(&mut self, x: f32, size: f32, font: BuiltinFont, text: &str) {
        let baseline = self.cursor - size * PT_TO_MM;
        self.ops.extend([
            Op::StartTextSection,
            Op::SetTextCursor {
                pos: Point::new(Mm(MARGIN + x), Mm(baseline)),
            },
            Op::SetFontSizeBuiltinFont {
                size: Pt(size),
                font,
            },
        ]);
        self.ops.extend(show_text(text, font));
        self.ops.push(Op::EndTextSection);
    }

    /// Shaded band across the content width, from the cursor down by `height`.
    fn band(&mut self, x: f32, width: f32, height: f32, level: f32) {
        let (left, right) = (MARGIN + x, MARGIN + x + width);
        let (top, bottom) = (self.cursor, self.cursor - height);
        let points = [(left, top), (right, top), (right, bottom), (left, bottom)]
            .into_iter()
            .map(|(x, y)| LinePoint {
                p: Point::new(Mm(x), Mm(y)),
                bezier: false,
            })
            .collect();
        self.ops.extend([
            Op::SetFillColor { col: grey(level) },
            Op::DrawPolygon {
                polygon: Polygon {
                    rings: vec![PolygonRing { points }],
                    mode: PaintMode::Fill,
                    winding_order: WindingOrder::NonZero,
                },
            },
            Op::SetFillColor { col: grey(0.0) },
        ]);
    }

    fn rule(&mut self) {
        let points = [MARGIN, MARGIN + CONTENT_WIDTH]
            .into_iter()
            .map(|x| LinePoint {
                p: Point::new(Mm(x), Mm(self.cursor)),
                bezier: false,
            })
            .collect();
        self.ops.extend([
            Op::SetOutlineColor { col: grey(0.6) },
            Op::SetOutlineThickness { pt: Pt(0.5) },
            Op::DrawLine {
                line: Line {
                    points,
                    is_closed: false,
                },
            },
        ]);
    }

    fn finish(mut self) -> Vec<PdfPage> {
        if !self.ops.is_empty() || self.pages.is_empty() {
            self.break_page();
        }
        self.pages
    }
}

fn layout(model: &ReportModel) -> Vec<PdfPage> {
    let mut page = Layout::new();

    page.text(0.0, TITLE_SIZE, BuiltinFont::HelveticaBold, &model.title);
    page.advance(line_height(TITLE_SIZE) + 4.0);

    fields(&mut page, &model.identifiers);
    for section in &model.parties {
        heading(&mut page, section.heading);
        fields(&mut page, &section.fields);
    }

    if !model.items.is_empty() {
        heading(&mut page, "ITEMS");
        items(&mut page, &model.items);
    }

    if !model.totals.is_empty() {
        heading(&mut page, "TOTALS");
        totals(&mut page, &model.totals);
    }

    heading(&mut page, model.validation.heading);
    fields(&mut page, &model.validation.fields);

    page.finish()
}

fn heading(page: &mut Layout, text: &str) {
    let height = line_height(HEADING_SIZE) + 2.0;
    // keep the heading with at least one row
    page.reserve(height + line_height(BODY_SIZE) + 4.0);
    page.advance(4.0);
    page.text(0.0, HEADING_SIZE, BuiltinFont::HelveticaBold, text);
    page.advance(height);
}

fn fields(page: &mut Layout, fields: &[Field]) {
    let value_chars = chars_fitting(CONTENT_WIDTH - LABEL_WIDTH, BODY_SIZE);
    let lh = line_height(BODY_SIZE);
    for field in fields {
        let lines = wrap(&field.value, value_chars);
        page.reserve(lh * lines.len() as f32);
        page.text(0.0, BODY_SIZE, BuiltinFont::HelveticaBold, field.label);
        for line in &lines {
            page.text(LABEL_WIDTH, BODY_SIZE, BuiltinFont::Helvetica, line);
            page.advance(lh);
        }
    }
}

fn item_header(page: &mut Layout) {
    let lh = line_height(TABLE_SIZE) + 1.0;
    page.band(0.0, CONTENT_WIDTH, lh, 0.85);
    for (title, x, _) in ITEM_COLUMNS {
        page.text(x + 0.5, TABLE_SIZE, BuiltinFont::HelveticaBold, title);
    }
    page.advance(lh);
}

fn items(page: &mut Layout, rows: &[ItemRow]) {
    let lh = line_height(TABLE_SIZE);
    page.reserve(2.0 * lh + 2.0);
    item_header(page);

    for row in rows {
        let cells = [
            &row.id,
            &row.description,
            &row.quantity,
            &row.unit_price,
            &row.line_total,
        ];
        let wrapped: Vec<Vec<String>> = cells
            .iter()
            .zip(ITEM_COLUMNS)
            .map(|(cell, (_, _, width))| wrap(cell, chars_fitting(width - 1.0, TABLE_SIZE)))
            .collect();
        let height = lh * wrapped.iter().map(Vec::len).max().unwrap_or(1) as f32 + 0.5;

        if page.reserve(height) {
            item_header(page);
        }
        let top = page.cursor;
        for (lines, (_, x, _)) in wrapped.iter().zip(ITEM_COLUMNS) {
            page.cursor = top;
            for line in lines {
                page.text(x + 0.5, TABLE_SIZE, BuiltinFont::Helvetica, line);
                page.advance(lh);
            }
        }
        page.cursor = top - height;
        page.rule();
    }
}

fn totals(page: &mut Layout, rows: &[TotalRow]) {
    for row in rows {
        let (size, font) = if row.emphasized {
            (EMPHASIS_SIZE, BuiltinFont::HelveticaBold)
        } else {
            (BODY_SIZE, BuiltinFont::Helvetica)
        };
        let height = line_height(size);
        page.reserve(height);
        if row.emphasized {
            page.band(TOTALS_LABEL_X - 1.0, CONTENT_WIDTH - TOTALS_LABEL_X + 1.0, height, 0.9);
        }
        page.text(TOTALS_LABEL_X, size, font, row.label);
        page.text(TOTALS_AMOUNT_X, size, font, &row.amount);
        page.advance(height);
    }
}

/// Word-wrap to `width` characters; words longer than a line are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if word_len > width {
            let chars: Vec<char> = word.chars().collect();
            for chunk in chars.chunks(width) {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                }
                current = chunk.iter().collect();
                current_len = chunk.len();
            }
            continue;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if current_len > 0 || lines.is_empty() {
        lines.push(current);
    }
    lines
}
