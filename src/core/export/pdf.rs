//! PDF output: landscape A4, header row repeated on every page

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};

use super::table::Table;
use super::ExportError;

const PAGE_WIDTH: f32 = 297.0;
const PAGE_HEIGHT: f32 = 210.0;
const MARGIN: f32 = 12.0;
const LINE_HEIGHT: f32 = 6.0;
const TITLE_SIZE: f32 = 13.0;
const TEXT_SIZE: f32 = 8.0;
/// Approximate Helvetica glyph width at TEXT_SIZE
const CHAR_WIDTH: f32 = 1.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Title,
    Header,
    Body,
}

/// One run of text at a position on a page, in millimetres
#[derive(Debug, Clone, PartialEq)]
struct Placed {
    text: String,
    x: f32,
    y: f32,
    style: Style,
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

pub(super) fn write(table: &Table, title: &str) -> Result<Vec<u8>, ExportError> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(pdf_error)?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error)?,
    };

    for (idx, page) in layout(table, title).iter().enumerate() {
        let (page_idx, layer_idx) = if idx == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1")
        };
        let layer = doc.get_page(page_idx).get_layer(layer_idx);
        for placed in page {
            let (size, font) = match placed.style {
                Style::Title => (TITLE_SIZE, &fonts.bold),
                Style::Header => (TEXT_SIZE, &fonts.bold),
                Style::Body => (TEXT_SIZE, &fonts.regular),
            };
            layer.use_text(placed.text.as_str(), size, Mm(placed.x), Mm(placed.y), font);
        }
    }

    doc.save_to_bytes().map_err(pdf_error)
}

/// Place every piece of text, page by page
fn layout(table: &Table, title: &str) -> Vec<Vec<Placed>> {
    let columns = table.headers.len().max(1);
    let column_width = (PAGE_WIDTH - 2.0 * MARGIN) / columns as f32;
    let max_chars = ((column_width / CHAR_WIDTH) as usize).max(4);

    let row_at = |cells: &[String], y: f32, style: Style| -> Vec<Placed> {
        cells
            .iter()
            .enumerate()
            .map(|(idx, text)| Placed {
                text: clip(text, max_chars),
                x: MARGIN + column_width * idx as f32,
                y,
                style,
            })
            .collect()
    };

    let mut y = PAGE_HEIGHT - MARGIN;
    let mut page = vec![Placed {
        text: title.to_string(),
        x: MARGIN,
        y,
        style: Style::Title,
    }];
    y -= LINE_HEIGHT * 1.5;

    if let Some(notice) = table.notice() {
        page.push(Placed {
            text: notice,
            x: MARGIN,
            y,
            style: Style::Body,
        });
        y -= LINE_HEIGHT;
    }

    page.extend(row_at(&table.headers, y, Style::Header));
    y -= LINE_HEIGHT;

    let mut pages = Vec::new();
    for row in table.rendered_rows() {
        if y < MARGIN {
            pages.push(std::mem::take(&mut page));
            y = PAGE_HEIGHT - MARGIN;
            page.extend(row_at(&table.headers, y, Style::Header));
            y -= LINE_HEIGHT;
        }
        page.extend(row_at(&row, y, Style::Body));
        y -= LINE_HEIGHT;
    }
    pages.push(page);
    pages
}

/// Shorten text to fit a column, on a char boundary
fn clip(text: &str, max_chars: usize) -> String {
    let single_line = text.replace(['\n', '\r'], " ");
    if single_line.chars().count() <= max_chars {
        single_line
    } else {
        let kept: String = single_line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn pdf_error(e: printpdf::Error) -> ExportError {
    ExportError::Pdf(format!("{e:?}"))
}
