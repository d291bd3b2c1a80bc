//! XLSX output

use rust_xlsxwriter::{Format, Workbook};
use serde_json::Value;

use super::field::Cell;
use super::table::Table;
use super::ExportError;

/// Characters Excel rejects in sheet names
const INVALID_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];
const MAX_SHEET_NAME: usize = 31;

pub(super) fn write(table: &Table, sheet_name: &str) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(clean_sheet_name(sheet_name))?;

    for (col, header) in table.headers.iter().enumerate() {
        sheet.write_string_with_format(0, column(col)?, header, &bold)?;
    }

    for (idx, row) in table.rows.iter().enumerate() {
        let row_num = u32::try_from(idx + 1).map_err(|_| ExportError::TooLarge)?;
        for (col, cell) in row.iter().enumerate() {
            let col = column(col)?;
            match cell {
                Cell::Value(Value::Number(n)) => match n.as_f64() {
                    Some(number) => {
                        sheet.write_number(row_num, col, number)?;
                    }
                    None => {
                        sheet.write_string(row_num, col, n.to_string())?;
                    }
                },
                Cell::Value(Value::Bool(b)) => {
                    sheet.write_boolean(row_num, col, *b)?;
                }
                Cell::Value(Value::Null) | Cell::Empty | Cell::Failed => {}
                other => {
                    sheet.write_string(row_num, col, other.render())?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn column(idx: usize) -> Result<u16, ExportError> {
    u16::try_from(idx).map_err(|_| ExportError::TooLarge)
}

fn clean_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !INVALID_SHEET_CHARS.contains(c))
        .take(MAX_SHEET_NAME)
        .collect();
    if cleaned.trim().is_empty() {
        "Export".to_string()
    } else {
        cleaned
    }
}
