//! Shared helper functions for CLI commands
//!
//! This module contains utility functions that are used across multiple
//! command modules to avoid code duplication.

use console::style;
use miette::{IntoDiagnostic, Result};
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::args::OutputFormat;

/// Truncate a string to max_len characters, adding "..." if truncated
///
/// Useful for table columns that need fixed-width output.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Column definition for [`print_rows`]: header text and display width
pub struct Column {
    pub header: &'static str,
    pub width: usize,
}

impl Column {
    pub const fn new(header: &'static str, width: usize) -> Self {
        Self { header, width }
    }
}

/// Print a list as aligned columns, CSV or a markdown table
///
/// `Auto` falls back to aligned columns. JSON, YAML and ID output carry
/// typed data and are handled by each command before calling this.
pub fn print_rows(format: OutputFormat, columns: &[Column], rows: &[Vec<String>]) -> Result<()> {
    match format {
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            writer
                .write_record(columns.iter().map(|c| c.header))
                .into_diagnostic()?;
            for row in rows {
                writer.write_record(row).into_diagnostic()?;
            }
            writer.flush().into_diagnostic()?;
        }
        OutputFormat::Md => {
            let mut builder = Builder::default();
            builder.push_record(columns.iter().map(|c| c.header));
            for row in rows {
                builder.push_record(row.iter().map(String::as_str));
            }
            println!("{}", builder.build().with(Style::markdown()));
        }
        _ => {
            for column in columns {
                print!("{:<width$} ", style(column.header).bold(), width = column.width);
            }
            println!();
            println!(
                "{}",
                "-".repeat(columns.iter().map(|c| c.width + 1).sum::<usize>())
            );
            for row in rows {
                for (column, cell) in columns.iter().zip(row) {
                    print!(
                        "{:<width$} ",
                        truncate_str(cell, column.width),
                        width = column.width
                    );
                }
                println!();
            }
        }
    }
    Ok(())
}

/// Print a serializable value as JSON or YAML; returns false for other formats
pub fn print_structured<T: serde::Serialize + ?Sized>(
    format: OutputFormat,
    value: &T,
) -> Result<bool> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value).into_diagnostic()?;
            println!("{}", json);
            Ok(true)
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(value).into_diagnostic()?;
            print!("{}", yaml);
            Ok(true)
        }
        _ => Ok(false),
    }
}
