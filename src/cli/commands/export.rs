//! `floor export` command - Tabular export of any record kind

use clap::Args;
use console::style;
use miette::{bail, IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::args::GlobalOpts;
use crate::cli::commands::utils::Workspace;
use crate::core::export::{ExportFormat, ExportSpec, Exporter, RowFilter};

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Record kind (Employee, JobCard, LeaveRequest)
    pub kind: String,

    /// Output format (default: config, then csv)
    #[arg(long = "as", short = 'a', value_enum)]
    pub output: Option<ExportFormat>,

    /// Field path to include; repeat or comma-separate (e.g. assignee.first_name, hours_per_unit())
    #[arg(long = "field", short = 'F', value_delimiter = ',', required = true)]
    pub fields: Vec<String>,

    /// Column header, one per field, in the same order
    #[arg(long = "header", short = 'H', value_delimiter = ',')]
    pub headers: Vec<String>,

    /// Row filter: path=value (exact), path!=value (differs) or path~text (contains)
    #[arg(long = "filter", short = 'w')]
    pub filters: Vec<RowFilter>,

    /// Output file (default: <kind>_<timestamp>.<ext> in the current directory)
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

pub fn run(args: ExportArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;

    let Some(kind) = canonical_kind(&ws.resolver.kinds(), &args.kind) else {
        bail!(
            "Unknown record kind '{}'. Known kinds: {}",
            args.kind,
            ws.resolver.kinds().join(", ")
        );
    };

    let format = args
        .output
        .unwrap_or_else(|| ws.config.default_export_format());

    let mut spec = ExportSpec::new(format, args.fields);
    if !args.headers.is_empty() {
        spec = spec.headers(args.headers);
    }
    for filter in args.filters {
        spec = spec.filter(filter);
    }

    let exporter = Exporter::new(&ws.resolver, &ws.store).with_pdf_row_cap(ws.config.pdf_row_cap());
    let output = exporter.export_kind(&ws.actor.name, &kind, &spec)?;

    let path = args.out.unwrap_or_else(|| PathBuf::from(&output.filename));
    std::fs::write(&path, &output.bytes).into_diagnostic()?;

    if !global.quiet {
        println!(
            "{} Exported {} {} row(s) to {}",
            style("✓").green(),
            output.rows_written,
            kind,
            style(path.display()).cyan()
        );
        if output.truncated {
            println!(
                "{} Showing first {} of {} rows; raise pdf_row_cap or export as csv for the rest",
                style("!").yellow(),
                output.rows_written,
                output.rows_total
            );
        }
        if output.failed_cells > 0 {
            println!(
                "{} {} cell(s) could not be computed and were left empty",
                style("!").yellow(),
                output.failed_cells
            );
        }
    }
    Ok(())
}

/// Match a kind name case-insensitively, ignoring `_` and `-`
fn canonical_kind(known: &[&str], requested: &str) -> Option<String> {
    let normalize = |s: &str| {
        s.chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase()
    };
    let wanted = normalize(requested);
    known
        .iter()
        .copied()
        .find(|k| normalize(*k) == wanted)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_kind() {
        let known = ["Employee", "JobCard", "LeaveRequest"];
        assert_eq!(canonical_kind(&known, "job_card").as_deref(), Some("JobCard"));
        assert_eq!(canonical_kind(&known, "EMPLOYEE").as_deref(), Some("Employee"));
        assert_eq!(canonical_kind(&known, "leave-request").as_deref(), Some("LeaveRequest"));
        assert!(canonical_kind(&known, "Invoice").is_none());
    }
}
