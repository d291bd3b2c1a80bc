//! Tabular export of any registered entity kind
//!
//! An [`ExportSpec`] names field paths, optional headers, a format and row
//! filters. The exporter evaluates each path per record, hands the resulting
//! [`Table`] to the format writer and records the export in the activity log.

mod field;
mod pdf;
mod spreadsheet;
mod table;
mod tabular;

pub use field::{Cell, FieldPath};
pub use table::Table;

use chrono::Utc;
use clap::ValueEnum;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::activity::ActivityLogger;
use crate::core::entity::{Entity, Record};
use crate::core::resolver::EntityResolver;
use crate::core::store::Store;

/// Default maximum number of rows written to a PDF
pub const DEFAULT_PDF_ROW_CAP: usize = 1000;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    /// Excel workbook
    #[value(name = "xlsx", alias = "spreadsheet")]
    #[serde(rename = "xlsx", alias = "spreadsheet")]
    Spreadsheet,
    Pdf,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Spreadsheet => "xlsx",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Spreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Pdf => "application/pdf",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" | "spreadsheet" => Ok(ExportFormat::Spreadsheet),
            "pdf" => Ok(ExportFormat::Pdf),
            _ => Err(format!("Unknown export format: {}", s)),
        }
    }
}

/// Errors raised before or while producing an export
#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    #[error("no fields requested")]
    #[diagnostic(code(floor::export::no_fields), help("pass at least one --field"))]
    NoFields,

    #[error("{headers} headers supplied for {fields} fields")]
    #[diagnostic(
        code(floor::export::header_mismatch),
        help("supply exactly one header per field, or none")
    )]
    HeaderMismatch { headers: usize, fields: usize },

    #[error("invalid field path: '{0}'")]
    #[diagnostic(code(floor::export::invalid_field))]
    InvalidField(String),

    #[error("invalid filter: '{0}'")]
    #[diagnostic(
        code(floor::export::invalid_filter),
        help("use path=value for an exact match or path~text for a substring")
    )]
    InvalidFilter(String),

    #[error("no entity kind named '{0}' is registered")]
    #[diagnostic(code(floor::export::unknown_kind))]
    UnknownKind(String),

    #[error("table is too large for the output format")]
    #[diagnostic(code(floor::export::too_large))]
    TooLarge,

    #[error("CSV error: {0}")]
    #[diagnostic(code(floor::export::csv))]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    #[diagnostic(code(floor::export::xlsx))]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("PDF error: {0}")]
    #[diagnostic(code(floor::export::pdf))]
    Pdf(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(floor::export::io))]
    Io(#[from] std::io::Error),
}

/// A single row predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    /// Rendered cell equals the value exactly
    Equals(FieldPath, String),
    /// Rendered cell differs from the value
    NotEquals(FieldPath, String),
    /// Rendered cell contains the text, ignoring case
    Contains(FieldPath, String),
}

impl RowFilter {
    pub fn matches(&self, record: &dyn Record, resolver: &EntityResolver) -> bool {
        match self {
            RowFilter::Equals(path, value) => path.evaluate(record, resolver).render() == *value,
            RowFilter::NotEquals(path, value) => path.evaluate(record, resolver).render() != *value,
            RowFilter::Contains(path, text) => path
                .evaluate(record, resolver)
                .render()
                .to_lowercase()
                .contains(&text.to_lowercase()),
        }
    }
}

impl std::str::FromStr for RowFilter {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ExportError::InvalidFilter(s.to_string());
        let (idx, op) = s
            .char_indices()
            .find(|(_, c)| matches!(c, '=' | '~' | '!'))
            .ok_or_else(invalid)?;
        let (op_len, negated) = match op {
            '!' if s[idx + 1..].starts_with('=') => (2, true),
            '!' => return Err(invalid()),
            _ => (1, false),
        };
        let path = FieldPath::parse(&s[..idx]).map_err(|_| invalid())?;
        let operand = s[idx + op_len..].trim().to_string();

        Ok(match op {
            '=' => RowFilter::Equals(path, operand),
            '!' if negated => RowFilter::NotEquals(path, operand),
            _ => RowFilter::Contains(path, operand),
        })
    }
}

/// What to export and how
#[derive(Debug, Clone)]
pub struct ExportSpec {
    pub fields: Vec<String>,
    pub headers: Option<Vec<String>>,
    pub format: ExportFormat,
    pub filters: Vec<RowFilter>,
}

impl ExportSpec {
    pub fn new<I, S>(format: ExportFormat, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            headers: None,
            format,
            filters: Vec::new(),
        }
    }

    pub fn headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(mut self, filter: RowFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Parse the field paths and check the header list against them
    pub fn validate(&self) -> Result<Vec<FieldPath>, ExportError> {
        if self.fields.is_empty() {
            return Err(ExportError::NoFields);
        }
        if let Some(headers) = &self.headers {
            if headers.len() != self.fields.len() {
                return Err(ExportError::HeaderMismatch {
                    headers: headers.len(),
                    fields: self.fields.len(),
                });
            }
        }
        self.fields.iter().map(|f| FieldPath::parse(f)).collect()
    }

    /// Header row: the supplied labels, or the field paths themselves
    pub fn header_row(&self, fields: &[FieldPath]) -> Vec<String> {
        match &self.headers {
            Some(headers) => headers.clone(),
            None => fields.iter().map(|f| f.as_str().to_string()).collect(),
        }
    }
}

/// A finished export
#[derive(Debug, Clone)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: &'static str,
    pub format: ExportFormat,
    pub rows_total: usize,
    pub rows_written: usize,
    pub truncated: bool,
    pub failed_cells: usize,
}

/// Produces exports and records each one in the activity log
pub struct Exporter<'a> {
    resolver: &'a EntityResolver,
    logger: ActivityLogger<'a>,
    pdf_row_cap: usize,
}

impl<'a> Exporter<'a> {
    pub fn new(resolver: &'a EntityResolver, store: &'a Store) -> Self {
        Self {
            resolver,
            logger: ActivityLogger::new(store),
            pdf_row_cap: DEFAULT_PDF_ROW_CAP,
        }
    }

    pub fn with_pdf_row_cap(mut self, cap: usize) -> Self {
        self.pdf_row_cap = cap;
        self
    }

    /// Export records of one kind
    pub fn export(
        &self,
        actor: &str,
        kind: &str,
        records: &[&dyn Record],
        spec: &ExportSpec,
    ) -> Result<ExportOutput, ExportError> {
        let fields = spec.validate()?;
        let headers = spec.header_row(&fields);
        let cap = (spec.format == ExportFormat::Pdf).then_some(self.pdf_row_cap);

        let table = Table::build(records, headers, &fields, &spec.filters, self.resolver, cap);

        let bytes = match spec.format {
            ExportFormat::Csv => tabular::write(&table)?,
            ExportFormat::Spreadsheet => spreadsheet::write(&table, kind)?,
            ExportFormat::Pdf => pdf::write(&table, &format!("{kind} export"))?,
        };

        if table.failed_cells > 0 {
            tracing::warn!(kind, failed = table.failed_cells, "export finished with failed cells");
        }
        tracing::info!(
            kind,
            format = %spec.format,
            rows = table.rows.len(),
            total = table.total_rows,
            "export complete"
        );
        self.logger
            .log_export(actor, kind, table.rows.len(), spec.format.extension());

        Ok(ExportOutput {
            filename: export_filename(kind, spec.format),
            content_type: spec.format.content_type(),
            format: spec.format,
            rows_total: table.total_rows,
            rows_written: table.rows.len(),
            truncated: table.truncated(),
            failed_cells: table.failed_cells,
            bytes,
        })
    }

    /// Export a typed slice of entities
    pub fn export_entities<E: Entity + Record>(
        &self,
        actor: &str,
        entities: &[E],
        spec: &ExportSpec,
    ) -> Result<ExportOutput, ExportError> {
        let records: Vec<&dyn Record> = entities.iter().map(|e| e as &dyn Record).collect();
        self.export(actor, E::KIND, &records, spec)
    }

    /// Export every live entity of a registered kind
    pub fn export_kind(
        &self,
        actor: &str,
        kind: &str,
        spec: &ExportSpec,
    ) -> Result<ExportOutput, ExportError> {
        let accessor = self
            .resolver
            .accessor(kind)
            .ok_or_else(|| ExportError::UnknownKind(kind.to_string()))?;
        let owned = accessor.all();
        let records: Vec<&dyn Record> = owned.iter().map(|r| r.as_ref()).collect();
        self.export(actor, kind, &records, spec)
    }
}

/// `<kind_snake>_<YYYYMMDD_HHMMSS>.<ext>`
pub fn export_filename(kind: &str, format: ExportFormat) -> String {
    format!(
        "{}_{}.{}",
        snake_case(kind),
        Utc::now().format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else if c.is_alphanumeric() {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::{DerivationError, Related};
    use crate::core::identity::EntityReference;
    use crate::core::resolver::MemoryAccessor;
    use serde_json::{json, Value};

    #[derive(Clone)]
    struct Gauge {
        id: String,
        label: String,
        owner: Option<String>,
        cycles: u32,
    }

    impl Entity for Gauge {
        const KIND: &'static str = "TorqueGauge";

        fn entity_id(&self) -> String {
            self.id.clone()
        }
    }

    impl Record for Gauge {
        fn attribute(&self, name: &str) -> Option<Value> {
            match name {
                "id" => Some(json!(self.id)),
                "label" => Some(json!(self.label)),
                "cycles" => Some(json!(self.cycles)),
                _ => None,
            }
        }

        fn relation(&self, name: &str) -> Option<Related<'_>> {
            match name {
                "owner" => Some(match &self.owner {
                    Some(id) => Related::Reference(EntityReference::new("Crew", id.clone())),
                    None => Related::Null,
                }),
                _ => None,
            }
        }

        fn derive(&self, name: &str) -> Option<Result<Value, DerivationError>> {
            match name {
                "wear" => Some(if self.cycles == 0 {
                    Err(DerivationError::new("wear", "never used"))
                } else {
                    Ok(json!(self.cycles / 100))
                }),
                _ => None,
            }
        }
    }

    #[derive(Clone)]
    struct Crew {
        id: String,
        name: String,
    }

    impl Entity for Crew {
        const KIND: &'static str = "Crew";

        fn entity_id(&self) -> String {
            self.id.clone()
        }
    }

    impl Record for Crew {
        fn attribute(&self, name: &str) -> Option<Value> {
            (name == "name").then(|| json!(self.name))
        }
    }

    fn gauge(n: u32, owner: Option<&str>, cycles: u32) -> Gauge {
        Gauge {
            id: format!("G-{n:04}"),
            label: format!("Gauge, bay {n}"),
            owner: owner.map(str::to_string),
            cycles,
        }
    }

    fn resolver() -> EntityResolver {
        let crews = MemoryAccessor::new();
        crews.insert(Crew {
            id: "C-1".into(),
            name: "Night shift".into(),
        });
        let mut resolver = EntityResolver::new();
        resolver.register::<Crew>(crews);
        resolver
    }

    fn read_csv(bytes: &[u8]) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(bytes);
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_csv_export_with_traversal_and_failures() {
        let store = Store::open_in_memory().unwrap();
        let resolver = resolver();
        let exporter = Exporter::new(&resolver, &store);
        let gauges = vec![
            gauge(1, Some("C-1"), 400),
            gauge(2, None, 0),
            gauge(3, Some("C-9"), 250),
        ];
        let spec = ExportSpec::new(ExportFormat::Csv, ["id", "label", "owner.name", "wear()"])
            .headers(["ID", "Label", "Owner", "Wear"]);

        let out = exporter.export_entities("sam", &gauges, &spec).unwrap();

        assert_eq!(out.rows_written, 3);
        assert_eq!(out.failed_cells, 1);
        assert!(!out.truncated);
        assert_eq!(out.content_type, "text/csv");
        assert!(out.filename.starts_with("torque_gauge_"));
        assert!(out.filename.ends_with(".csv"));

        let rows = read_csv(&out.bytes);
        assert_eq!(rows[0], vec!["ID", "Label", "Owner", "Wear"]);
        assert_eq!(rows[1], vec!["G-0001", "Gauge, bay 1", "Night shift", "4"]);
        assert_eq!(rows[2], vec!["G-0002", "Gauge, bay 2", "", ""]);
        assert_eq!(rows[3], vec!["G-0003", "Gauge, bay 3", "", "2"]);
    }

    #[test]
    fn test_headers_default_to_field_paths() {
        let store = Store::open_in_memory().unwrap();
        let resolver = resolver();
        let exporter = Exporter::new(&resolver, &store);
        let spec = ExportSpec::new(ExportFormat::Csv, ["id", "owner.name"]);

        let out = exporter.export_entities::<Gauge>("sam", &[], &spec).unwrap();
        assert_eq!(read_csv(&out.bytes), vec![vec!["id", "owner.name"]]);
    }

    #[test]
    fn test_header_mismatch_rejected_before_rows_are_read() {
        let store = Store::open_in_memory().unwrap();
        let resolver = resolver();
        let exporter = Exporter::new(&resolver, &store);
        let spec = ExportSpec::new(ExportFormat::Csv, ["id", "label"]).headers(["Only one"]);

        let err = exporter
            .export_entities("sam", &[gauge(1, None, 1)], &spec)
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::HeaderMismatch {
                headers: 1,
                fields: 2
            }
        ));
        assert_eq!(store.activity_count().unwrap(), 0);
    }

    #[test]
    fn test_no_fields_rejected() {
        let spec = ExportSpec::new(ExportFormat::Csv, Vec::<String>::new());
        assert!(matches!(spec.validate(), Err(ExportError::NoFields)));
    }

    #[test]
    fn test_export_logs_exactly_once() {
        let store = Store::open_in_memory().unwrap();
        let resolver = resolver();
        let exporter = Exporter::new(&resolver, &store);
        let spec = ExportSpec::new(ExportFormat::Csv, ["id"]);

        exporter
            .export_entities("sam", &[gauge(1, None, 1), gauge(2, None, 1)], &spec)
            .unwrap();

        let log = ActivityLogger::new(&store).recent_for(Some("sam"), 10).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action.as_str(), "EXPORT");
        assert_eq!(log[0].extra_data["entity_kind"], json!("TorqueGauge"));
        assert_eq!(log[0].extra_data["rows"], json!(2));
        assert_eq!(log[0].extra_data["format"], json!("csv"));
    }

    #[test]
    fn test_pdf_export_is_capped() {
        let store = Store::open_in_memory().unwrap();
        let resolver = resolver();
        let exporter = Exporter::new(&resolver, &store);
        let gauges: Vec<Gauge> = (0..1500).map(|n| gauge(n, None, 100)).collect();
        let spec = ExportSpec::new(ExportFormat::Pdf, ["id", "label"]);

        let out = exporter.export_entities("sam", &gauges, &spec).unwrap();

        assert!(out.bytes.starts_with(b"%PDF"));
        assert_eq!(out.rows_total, 1500);
        assert_eq!(out.rows_written, 1000);
        assert!(out.truncated);
        assert_eq!(out.content_type, "application/pdf");
    }

    #[test]
    fn test_csv_and_spreadsheet_are_not_capped() {
        let store = Store::open_in_memory().unwrap();
        let resolver = resolver();
        let exporter = Exporter::new(&resolver, &store).with_pdf_row_cap(10);
        let gauges: Vec<Gauge> = (0..25).map(|n| gauge(n, None, 100)).collect();

        for format in [ExportFormat::Csv, ExportFormat::Spreadsheet] {
            let out = exporter
                .export_entities("sam", &gauges, &ExportSpec::new(format, ["id", "cycles"]))
                .unwrap();
            assert_eq!(out.rows_written, 25);
            assert!(!out.truncated);
        }
    }

    #[test]
    fn test_spreadsheet_output_is_a_zip_container() {
        let store = Store::open_in_memory().unwrap();
        let resolver = resolver();
        let exporter = Exporter::new(&resolver, &store);
        let spec = ExportSpec::new(ExportFormat::Spreadsheet, ["id", "cycles", "owner.name"]);

        let out = exporter
            .export_entities("sam", &[gauge(1, Some("C-1"), 12)], &spec)
            .unwrap();
        assert!(out.bytes.starts_with(b"PK"));
        assert!(out.filename.ends_with(".xlsx"));
    }

    #[test]
    fn test_filters_select_rows() {
        let store = Store::open_in_memory().unwrap();
        let resolver = resolver();
        let exporter = Exporter::new(&resolver, &store);
        let gauges = vec![gauge(1, Some("C-1"), 1), gauge(2, None, 1)];

        let spec = ExportSpec::new(ExportFormat::Csv, ["id"])
            .filter("owner.name~night".parse().unwrap());
        let out = exporter.export_entities("sam", &gauges, &spec).unwrap();
        assert_eq!(read_csv(&out.bytes), vec![vec!["id"], vec!["G-0001"]]);

        let spec = ExportSpec::new(ExportFormat::Csv, ["id"]).filter("id=G-0002".parse().unwrap());
        let out = exporter.export_entities("sam", &gauges, &spec).unwrap();
        assert_eq!(out.rows_total, 1);

        let spec = ExportSpec::new(ExportFormat::Csv, ["id"]).filter("id!=G-0002".parse().unwrap());
        let out = exporter.export_entities("sam", &gauges, &spec).unwrap();
        assert_eq!(read_csv(&out.bytes), vec![vec!["id"], vec!["G-0001"]]);
    }

    #[test]
    fn test_export_kind_uses_registered_accessor() {
        let store = Store::open_in_memory().unwrap();
        let resolver = resolver();
        let exporter = Exporter::new(&resolver, &store);

        let out = exporter
            .export_kind("sam", "Crew", &ExportSpec::new(ExportFormat::Csv, ["name"]))
            .unwrap();
        assert_eq!(read_csv(&out.bytes), vec![vec!["name"], vec!["Night shift"]]);

        assert!(matches!(
            exporter.export_kind("sam", "Forklift", &ExportSpec::new(ExportFormat::Csv, ["id"])),
            Err(ExportError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_filter_parse() {
        assert!(matches!(
            "status=open".parse::<RowFilter>().unwrap(),
            RowFilter::Equals(_, ref v) if v == "open"
        ));
        assert!(matches!(
            "assignee.name~ann".parse::<RowFilter>().unwrap(),
            RowFilter::Contains(_, ref v) if v == "ann"
        ));
        match "status!=done".parse::<RowFilter>().unwrap() {
            RowFilter::NotEquals(path, value) => {
                assert_eq!(path.as_str(), "status");
                assert_eq!(value, "done");
            }
            other => panic!("expected NotEquals, got {:?}", other),
        }
        assert!("status".parse::<RowFilter>().is_err());
        assert!("=open".parse::<RowFilter>().is_err());
        assert!("status!done".parse::<RowFilter>().is_err());
        assert!("sta tus=open".parse::<RowFilter>().is_err());
    }

    #[test]
    fn test_format_parse_and_names() {
        assert_eq!("XLSX".parse::<ExportFormat>().unwrap(), ExportFormat::Spreadsheet);
        assert_eq!(ExportFormat::Pdf.extension(), "pdf");
        assert!("docx".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("JobCard"), "job_card");
        assert_eq!(snake_case("Employee"), "employee");
        assert_eq!(snake_case("LeaveRequest"), "leave_request");
    }
}
