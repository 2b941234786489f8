//! Tabular list output shared by the list commands

use chrono::{DateTime, Utc};
use miette::{IntoDiagnostic, Result};
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::helpers::truncate_str;
use crate::cli::OutputFormat;

/// One column of a list
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub key: &'static str,
    pub header: &'static str,
    /// Truncation width for TSV and table output
    pub width: usize,
}

impl ColumnDef {
    pub const fn new(key: &'static str, header: &'static str, width: usize) -> Self {
        Self { key, header, width }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Id(String),
    Text(String),
    Number(i64),
    Hours(f64),
    Date(Option<DateTime<Utc>>),
    Flag(bool),
    Empty,
}

impl CellValue {
    fn render(&self) -> String {
        match self {
            CellValue::Id(s) | CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Hours(h) => format!("{:.1}", h),
            CellValue::Date(Some(d)) => d.format("%Y-%m-%d %H:%M").to_string(),
            CellValue::Date(None) | CellValue::Empty => "-".to_string(),
            CellValue::Flag(true) => "yes".to_string(),
            CellValue::Flag(false) => "no".to_string(),
        }
    }
}

/// A row, keyed by column
#[derive(Debug, Clone, Default)]
pub struct TableRow {
    cells: Vec<(&'static str, CellValue)>,
}

impl TableRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell(mut self, key: &'static str, value: CellValue) -> Self {
        self.cells.push((key, value));
        self
    }

    fn get(&self, key: &str) -> Option<&CellValue> {
        self.cells.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    fn render(&self, column: &ColumnDef, truncate: bool) -> String {
        let text = self.get(column.key).map(CellValue::render).unwrap_or_default();
        // Ids are never truncated
        match self.get(column.key) {
            Some(CellValue::Id(_)) => text,
            _ if truncate => truncate_str(&text, column.width),
            _ => text,
        }
    }
}

pub struct TableFormatter {
    columns: &'static [ColumnDef],
}

impl TableFormatter {
    pub fn new(columns: &'static [ColumnDef]) -> Self {
        Self { columns }
    }

    /// Print rows as TSV, CSV or a boxed table
    pub fn output(&self, rows: &[TableRow], format: OutputFormat) -> Result<()> {
        print!("{}", self.render(rows, format)?);
        Ok(())
    }

    pub fn render(&self, rows: &[TableRow], format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(Vec::new());
                writer
                    .write_record(self.columns.iter().map(|c| c.key))
                    .into_diagnostic()?;
                for row in rows {
                    writer
                        .write_record(self.columns.iter().map(|c| row.render(c, false)))
                        .into_diagnostic()?;
                }
                let bytes = writer
                    .into_inner()
                    .map_err(|e| miette::miette!("{}", e.error()))?;
                String::from_utf8(bytes).into_diagnostic()
            }
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(self.columns.iter().map(|c| c.header.to_string()));
                for row in rows {
                    builder.push_record(self.columns.iter().map(|c| row.render(c, true)));
                }
                let mut table = builder.build();
                table.with(Style::rounded());
                Ok(format!("{}\n", table))
            }
            _ => {
                let mut out = self
                    .columns
                    .iter()
                    .map(|c| c.header)
                    .collect::<Vec<_>>()
                    .join("\t");
                out.push('\n');
                for row in rows {
                    let line = self
                        .columns
                        .iter()
                        .map(|c| row.render(c, true))
                        .collect::<Vec<_>>()
                        .join("\t");
                    out.push_str(&line);
                    out.push('\n');
                }
                Ok(out)
            }
        }
    }
}
