//! Output formatting utilities

use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::table::{ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Entity;

/// Determine the effective output format based on context
pub fn effective_format(format: OutputFormat, is_list: bool) -> OutputFormat {
    match format {
        OutputFormat::Auto => {
            if is_list {
                OutputFormat::Tsv
            } else {
                OutputFormat::Yaml
            }
        }
        other => other,
    }
}

/// Print a list of records in the requested format
pub fn print_list<T, F>(
    items: &[T],
    global: &GlobalOpts,
    columns: &'static [ColumnDef],
    plural: &str,
    to_row: F,
) -> Result<()>
where
    T: Entity,
    F: Fn(&T) -> TableRow,
{
    match effective_format(global.output, true) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(items).into_diagnostic()?);
        }
        OutputFormat::Id => {
            for item in items {
                println!("{}", item.id_str());
            }
        }
        format => {
            if items.is_empty() && format != OutputFormat::Csv {
                println!("No {} found.", plural);
                return Ok(());
            }
            let rows: Vec<TableRow> = items.iter().map(to_row).collect();
            TableFormatter::new(columns).output(&rows, format)?;
            if format == OutputFormat::Table {
                println!("{} {}", items.len(), plural);
            }
        }
    }
    Ok(())
}

/// Print one serializable value; tabular formats fall back to YAML
pub fn print_value<T: Serialize + ?Sized>(value: &T, global: &GlobalOpts) -> Result<()> {
    match effective_format(global.output, false) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
        }
        _ => {
            print!("{}", serde_yml::to_string(value).into_diagnostic()?);
        }
    }
    Ok(())
}

/// Print one record; `-o id` prints its id only
pub fn print_record<T: Entity>(item: &T, global: &GlobalOpts) -> Result<()> {
    if global.output == OutputFormat::Id {
        println!("{}", item.id_str());
        return Ok(());
    }
    print_value(item, global)
}

/// True when human-readable messages should be printed
pub fn is_human(global: &GlobalOpts) -> bool {
    matches!(global.output, OutputFormat::Auto | OutputFormat::Table)
}
