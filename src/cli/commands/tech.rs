//! `bodyshop tech` command - technician workload

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::open_shop;
use crate::cli::output::print_value;
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};

const LOAD_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "TECH", 16),
    ColumnDef::new("name", "NAME", 20),
    ColumnDef::new("hours", "HOURS", 8),
    ColumnDef::new("jobs", "JOBS", 5),
];

#[derive(Subcommand, Debug)]
pub enum TechCommands {
    /// Hours and jobs per technician across upcoming and in-progress work
    Workload,
}

pub fn run(cmd: TechCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        TechCommands::Workload => run_workload(global),
    }
}

fn run_workload(global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let dist = shop.scheduler().get_tech_workload_distribution();

    match global.output {
        OutputFormat::Json | OutputFormat::Yaml => return print_value(&dist, global),
        OutputFormat::Id => {
            for id in dist.keys() {
                println!("{}", id);
            }
            return Ok(());
        }
        _ => {}
    }

    if dist.is_empty() {
        println!("No technicians have active work.");
        return Ok(());
    }

    let rows: Vec<TableRow> = dist
        .iter()
        .map(|(id, load)| {
            TableRow::new()
                .cell("id", CellValue::Id(id.to_string()))
                .cell("name", CellValue::Text(load.name.clone()))
                .cell("hours", CellValue::Hours(load.hours))
                .cell("jobs", CellValue::Number(load.workfiles.len() as i64))
        })
        .collect();
    let format = match global.output {
        OutputFormat::Auto => OutputFormat::Table,
        other => other,
    };
    TableFormatter::new(LOAD_COLUMNS).output(&rows, format)?;

    if format == OutputFormat::Table {
        let total: f64 = dist.values().map(|l| l.hours).sum();
        println!(
            "{} technician(s), {} hour(s) booked",
            style(dist.len()).cyan(),
            style(format!("{:.1}", total)).yellow()
        );
    }
    Ok(())
}
