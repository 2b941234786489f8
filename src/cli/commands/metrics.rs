//! `bodyshop metrics` command - shop-wide indicators

use clap::Subcommand;
use console::style;
use miette::{bail, Result};

use crate::cli::helpers::{format_date, open_shop};
use crate::cli::output::{is_human, print_list, print_value};
use crate::cli::table::{CellValue, ColumnDef, TableRow};
use crate::cli::GlobalOpts;
use crate::core::{Entity, WorkfileId};
use crate::entities::Workfile;

const RISK_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 32),
    ColumnDef::new("status", "STATUS", 16),
    ColumnDef::new("vehicle", "VEHICLE", 26),
    ColumnDef::new("ecd", "ECD", 16),
    ColumnDef::new("ordered", "LAST ORDER", 16),
];

#[derive(Subcommand, Debug)]
pub enum MetricsCommands {
    /// Dashboard summary
    Summary,

    /// Cycle time of one workfile in days
    CycleTime {
        /// Workfile id
        id: String,
    },

    /// Workfiles whose last parts order landed shortly before completion
    LastMinute,

    /// Open workfiles past their estimated completion date
    Overdue,

    /// Workfiles with pending paint work under a bad forecast
    PaintRisks,
}

pub fn run(cmd: MetricsCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        MetricsCommands::Summary => run_summary(global),
        MetricsCommands::CycleTime { id } => run_cycle_time(id, global),
        MetricsCommands::LastMinute => {
            let shop = open_shop(global)?;
            let found = shop.metrics().get_last_minute_parts_orders();
            print_list(&found, global, RISK_COLUMNS, "last-minute orders", risk_to_row)
        }
        MetricsCommands::Overdue => {
            let shop = open_shop(global)?;
            let found = shop.metrics().get_overdue_workfiles();
            print_list(&found, global, RISK_COLUMNS, "overdue workfiles", risk_to_row)
        }
        MetricsCommands::PaintRisks => {
            let shop = open_shop(global)?;
            let found = shop.metrics().get_paint_schedule_risks();
            print_list(&found, global, RISK_COLUMNS, "paint risks", risk_to_row)
        }
    }
}

fn risk_to_row(wf: &Workfile) -> TableRow {
    TableRow::new()
        .cell("id", CellValue::Id(wf.id.to_string()))
        .cell("status", CellValue::Text(wf.status.to_string()))
        .cell("vehicle", CellValue::Text(wf.title()))
        .cell("ecd", CellValue::Date(wf.estimated_completion_date))
        .cell("ordered", CellValue::Date(wf.parts.last_order_date))
}

fn run_summary(global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let summary = shop.metrics().summary();

    if !is_human(global) {
        return print_value(&summary, global);
    }

    println!("{}", style("Opportunities").bold());
    for (status, count) in &summary.opportunities {
        println!("  {:<18} {}", status, count);
    }
    println!("  {:<18} {}", "archived", summary.archived_opportunities);

    println!("{}", style("Workfiles").bold());
    for (status, count) in &summary.workfiles {
        println!("  {:<18} {}", status, count);
    }

    println!("{}", style("Indicators").bold());
    println!("  {:<18} {:.1}%", "parts returned", summary.parts_return_rate);
    match summary.average_cycle_time {
        Some(avg) => println!("  {:<18} {:.1} day(s)", "avg cycle time", avg),
        None => println!("  {:<18} -", "avg cycle time"),
    }
    let flag = |n: usize| {
        if n > 0 {
            style(n.to_string()).red()
        } else {
            style(n.to_string()).green()
        }
    };
    println!("  {:<18} {}", "overdue", flag(summary.overdue));
    println!("  {:<18} {}", "last-minute parts", flag(summary.last_minute_orders));
    println!("  {:<18} {}", "paint risks", flag(summary.paint_risks));
    Ok(())
}

fn run_cycle_time(id: String, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let wf_id = WorkfileId::from(id.as_str());
    let Some(wf) = shop.workfile(&wf_id) else {
        bail!("workfile not found: {}", id);
    };
    let days = shop.metrics().calculate_cycle_time(&wf_id).or(wf.cycle_time);

    if !is_human(global) {
        return print_value(&days, global);
    }
    match days {
        Some(days) => println!(
            "{}: {} day(s) since {}",
            style(&wf.id).cyan(),
            days,
            format_date(wf.in_date)
        ),
        None => println!("{}: no cycle time for status {}", wf.id, wf.status),
    }
    Ok(())
}
