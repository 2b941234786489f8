//! `bodyshop wf` command - repair workfiles from drop-off to pickup

use chrono::{DateTime, Utc};
use clap::Subcommand;
use console::style;
use dialoguer::Confirm;
use miette::{bail, IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::helpers::{format_date, open_shop, parse_datetime};
use crate::cli::output::{is_human, print_list, print_record, print_value};
use crate::cli::table::{CellValue, ColumnDef, TableRow};
use crate::cli::{GlobalOpts, WfFilter};
use crate::core::{Entity, Shop, TechnicianId, WorkfileId};
use crate::entities::{Checkpoint, PartRecord, PartStatus, WeatherImpact, Workfile};

const WF_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 32),
    ColumnDef::new("opp", "OPPORTUNITY", 12),
    ColumnDef::new("status", "STATUS", 16),
    ColumnDef::new("vehicle", "VEHICLE", 26),
    ColumnDef::new("tech", "TECH", 16),
    ColumnDef::new("hours", "HOURS", 6),
    ColumnDef::new("ecd", "ECD", 16),
];

#[derive(Subcommand, Debug)]
pub enum WfCommands {
    /// List workfiles
    List(ListArgs),

    /// Show a workfile with its schedule figures
    Show(IdArg),

    /// Edit paint, schedule and notes fields
    Update(UpdateArgs),

    /// Start repair work (upcoming -> in_progress)
    Start(IdArg),

    /// Move to quality control (in_progress -> qc)
    Qc(IdArg),

    /// Mark ready for pickup (qc -> ready_for_pickup)
    Ready(IdArg),

    /// Archive after the vehicle leaves
    Archive(ArchiveArgs),

    /// Assign a technician; least-loaded when --tech is omitted
    Assign(AssignArgs),

    /// Tick (or clear) a checklist item
    Check(CheckArgs),

    /// Add a line to the parts list
    PartAdd(PartAddArgs),

    /// Change the status of a parts-list line
    PartStatus(PartStatusArgs),
}

#[derive(clap::Args, Debug)]
pub struct IdArg {
    /// Workfile id
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by status
    #[arg(long, short = 's', value_enum, default_value = "active")]
    pub status: WfFilter,

    /// Only workfiles assigned to this technician id
    #[arg(long)]
    pub tech: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    /// Workfile id
    pub id: String,

    /// Estimated completion date
    #[arg(long, value_parser = parse_datetime)]
    pub ecd: Option<DateTime<Utc>>,

    /// Repair needs paint work
    #[arg(long)]
    pub paint: Option<bool>,

    /// Paint work finished
    #[arg(long)]
    pub paint_done: Option<bool>,

    /// Forecast threatens paint work
    #[arg(long)]
    pub paint_weather: Option<bool>,

    #[arg(long)]
    pub forecast: Option<String>,

    /// Repair order number
    #[arg(long)]
    pub ro: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ArchiveArgs {
    /// Workfile id
    pub id: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct AssignArgs {
    /// Workfile id
    pub id: String,

    /// Technician id (e.g. TECH-ALEX)
    #[arg(long)]
    pub tech: Option<String>,

    /// Technician display name, defaults to the id
    #[arg(long, requires = "tech")]
    pub name: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Workfile id
    pub id: String,

    /// voil, 4_corners, pre_scan, post_scan or qc
    pub checkpoint: Checkpoint,

    /// Clear the checkpoint instead
    #[arg(long)]
    pub undo: bool,
}

#[derive(clap::Args, Debug)]
pub struct PartAddArgs {
    /// Workfile id
    pub id: String,

    /// Part description
    pub name: String,

    #[arg(long, default_value_t = 1)]
    pub qty: u32,

    #[arg(long, default_value_t = 0.0)]
    pub price: f64,

    #[arg(long)]
    pub part_number: Option<String>,

    /// Core part (returnable for credit)
    #[arg(long)]
    pub core: bool,

    /// Initial status
    #[arg(long, default_value = "to_order")]
    pub status: PartStatus,
}

#[derive(clap::Args, Debug)]
pub struct PartStatusArgs {
    /// Workfile id
    pub id: String,

    /// Zero-based line index
    pub index: usize,

    /// to_order, ordered, received or returned
    pub status: PartStatus,
}

/// What `wf show` prints beyond the stored record
#[derive(Serialize)]
struct WorkfileView<'a> {
    #[serde(flatten)]
    workfile: &'a Workfile,
    days_until_completion: Option<i64>,
    current_cycle_time: Option<i64>,
    paint_at_risk: bool,
}

pub fn run(cmd: WfCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        WfCommands::List(args) => run_list(args, global),
        WfCommands::Show(args) => run_show(args, global),
        WfCommands::Update(args) => run_update(args, global),
        WfCommands::Start(args) => run_step(args, global, Step::Start),
        WfCommands::Qc(args) => run_step(args, global, Step::Qc),
        WfCommands::Ready(args) => run_step(args, global, Step::Ready),
        WfCommands::Archive(args) => run_archive(args, global),
        WfCommands::Assign(args) => run_assign(args, global),
        WfCommands::Check(args) => run_check(args, global),
        WfCommands::PartAdd(args) => run_part_add(args, global),
        WfCommands::PartStatus(args) => run_part_status(args, global),
    }
}

fn wf_to_row(wf: &Workfile) -> TableRow {
    let (tech, hours) = match &wf.assigned_tech {
        Some(t) => (CellValue::Text(t.name.clone()), CellValue::Hours(t.hours_assigned)),
        None => (CellValue::Empty, CellValue::Empty),
    };
    TableRow::new()
        .cell("id", CellValue::Id(wf.id.to_string()))
        .cell("opp", CellValue::Id(wf.opportunity_id.to_string()))
        .cell("status", CellValue::Text(wf.status.to_string()))
        .cell("vehicle", CellValue::Text(wf.title()))
        .cell("tech", tech)
        .cell("hours", hours)
        .cell("ecd", CellValue::Date(wf.estimated_completion_date))
}

fn load(shop: &Shop, id: &str) -> Result<Workfile> {
    match shop.workfile(&WorkfileId::from(id)) {
        Some(wf) => Ok(wf),
        None => bail!("workfile not found: {}", id),
    }
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let tech = args.tech.map(TechnicianId::from);
    let workfiles: Vec<Workfile> = shop
        .workfiles()
        .into_iter()
        .filter(|wf| args.status.matches(wf.status))
        .filter(|wf| match &tech {
            Some(t) => wf.assigned_tech.as_ref().is_some_and(|a| &a.id == t),
            None => true,
        })
        .collect();
    print_list(&workfiles, global, WF_COLUMNS, "workfiles", wf_to_row)
}

fn run_show(args: IdArg, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let wf = load(&shop, &args.id)?;
    if global.output == crate::cli::OutputFormat::Id {
        return print_record(&wf, global);
    }

    let metrics = shop.metrics();
    let view = WorkfileView {
        workfile: &wf,
        days_until_completion: metrics.days_until_completion(&wf.id),
        current_cycle_time: metrics.calculate_cycle_time(&wf.id),
        paint_at_risk: metrics.check_weather_impact(&wf.id) && wf.paint_pending(),
    };
    print_value(&view, global)
}

fn run_update(args: UpdateArgs, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let updated = shop
        .update_workfile(&WorkfileId::from(args.id.as_str()), |wf| {
            if args.ecd.is_some() {
                wf.estimated_completion_date = args.ecd;
            }
            if let Some(paint) = args.paint {
                wf.requires_paint = paint;
            }
            if let Some(done) = args.paint_done {
                wf.paint_completed = done;
            }
            if args.paint_weather.is_some() || args.forecast.is_some() {
                let weather = wf.weather_impact.get_or_insert_with(WeatherImpact::default);
                if let Some(affects) = args.paint_weather {
                    weather.affects_paint = affects;
                }
                if args.forecast.is_some() {
                    weather.forecast = args.forecast;
                }
            }
            if args.ro.is_some() {
                wf.ro_number = args.ro;
            }
            if args.notes.is_some() {
                wf.notes = args.notes;
            }
        })
        .into_diagnostic()?;

    if is_human(global) {
        println!("{} Updated {}", style("✓").green(), style(&updated.id).cyan());
        Ok(())
    } else {
        print_record(&updated, global)
    }
}

#[derive(Clone, Copy)]
enum Step {
    Start,
    Qc,
    Ready,
}

fn run_step(args: IdArg, global: &GlobalOpts, step: Step) -> Result<()> {
    let shop = open_shop(global)?;
    let id = WorkfileId::from(args.id.as_str());
    let flow = shop.workfile_lifecycle();
    let wf = match step {
        Step::Start => flow.start_repair_work(&id),
        Step::Qc => flow.move_to_qc(&id),
        Step::Ready => flow.move_to_ready_for_pickup(&id),
    }
    .into_diagnostic()?;

    if !is_human(global) {
        return print_record(&wf, global);
    }
    println!(
        "{} {} is now {}",
        style("✓").green(),
        style(&wf.id).cyan(),
        style(wf.status).yellow()
    );
    if let (Step::Start, Some(tech)) = (step, &wf.assigned_tech) {
        println!("  Technician: {} ({:.1}h)", tech.name, tech.hours_assigned);
    }
    Ok(())
}

fn run_archive(args: ArchiveArgs, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let wf = load(&shop, &args.id)?;

    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Archive {} ({})?", wf.id, wf.title()))
            .default(false)
            .interact()
            .into_diagnostic()?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let archived = shop
        .workfile_lifecycle()
        .archive_workfile(&wf.id)
        .into_diagnostic()?;

    if !is_human(global) {
        return print_record(&archived, global);
    }
    println!("{} Archived {}", style("✓").green(), style(&archived.id).cyan());
    if let Some(days) = archived.cycle_time {
        println!("  Cycle time: {} day(s)", days);
    }
    println!("  Vehicle out: {}", format_date(archived.vehicle_out_date));
    Ok(())
}

fn run_assign(args: AssignArgs, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let id = WorkfileId::from(args.id.as_str());
    let scheduler = shop.scheduler();

    let tech = match args.tech {
        Some(tech) => {
            let name = args.name.unwrap_or_else(|| tech.clone());
            scheduler
                .assign_tech(&id, TechnicianId::from(tech), name)
                .into_diagnostic()?
        }
        None => match scheduler.auto_assign_tech(&id).into_diagnostic()? {
            Some(tech) => tech,
            None => {
                return Err(miette::miette!(
                    help = "assign someone with `bodyshop wf assign <ID> --tech <TECH>`",
                    "no technicians with active work to choose from"
                ))
            }
        },
    };

    if is_human(global) {
        println!(
            "{} {} assigned to {} ({:.1}h)",
            style("✓").green(),
            style(&tech.name).cyan(),
            id,
            tech.hours_assigned
        );
        Ok(())
    } else {
        print_value(&tech, global)
    }
}

fn run_check(args: CheckArgs, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let wf = shop
        .workfile_lifecycle()
        .record_checkpoint(&WorkfileId::from(args.id.as_str()), args.checkpoint, !args.undo)
        .into_diagnostic()?;

    if is_human(global) {
        let mark = if args.undo { style("✗").red() } else { style("✓").green() };
        println!("{} {} on {}", mark, args.checkpoint, style(&wf.id).cyan());
        Ok(())
    } else {
        print_record(&wf, global)
    }
}

fn run_part_add(args: PartAddArgs, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let mut part = PartRecord::new(args.name, args.qty, args.price);
    part.part_number = args.part_number;
    part.is_core = args.core;
    part.status = args.status;

    let wf = shop
        .workfile_lifecycle()
        .add_part(&WorkfileId::from(args.id.as_str()), part)
        .into_diagnostic()?;

    if is_human(global) {
        println!(
            "{} Part #{} added to {} ({} to order)",
            style("✓").green(),
            wf.parts.list.len() - 1,
            style(&wf.id).cyan(),
            wf.parts.to_order_count()
        );
        Ok(())
    } else {
        print_record(&wf, global)
    }
}

fn run_part_status(args: PartStatusArgs, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let wf = shop
        .workfile_lifecycle()
        .set_part_status(&WorkfileId::from(args.id.as_str()), args.index, args.status)
        .into_diagnostic()?;

    if is_human(global) {
        println!(
            "{} Part #{} on {} is now {}",
            style("✓").green(),
            args.index,
            style(&wf.id).cyan(),
            args.status
        );
        Ok(())
    } else {
        print_record(&wf, global)
    }
}
