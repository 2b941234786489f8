//! `bodyshop opp` command - leads, estimates and conversion to workfiles

use chrono::{DateTime, Utc};
use clap::Subcommand;
use console::style;
use miette::{bail, IntoDiagnostic, Result};

use crate::cli::helpers::{format_date, format_duration, open_shop, parse_datetime, read_ids_from_stdin};
use crate::cli::output::{is_human, print_list, print_record, print_value};
use crate::cli::table::{CellValue, ColumnDef, TableRow};
use crate::cli::{GlobalOpts, OppFilter};
use crate::core::{Entity, OpportunityId};
use crate::entities::{Opportunity, OpportunityStage, OpportunityStatus, WeatherImpact};

const OPP_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 12),
    ColumnDef::new("status", "STATUS", 12),
    ColumnDef::new("stage", "STAGE", 20),
    ColumnDef::new("vehicle", "VEHICLE", 28),
    ColumnDef::new("owner", "OWNER", 18),
    ColumnDef::new("drop", "DROP", 16),
    ColumnDef::new("ready", "READY", 5),
];

#[derive(Subcommand, Debug)]
pub enum OppCommands {
    /// List opportunities
    List(ListArgs),

    /// Show an opportunity
    Show(IdArg),

    /// Record a new lead
    New(NewArgs),

    /// Update inspection flags, dates and notes
    Update(UpdateArgs),

    /// Archive opportunities (ids from arguments or stdin)
    Archive(ArchiveArgs),

    /// Restore an archived opportunity
    Unarchive(IdArg),

    /// Move to new, second_call, estimate or total_loss
    Status(StatusArgs),

    /// Time left in the upload window
    Deadline(IdArg),

    /// Create a workfile from an approved estimate
    Convert(IdArg),

    /// Estimates ready to become workfiles
    Ready,

    /// Opportunities whose paint work the forecast threatens
    Weather,
}

#[derive(clap::Args, Debug)]
pub struct IdArg {
    /// Opportunity id
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by status
    #[arg(long, short = 's', value_enum, default_value = "active")]
    pub status: OppFilter,

    /// Maximum number of results
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Opportunity id as issued by the lead source (e.g. OPP-1042)
    pub id: String,

    #[arg(long)]
    pub year: Option<u16>,

    #[arg(long)]
    pub make: Option<String>,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub vin: Option<String>,

    /// Customer name
    #[arg(long)]
    pub owner: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,

    /// Insurance carrier
    #[arg(long)]
    pub carrier: Option<String>,

    #[arg(long)]
    pub claim: Option<String>,

    /// When the vehicle is dropped off (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_parser = parse_datetime)]
    pub drop_date: Option<DateTime<Utc>>,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    /// Opportunity id
    pub id: String,

    /// Insurance approval (true/false)
    #[arg(long)]
    pub approved: Option<bool>,

    /// VOIL inspection complete
    #[arg(long)]
    pub voil: Option<bool>,

    /// 4-corners inspection complete
    #[arg(long)]
    pub four_corners: Option<bool>,

    /// Progress stage (e.g. inspection, estimate_created, parts_ordered)
    #[arg(long)]
    pub stage: Option<OpportunityStage>,

    #[arg(long, value_parser = parse_datetime)]
    pub drop_date: Option<DateTime<Utc>>,

    /// Estimated completion date
    #[arg(long, value_parser = parse_datetime)]
    pub ecd: Option<DateTime<Utc>>,

    /// Repair order number
    #[arg(long)]
    pub ro: Option<String>,

    /// Estimate total
    #[arg(long)]
    pub estimate: Option<f64>,

    /// Forecast threatens paint work
    #[arg(long)]
    pub paint_weather: Option<bool>,

    #[arg(long)]
    pub forecast: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ArchiveArgs {
    /// Opportunity ids; read from stdin when omitted
    pub ids: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Opportunity id
    pub id: String,

    /// Target status
    pub status: OpportunityStatus,
}

pub fn run(cmd: OppCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        OppCommands::List(args) => run_list(args, global),
        OppCommands::Show(args) => run_show(args, global),
        OppCommands::New(args) => run_new(args, global),
        OppCommands::Update(args) => run_update(args, global),
        OppCommands::Archive(args) => run_archive(args, global),
        OppCommands::Unarchive(args) => run_unarchive(args, global),
        OppCommands::Status(args) => run_status(args, global),
        OppCommands::Deadline(args) => run_deadline(args, global),
        OppCommands::Convert(args) => run_convert(args, global),
        OppCommands::Ready => run_ready(global),
        OppCommands::Weather => run_weather(global),
    }
}

fn opp_to_row(opp: &Opportunity) -> TableRow {
    let ready = crate::core::opportunity::check_ready_for_workfile(opp).is_ok();
    TableRow::new()
        .cell("id", CellValue::Id(opp.id.to_string()))
        .cell("status", CellValue::Text(opp.status().to_string()))
        .cell("stage", CellValue::Text(opp.stage.to_string()))
        .cell("vehicle", CellValue::Text(opp.title()))
        .cell("owner", CellValue::Text(opp.owner.name.clone()))
        .cell("drop", CellValue::Date(opp.drop_date))
        .cell("ready", CellValue::Flag(ready))
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let opportunities = match args.status.status() {
        Some(status) => shop.opportunity_lifecycle().get_opportunities_by_status(status),
        None => shop
            .opportunities()
            .into_iter()
            .filter(|o| args.status.matches(o))
            .collect(),
    };
    let limited: Vec<Opportunity> = opportunities
        .into_iter()
        .take(args.limit.unwrap_or(usize::MAX))
        .collect();
    print_list(&limited, global, OPP_COLUMNS, "opportunities", opp_to_row)
}

fn run_show(args: IdArg, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let Some(opp) = shop.opportunity(&OpportunityId::from(args.id.as_str())) else {
        bail!("opportunity not found: {}", args.id);
    };
    print_record(&opp, global)
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let mut opp = Opportunity::new(args.id.as_str(), shop.now());
    opp.vehicle.year = args.year;
    opp.vehicle.make = args.make.unwrap_or_default();
    opp.vehicle.model = args.model.unwrap_or_default();
    opp.vehicle.vin = args.vin;
    opp.owner.name = args.owner.unwrap_or_default();
    opp.owner.phone = args.phone;
    opp.insurance.carrier = args.carrier;
    opp.insurance.claim_number = args.claim;
    opp.drop_date = args.drop_date;
    opp.notes = args.notes;

    shop.add_opportunity(opp).into_diagnostic()?;
    let created = shop
        .opportunity(&OpportunityId::from(args.id.as_str()))
        .ok_or_else(|| miette::miette!("opportunity vanished after write: {}", args.id))?;

    if is_human(global) {
        println!(
            "{} Created opportunity {}",
            style("✓").green(),
            style(&created.id).cyan()
        );
        Ok(())
    } else {
        print_record(&created, global)
    }
}

fn run_update(args: UpdateArgs, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let id = OpportunityId::from(args.id.as_str());

    if let Some(stage) = args.stage {
        shop.opportunity_lifecycle().set_stage(&id, stage).into_diagnostic()?;
    }
    if let Some(drop_date) = args.drop_date {
        shop.opportunity_lifecycle()
            .set_drop_date(&id, Some(drop_date))
            .into_diagnostic()?;
    }

    let updated = shop
        .update_opportunity(&id, |opp| {
            if let Some(approved) = args.approved {
                opp.insurance.approved = Some(approved);
            }
            if let Some(voil) = args.voil {
                opp.is_voil_complete = voil;
            }
            if let Some(four_corners) = args.four_corners {
                opp.is_four_corners_complete = four_corners;
            }
            if args.ecd.is_some() {
                opp.estimated_completion_date = args.ecd;
            }
            if args.ro.is_some() {
                opp.ro_number = args.ro;
            }
            if args.estimate.is_some() {
                opp.estimate_amount = args.estimate;
            }
            if args.paint_weather.is_some() || args.forecast.is_some() {
                let weather = opp.weather_impact.get_or_insert_with(WeatherImpact::default);
                if let Some(affects) = args.paint_weather {
                    weather.affects_paint = affects;
                }
                if args.forecast.is_some() {
                    weather.forecast = args.forecast;
                }
            }
            if args.notes.is_some() {
                opp.notes = args.notes;
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

fn run_archive(args: ArchiveArgs, global: &GlobalOpts) -> Result<()> {
    let ids = if args.ids.is_empty() {
        read_ids_from_stdin().unwrap_or_default()
    } else {
        args.ids
    };
    if ids.is_empty() {
        bail!("no opportunity ids given");
    }

    let shop = open_shop(global)?;
    let flow = shop.opportunity_lifecycle();
    for id in ids {
        let changed = flow.archive(&OpportunityId::from(id.as_str())).into_diagnostic()?;
        if changed {
            println!("{} Archived {}", style("✓").green(), style(&id).cyan());
        } else {
            println!("{} {} was already archived", style("-").dim(), id);
        }
    }
    Ok(())
}

fn run_unarchive(args: IdArg, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let changed = shop
        .opportunity_lifecycle()
        .unarchive(&OpportunityId::from(args.id.as_str()))
        .into_diagnostic()?;
    if changed {
        println!("{} Restored {}", style("✓").green(), style(&args.id).cyan());
    } else {
        println!("{} {} is not archived", style("-").dim(), args.id);
    }
    Ok(())
}

fn run_status(args: StatusArgs, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let changed = shop
        .opportunity_lifecycle()
        .set_status(&OpportunityId::from(args.id.as_str()), args.status)
        .into_diagnostic()?;
    if changed {
        println!(
            "{} {} is now {}",
            style("✓").green(),
            style(&args.id).cyan(),
            style(args.status).yellow()
        );
        if args.status == OpportunityStatus::TotalLoss {
            println!("  Linked tasks escalated to urgent");
        }
    } else {
        println!("{} {} already {}", style("-").dim(), args.id, args.status);
    }
    Ok(())
}

fn run_deadline(args: IdArg, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let status = shop
        .opportunity_lifecycle()
        .check_upload_deadline(&OpportunityId::from(args.id.as_str()));

    if !is_human(global) {
        return print_value(&status, global);
    }
    match status.remaining {
        None => println!("{}: no upload deadline applies", args.id),
        Some(_) if status.passed => println!(
            "{}: upload window {}",
            args.id,
            style("closed").green()
        ),
        Some(left) => println!(
            "{}: {} left in the upload window",
            args.id,
            style(format_duration(left)).yellow()
        ),
    }
    Ok(())
}

fn run_convert(args: IdArg, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let wf_id = shop
        .opportunity_lifecycle()
        .create_workfile_from_opportunity(&OpportunityId::from(args.id.as_str()))
        .into_diagnostic()?;

    if is_human(global) {
        println!(
            "{} Created workfile {} from {}",
            style("✓").green(),
            style(&wf_id).cyan(),
            args.id
        );
        Ok(())
    } else {
        match shop.workfile(&wf_id) {
            Some(wf) => print_record(&wf, global),
            None => bail!("workfile not found after creation: {}", wf_id),
        }
    }
}

fn run_ready(global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let ready = shop.opportunity_lifecycle().get_ready_for_workfile();
    print_list(&ready, global, OPP_COLUMNS, "opportunities", opp_to_row)
}

fn run_weather(global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let impacted = shop.opportunity_lifecycle().get_weather_impacted_opportunities();
    if is_human(global) {
        for opp in &impacted {
            let forecast = opp
                .weather_impact
                .as_ref()
                .and_then(|w| w.forecast.clone())
                .unwrap_or_default();
            println!(
                "{} {} {} (drop {}) {}",
                style("☂").yellow(),
                style(&opp.id).cyan(),
                opp.title(),
                format_date(opp.drop_date),
                forecast
            );
        }
        if impacted.is_empty() {
            println!("No weather-impacted opportunities.");
        }
        return Ok(());
    }
    print_list(&impacted, global, OPP_COLUMNS, "opportunities", opp_to_row)
}
