//! `bodyshop task` command - follow-up work on opportunities and workfiles

use chrono::{DateTime, Utc};
use clap::Subcommand;
use console::style;
use dialoguer::Confirm;
use miette::{bail, IntoDiagnostic, Result};

use crate::cli::helpers::{open_shop, parse_datetime, truncate_str};
use crate::cli::output::{is_human, print_list, print_record};
use crate::cli::table::{CellValue, ColumnDef, TableRow};
use crate::cli::{GlobalOpts, PriorityFilter, TaskFilter};
use crate::core::{NewTask, OpportunityId, TaskId, WorkfileId};
use crate::entities::{Priority, RelatedTo, Task, TaskStatus};

const TASK_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 32),
    ColumnDef::new("priority", "PRI", 7),
    ColumnDef::new("status", "STATUS", 12),
    ColumnDef::new("title", "TITLE", 32),
    ColumnDef::new("owner", "OWNER", 14),
    ColumnDef::new("related", "RELATED TO", 24),
    ColumnDef::new("due", "DUE", 16),
];

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// List tasks
    List(ListArgs),

    /// Show a task
    Show(IdArg),

    /// Create a task
    New(NewArgs),

    /// Mark a task completed
    Done(IdArg),

    /// Set a task's status
    Status(StatusArgs),

    /// Move an opportunity task onto a workfile
    Convert(ConvertArgs),

    /// Delete a task
    Remove(RemoveArgs),
}

#[derive(clap::Args, Debug)]
pub struct IdArg {
    /// Task id
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only tasks about this opportunity
    #[arg(long, conflicts_with = "wf")]
    pub opp: Option<String>,

    /// Only tasks about this workfile
    #[arg(long)]
    pub wf: Option<String>,

    #[arg(long, short = 's', value_enum, default_value = "pending")]
    pub status: TaskFilter,

    #[arg(long, short = 'p', value_enum, default_value = "all")]
    pub priority: PriorityFilter,
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Short title
    pub title: String,

    /// Attach to an opportunity
    #[arg(long, conflicts_with = "wf")]
    pub opp: Option<String>,

    /// Attach to a workfile
    #[arg(long)]
    pub wf: Option<String>,

    #[arg(long, short = 'p', default_value = "normal")]
    pub priority: Priority,

    /// Defaults to the configured owner
    #[arg(long)]
    pub owner: Option<String>,

    /// Estimated labour hours
    #[arg(long)]
    pub hours: Option<f64>,

    #[arg(long, value_parser = parse_datetime)]
    pub due: Option<DateTime<Utc>>,

    #[arg(long, short = 'd')]
    pub description: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Task id
    pub id: String,

    /// open, in_progress, completed or archived
    pub status: TaskStatus,
}

#[derive(clap::Args, Debug)]
pub struct ConvertArgs {
    /// Task id
    pub id: String,

    /// Target workfile id
    pub workfile: String,
}

#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Task id
    pub id: String,

    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub fn run(cmd: TaskCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        TaskCommands::List(args) => run_list(args, global),
        TaskCommands::Show(args) => run_show(args, global),
        TaskCommands::New(args) => run_new(args, global),
        TaskCommands::Done(args) => run_set_status(
            StatusArgs {
                id: args.id,
                status: TaskStatus::Completed,
            },
            global,
        ),
        TaskCommands::Status(args) => run_set_status(args, global),
        TaskCommands::Convert(args) => run_convert(args, global),
        TaskCommands::Remove(args) => run_remove(args, global),
    }
}

fn task_to_row(task: &Task) -> TableRow {
    let related = match &task.related_to {
        Some(target) => CellValue::Text(target.to_string()),
        None => CellValue::Empty,
    };
    TableRow::new()
        .cell("id", CellValue::Id(task.id.to_string()))
        .cell("priority", CellValue::Text(task.priority.to_string()))
        .cell("status", CellValue::Text(task.status.to_string()))
        .cell("title", CellValue::Text(truncate_str(&task.title, 32)))
        .cell("owner", CellValue::Text(task.owner.clone()))
        .cell("related", related)
        .cell("due", CellValue::Date(task.due_date))
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let scope = match (args.opp, args.wf) {
        (Some(opp), _) => Some(RelatedTo::Opportunity(OpportunityId::from(opp))),
        (None, Some(wf)) => Some(RelatedTo::Workfile(WorkfileId::from(wf))),
        (None, None) => None,
    };
    let candidates = match &scope {
        Some(target) => shop.task_linkage().tasks_for(target),
        None => shop.tasks(),
    };

    let mut tasks: Vec<Task> = candidates
        .into_iter()
        .filter(|t| args.status.matches(t.status))
        .filter(|t| args.priority.matches(t.priority))
        .collect();
    tasks.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created.cmp(&b.created)));

    print_list(&tasks, global, TASK_COLUMNS, "tasks", task_to_row)
}

fn run_show(args: IdArg, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    match shop.task(&TaskId::from(args.id.as_str())) {
        Some(task) => print_record(&task, global),
        None => bail!("task not found: {}", args.id),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let mut new = NewTask::new(args.title).priority(args.priority);
    if let Some(owner) = args.owner {
        new = new.owner(owner);
    }
    if let Some(hours) = args.hours {
        new = new.estimated_hours(hours);
    }
    new.due_date = args.due;
    new.description = args.description;

    let links = shop.task_linkage();
    let task = match (args.opp, args.wf) {
        (Some(opp), _) => links.add_task_to_opportunity(&OpportunityId::from(opp), new),
        (None, Some(wf)) => links.add_task_to_workfile(&WorkfileId::from(wf), new),
        (None, None) => links.add_task(new),
    }
    .into_diagnostic()?;

    if is_human(global) {
        println!(
            "{} Created task {} for {}",
            style("✓").green(),
            style(&task.id).cyan(),
            task.owner
        );
        Ok(())
    } else {
        print_record(&task, global)
    }
}

fn run_set_status(args: StatusArgs, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let task = shop
        .task_linkage()
        .update_task_status(&TaskId::from(args.id.as_str()), args.status)
        .into_diagnostic()?;

    if is_human(global) {
        println!(
            "{} {} is now {}",
            style("✓").green(),
            style(&task.id).cyan(),
            style(task.status).yellow()
        );
        Ok(())
    } else {
        print_record(&task, global)
    }
}

fn run_convert(args: ConvertArgs, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let task_id = TaskId::from(args.id.as_str());
    shop.task_linkage()
        .convert_strict(&task_id, &WorkfileId::from(args.workfile.as_str()))
        .into_diagnostic()?;

    if is_human(global) {
        println!(
            "{} {} now belongs to workfile {}",
            style("✓").green(),
            style(&task_id).cyan(),
            args.workfile
        );
        Ok(())
    } else {
        match shop.task(&task_id) {
            Some(task) => print_record(&task, global),
            None => bail!("task not found: {}", task_id),
        }
    }
}

fn run_remove(args: RemoveArgs, global: &GlobalOpts) -> Result<()> {
    let shop = open_shop(global)?;
    let id = TaskId::from(args.id.as_str());
    let Some(task) = shop.task(&id) else {
        bail!("task not found: {}", args.id);
    };

    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete task {} ({})?", task.id, task.title))
            .default(false)
            .interact()
            .into_diagnostic()?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    shop.task_linkage().remove_task(&id).into_diagnostic()?;
    println!("{} Removed {}", style("✓").green(), style(&id).cyan());
    Ok(())
}
