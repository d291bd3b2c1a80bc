//! `floor job` command - Production job cards

use chrono::{NaiveDate, Utc};
use clap::{Args, Subcommand};
use console::style;
use miette::Result;

use crate::cli::args::{GlobalOpts, OutputFormat};
use crate::cli::commands::utils::Workspace;
use crate::cli::helpers::{print_rows, print_structured, Column};
use crate::core::workflow::{allowed_transitions, WorkflowError};
use crate::entities::{JobCard, JobStatus};

#[derive(Subcommand, Debug)]
pub enum JobCommands {
    /// Open a job card
    New(NewArgs),

    /// List job cards
    List(ListArgs),

    /// Move a job card to a new status
    Status(StatusArgs),
}

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Short title
    #[arg(long, short = 't')]
    pub title: String,

    /// Units to produce
    #[arg(long, short = 'n', default_value = "1")]
    pub quantity: u32,

    /// Assigned employee ID or unique prefix
    #[arg(long, short = 'a')]
    pub assignee: Option<String>,

    /// Due date, YYYY-MM-DD
    #[arg(long)]
    pub due: Option<NaiveDate>,

    #[arg(long, short = 'd')]
    pub description: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only jobs in this status
    #[arg(long, short = 's')]
    pub status: Option<JobStatus>,

    /// Only open work past its due date
    #[arg(long)]
    pub overdue: bool,

    /// Show count only
    #[arg(long)]
    pub count: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Job card ID or unique prefix
    pub id: String,

    /// New status
    pub status: JobStatus,

    /// Total hours logged against the job so far
    #[arg(long)]
    pub hours: Option<f64>,
}

pub fn run(cmd: JobCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        JobCommands::New(args) => run_new(args, global),
        JobCommands::List(args) => run_list(args, global),
        JobCommands::Status(args) => run_status(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let workshop = ws.workshop();

    let mut job = JobCard::new(args.title, args.quantity, &ws.actor.name);
    job.description = args.description;
    job.due = args.due;
    if let Some(assignee) = &args.assignee {
        job.assignee = Some(workshop.employee(assignee)?.id.to_string());
    }

    let job = workshop.open_job(&ws.actor, job)?;

    match global.format {
        OutputFormat::Id => println!("{}", job.id),
        _ if print_structured(global.format, &job)? => {}
        _ => {
            println!(
                "{} Opened job card {} - {}",
                style("✓").green(),
                style(&job.id).cyan(),
                job.title
            );
        }
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let today = Utc::now().date_naive();

    let jobs: Vec<JobCard> = ws
        .workshop()
        .jobs()?
        .into_iter()
        .filter(|j| args.status.map_or(true, |s| j.status == s))
        .filter(|j| !args.overdue || j.is_overdue(today))
        .collect();

    if args.count {
        println!("{}", jobs.len());
        return Ok(());
    }

    if print_structured(global.format, &jobs)? {
        return Ok(());
    }

    if jobs.is_empty() {
        println!("No job cards found.");
        return Ok(());
    }

    if global.format == OutputFormat::Id {
        for j in &jobs {
            println!("{}", j.id);
        }
        return Ok(());
    }

    let columns = [
        Column::new("ID", 30),
        Column::new("TITLE", 28),
        Column::new("STATUS", 12),
        Column::new("QTY", 5),
        Column::new("HOURS", 7),
        Column::new("ASSIGNEE", 30),
        Column::new("DUE", 10),
    ];
    let rows: Vec<Vec<String>> = jobs
        .iter()
        .map(|j| {
            vec![
                j.id.to_string(),
                j.title.clone(),
                j.status.to_string(),
                j.quantity.to_string(),
                format!("{:.1}", j.hours_logged),
                j.assignee.clone().unwrap_or_default(),
                j.due.map(|d| d.to_string()).unwrap_or_default(),
            ]
        })
        .collect();
    print_rows(global.format, &columns, &rows)
}

fn run_status(args: StatusArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let workshop = ws.workshop();

    let job = match workshop.set_job_status(&ws.actor, &args.id, args.status, args.hours) {
        Ok(job) => job,
        Err(WorkflowError::InvalidTransition { from, to }) => {
            let allowed: Vec<String> = allowed_transitions(from)
                .iter()
                .map(ToString::to_string)
                .collect();
            if !allowed.is_empty() {
                eprintln!(
                    "{} From {} a job can move to: {}",
                    style("hint:").cyan(),
                    from,
                    allowed.join(", ")
                );
            }
            return Err(WorkflowError::InvalidTransition { from, to }.into());
        }
        Err(e) => return Err(e.into()),
    };

    match global.format {
        OutputFormat::Id => println!("{}", job.id),
        _ if print_structured(global.format, &job)? => {}
        _ => {
            println!(
                "{} {} is now {}",
                style("✓").green(),
                style(&job.id).cyan(),
                style(job.status).yellow()
            );
        }
    }
    Ok(())
}
