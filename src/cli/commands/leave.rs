//! `floor leave` command - Leave requests and approvals

use chrono::NaiveDate;
use clap::{Args, Subcommand};
use console::style;
use miette::Result;

use crate::cli::args::{GlobalOpts, OutputFormat};
use crate::cli::commands::utils::Workspace;
use crate::cli::helpers::{print_rows, print_structured, Column};
use crate::entities::{LeaveRequest, LeaveStatus};

#[derive(Subcommand, Debug)]
pub enum LeaveCommands {
    /// File a leave request
    New(NewArgs),

    /// Approve or reject a pending request
    Decide(DecideArgs),

    /// List leave requests
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Employee ID or unique prefix
    #[arg(long, short = 'e')]
    pub employee: String,

    /// First day off, YYYY-MM-DD
    #[arg(long)]
    pub start: NaiveDate,

    /// Last day off, YYYY-MM-DD
    #[arg(long)]
    pub end: NaiveDate,

    #[arg(long, short = 'r')]
    pub reason: Option<String>,
}

#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("decision").required(true).args(["approve", "reject"])))]
pub struct DecideArgs {
    /// Leave request ID or unique prefix
    pub id: String,

    #[arg(long)]
    pub approve: bool,

    #[arg(long)]
    pub reject: bool,

    /// Note for the requester
    #[arg(long, short = 'n')]
    pub note: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only pending requests
    #[arg(long)]
    pub pending: bool,
}

pub fn run(cmd: LeaveCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        LeaveCommands::New(args) => run_new(args, global),
        LeaveCommands::Decide(args) => run_decide(args, global),
        LeaveCommands::List(args) => run_list(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let workshop = ws.workshop();

    let employee = workshop.employee(&args.employee)?;
    let mut leave = LeaveRequest::new(employee.id.to_string(), args.start, args.end, &ws.actor.name);
    leave.reason = args.reason;

    let leave = workshop.request_leave(&ws.actor, leave)?;

    match global.format {
        OutputFormat::Id => println!("{}", leave.id),
        _ if print_structured(global.format, &leave)? => {}
        _ => {
            println!(
                "{} Filed leave request {} for {} ({} to {})",
                style("✓").green(),
                style(&leave.id).cyan(),
                employee.display_name(),
                leave.start,
                leave.end
            );
        }
    }
    Ok(())
}

fn run_decide(args: DecideArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let leave = ws
        .workshop()
        .decide_leave(&ws.actor, &args.id, args.approve, args.note)?;

    match global.format {
        OutputFormat::Id => println!("{}", leave.id),
        _ if print_structured(global.format, &leave)? => {}
        _ => {
            let status = match leave.status {
                LeaveStatus::Approved => style(leave.status.to_string()).green(),
                _ => style(leave.status.to_string()).red(),
            };
            println!("{} {} {}", style("✓").green(), style(&leave.id).cyan(), status);
        }
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let requests: Vec<LeaveRequest> = ws
        .workshop()
        .leave_requests()?
        .into_iter()
        .filter(|l| !args.pending || l.status == LeaveStatus::Pending)
        .collect();

    if print_structured(global.format, &requests)? {
        return Ok(());
    }

    if requests.is_empty() {
        println!("No leave requests found.");
        return Ok(());
    }

    if global.format == OutputFormat::Id {
        for l in &requests {
            println!("{}", l.id);
        }
        return Ok(());
    }

    let columns = [
        Column::new("ID", 30),
        Column::new("EMPLOYEE", 30),
        Column::new("START", 10),
        Column::new("END", 10),
        Column::new("DAYS", 4),
        Column::new("STATUS", 9),
        Column::new("DECIDED BY", 12),
    ];
    let rows: Vec<Vec<String>> = requests
        .iter()
        .map(|l| {
            vec![
                l.id.to_string(),
                l.employee.clone(),
                l.start.to_string(),
                l.end.to_string(),
                l.days().map(|d| d.to_string()).unwrap_or_default(),
                l.status.to_string(),
                l.decided_by.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_rows(global.format, &columns, &rows)
}
