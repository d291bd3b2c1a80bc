//! `floor employee` command - Employee records

use chrono::{NaiveDate, Utc};
use clap::{Args, Subcommand};
use console::style;
use miette::Result;

use crate::cli::args::{GlobalOpts, OutputFormat};
use crate::cli::commands::utils::Workspace;
use crate::cli::helpers::{print_rows, print_structured, Column};
use crate::entities::Employee;

#[derive(Subcommand, Debug)]
pub enum EmployeeCommands {
    /// Add an employee
    New(NewArgs),

    /// List employees
    List(ListArgs),

    /// Show one employee (recorded in the activity log)
    Show(ShowArgs),
}

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Payroll number
    #[arg(long = "no")]
    pub employee_no: String,

    #[arg(long)]
    pub first: String,

    #[arg(long)]
    pub last: String,

    /// Roster username that receives this employee's notifications
    #[arg(long, short = 'u')]
    pub username: Option<String>,

    #[arg(long, short = 'd')]
    pub department: Option<String>,

    #[arg(long)]
    pub position: Option<String>,

    /// First working day, YYYY-MM-DD (default: today)
    #[arg(long)]
    pub hired: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only this department
    #[arg(long, short = 'd')]
    pub department: Option<String>,

    /// Include inactive employees
    #[arg(long)]
    pub all: bool,

    /// Show count only
    #[arg(long)]
    pub count: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Employee ID or unique prefix
    pub id: String,
}

pub fn run(cmd: EmployeeCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        EmployeeCommands::New(args) => run_new(args, global),
        EmployeeCommands::List(args) => run_list(args, global),
        EmployeeCommands::Show(args) => run_show(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;

    let mut employee = Employee::new(
        args.employee_no,
        args.first,
        args.last,
        args.hired.unwrap_or_else(|| Utc::now().date_naive()),
        &ws.actor.name,
    );
    employee.username = args.username;
    employee.department = args.department;
    employee.position = args.position;

    let employee = ws.workshop().hire(&ws.actor, employee)?;

    match global.format {
        OutputFormat::Id => println!("{}", employee.id),
        _ if print_structured(global.format, &employee)? => {}
        _ => {
            println!(
                "{} Added employee {} ({})",
                style("✓").green(),
                style(&employee.id).cyan(),
                employee.display_name()
            );
        }
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;

    let employees: Vec<Employee> = ws
        .workshop()
        .employees()?
        .into_iter()
        .filter(|e| args.all || e.active)
        .filter(|e| match &args.department {
            Some(dept) => e
                .department
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case(dept)),
            None => true,
        })
        .collect();

    if args.count {
        println!("{}", employees.len());
        return Ok(());
    }

    if print_structured(global.format, &employees)? {
        return Ok(());
    }

    if employees.is_empty() {
        println!("No employees found.");
        return Ok(());
    }

    if global.format == OutputFormat::Id {
        for e in &employees {
            println!("{}", e.id);
        }
        return Ok(());
    }

    let columns = [
        Column::new("ID", 30),
        Column::new("NO", 8),
        Column::new("NAME", 24),
        Column::new("USERNAME", 12),
        Column::new("DEPARTMENT", 14),
        Column::new("HIRED", 10),
    ];
    let rows: Vec<Vec<String>> = employees
        .iter()
        .map(|e| {
            vec![
                e.id.to_string(),
                e.employee_no.clone(),
                e.display_name(),
                e.username.clone().unwrap_or_default(),
                e.department.clone().unwrap_or_default(),
                e.hired.to_string(),
            ]
        })
        .collect();
    print_rows(global.format, &columns, &rows)
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let employee = ws.workshop().view_employee(&ws.actor, &args.id)?;

    let format = match global.format {
        OutputFormat::Auto => OutputFormat::Yaml,
        f => f,
    };
    match format {
        OutputFormat::Id => println!("{}", employee.id),
        _ if print_structured(format, &employee)? => {}
        _ => {
            println!("{}", style(employee.display_name()).bold());
            println!("ID:         {}", employee.id);
            println!("Number:     {}", employee.employee_no);
            println!("Department: {}", employee.department.as_deref().unwrap_or("-"));
            println!("Position:   {}", employee.position.as_deref().unwrap_or("-"));
            println!("Hired:      {}", employee.hired);
        }
    }
    Ok(())
}
