//! `floor activity` command - Activity audit trail

use clap::{Args, Subcommand};
use console::style;
use miette::Result;

use crate::cli::args::{GlobalOpts, OutputFormat};
use crate::cli::commands::utils::Workspace;
use crate::cli::helpers::{print_rows, print_structured, Column};
use crate::core::activity::{ActivityAction, ActivityEvent, ActivityLogEntry, ActivityLogger, Origin};
use crate::core::identity::EntityReference;

#[derive(Subcommand, Debug)]
pub enum ActivityCommands {
    /// Show recent activity, newest first
    Recent(RecentArgs),

    /// Record a custom activity entry
    Log(LogArgs),

    /// Delete entries past the retention horizon
    Cleanup(CleanupArgs),
}

#[derive(Args, Debug)]
pub struct RecentArgs {
    /// Only entries by this actor
    #[arg(long, conflicts_with = "entity")]
    pub by: Option<String>,

    /// Only entries about this record, as Kind:id
    #[arg(long)]
    pub entity: Option<EntityReference>,

    /// Maximum entries to show
    #[arg(long, short = 'n', default_value = "50")]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Action tag, e.g. approve or calibrate
    #[arg(long, short = 'a')]
    pub action: ActivityAction,

    /// What happened
    #[arg(long, short = 'd')]
    pub description: String,

    /// Record the entry is about, as Kind:id
    #[arg(long)]
    pub about: Option<EntityReference>,
}

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Retention horizon in days (default: config, then 90)
    #[arg(long)]
    pub days: Option<u32>,
}

pub fn run(cmd: ActivityCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ActivityCommands::Recent(args) => run_recent(args, global),
        ActivityCommands::Log(args) => run_log(args, global),
        ActivityCommands::Cleanup(args) => run_cleanup(args, global),
    }
}

fn run_recent(args: RecentArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let logger = ActivityLogger::new(&ws.store);

    let entries = match &args.entity {
        Some(reference) => logger.recent_for_entity(reference, args.limit)?,
        None => logger.recent_for(args.by.as_deref(), args.limit)?,
    };

    if print_structured(global.format, &entries)? {
        return Ok(());
    }

    if entries.is_empty() {
        if !global.quiet {
            println!("No activity recorded.");
        }
        return Ok(());
    }

    if global.format == OutputFormat::Id {
        for entry in &entries {
            println!("{}", entry.id);
        }
        return Ok(());
    }

    let columns = [
        Column::new("WHEN", 19),
        Column::new("ACTOR", 14),
        Column::new("ACTION", 10),
        Column::new("RECORD", 36),
        Column::new("DESCRIPTION", 48),
    ];
    let rows: Vec<Vec<String>> = entries.iter().map(entry_row).collect();
    print_rows(global.format, &columns, &rows)
}

fn entry_row(entry: &ActivityLogEntry) -> Vec<String> {
    let mut description = entry.description.clone();
    if let Some(changes) = entry.changes() {
        let fields: Vec<&str> = changes.keys().map(String::as_str).collect();
        description = format!("{} [{}]", description, fields.join(", "));
    }
    vec![
        entry.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        entry.actor.clone(),
        entry.action.to_string(),
        entry
            .entity
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        description,
    ]
}

fn run_log(args: LogArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let logger = ActivityLogger::new(&ws.store);

    let mut event = ActivityEvent::new(&ws.actor.name, args.action)
        .description(args.description)
        .origin(Origin {
            address: None,
            agent: Some(format!("floor/{}", env!("CARGO_PKG_VERSION"))),
        });
    if let Some(reference) = args.about {
        event = event.reference(reference);
    }

    let entry = logger.try_log(event)?;
    if !print_structured(global.format, &entry)? && !global.quiet {
        println!(
            "{} Logged {} by {}",
            style("✓").green(),
            style(&entry.action).yellow(),
            style(&entry.actor).cyan()
        );
    }
    Ok(())
}

fn run_cleanup(args: CleanupArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let days = args
        .days
        .unwrap_or_else(|| ws.config.activity_retention_days());
    let removed = ActivityLogger::new(&ws.store).cleanup(days)?;

    if !global.quiet {
        println!(
            "{} Removed {} activity entr{} older than {} days",
            style("✓").green(),
            removed,
            if removed == 1 { "y" } else { "ies" },
            days
        );
    }
    Ok(())
}
