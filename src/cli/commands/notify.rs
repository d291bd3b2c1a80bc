//! `floor notify` command - Notification inbox and dispatch

use clap::{Args, Subcommand};
use console::style;
use miette::{bail, miette, Result};

use crate::cli::args::{GlobalOpts, OutputFormat};
use crate::cli::commands::utils::Workspace;
use crate::cli::helpers::{print_rows, print_structured, Column};
use crate::core::identity::EntityReference;
use crate::core::notify::{ListOptions, Notification, NotificationDraft, NotificationKind, Priority};
use crate::core::store::days_from_now;

#[derive(Subcommand, Debug)]
pub enum NotifyCommands {
    /// List your notifications, newest first
    List(ListArgs),

    /// Show how many unread notifications you have
    Unread,

    /// Mark one notification as read
    Read(IdArgs),

    /// Mark all of your notifications as read
    ReadAll,

    /// Delete one notification
    Delete(IdArgs),

    /// Send a notification to named recipients
    Send(SendArgs),

    /// Send a notification to every administrator on the roster
    Admins(DraftArgs),

    /// Send a notification to every supervisor, manager and admin on the roster
    Staff(DraftArgs),

    /// Delete read notifications past the retention horizon
    Cleanup(CleanupArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show unread notifications
    #[arg(long, short = 'u')]
    pub unread: bool,

    /// Page size
    #[arg(long, short = 'n', default_value = "20")]
    pub limit: usize,

    /// Rows to skip
    #[arg(long, default_value = "0")]
    pub offset: usize,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    /// Notification ID (NTF-...)
    pub id: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Recipient usernames (comma-separated)
    #[arg(long, value_delimiter = ',', required = true)]
    pub to: Vec<String>,

    #[command(flatten)]
    pub draft: DraftArgs,
}

/// Notification content shared by every send command
#[derive(Args, Debug)]
pub struct DraftArgs {
    /// Short title
    #[arg(long, short = 't')]
    pub title: String,

    /// Message body
    #[arg(long, short = 'b', default_value = "")]
    pub body: String,

    /// Category
    #[arg(long, short = 'k', default_value = "info")]
    pub kind: NotificationKind,

    /// Priority
    #[arg(long, short = 'p', default_value = "normal")]
    pub priority: Priority,

    /// Related record, as Kind:id (e.g. JobCard:JOB-...)
    #[arg(long)]
    pub about: Option<EntityReference>,

    /// Action link
    #[arg(long, requires = "label")]
    pub link: Option<String>,

    /// Label for the action link
    #[arg(long, requires = "link")]
    pub label: Option<String>,

    /// Hide the notification after this many days
    #[arg(long)]
    pub expires_in_days: Option<u32>,
}

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Retention horizon in days (default: config, then 30)
    #[arg(long)]
    pub days: Option<u32>,
}

pub fn run(cmd: NotifyCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        NotifyCommands::List(args) => run_list(args, global),
        NotifyCommands::Unread => run_unread(global),
        NotifyCommands::Read(args) => run_read(args, global),
        NotifyCommands::ReadAll => run_read_all(global),
        NotifyCommands::Delete(args) => run_delete(args, global),
        NotifyCommands::Send(args) => run_send(args, global),
        NotifyCommands::Admins(args) => run_wide(args, global, Audience::Administrators),
        NotifyCommands::Staff(args) => run_wide(args, global, Audience::Elevated),
        NotifyCommands::Cleanup(args) => run_cleanup(args, global),
    }
}

impl DraftArgs {
    fn build(&self, creator: &str) -> Result<NotificationDraft> {
        let mut draft = NotificationDraft::new(&self.title, &self.body)
            .kind(self.kind)
            .priority(self.priority)
            .created_by(creator);
        if let Some(reference) = &self.about {
            draft = draft.reference(reference.clone());
        }
        if let (Some(link), Some(label)) = (&self.link, &self.label) {
            draft = draft.action(link, label);
        }
        if let Some(days) = self.expires_in_days {
            let at = days_from_now(days)
                .ok_or_else(|| miette!("--expires-in-days {} is too far in the future", days))?;
            draft = draft.expires_at(at);
        }
        Ok(draft)
    }
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let page = ws.dispatcher().list_recent(
        &ws.actor,
        &ListOptions {
            limit: args.limit,
            offset: args.offset,
            unread_only: args.unread,
        },
    )?;

    if print_structured(global.format, &page)? {
        return Ok(());
    }

    if page.items.is_empty() {
        if !global.quiet {
            println!("No notifications.");
        }
        return Ok(());
    }

    if global.format == OutputFormat::Id {
        for item in &page.items {
            println!("{}", item.id);
        }
        return Ok(());
    }

    let columns = [
        Column::new("ID", 30),
        Column::new("", 1),
        Column::new("PRIORITY", 8),
        Column::new("KIND", 8),
        Column::new("TITLE", 36),
        Column::new("FROM", 12),
        Column::new("CREATED", 16),
    ];
    let rows: Vec<Vec<String>> = page.items.iter().map(notification_row).collect();
    print_rows(global.format, &columns, &rows)?;

    if page.has_more && !global.quiet {
        println!();
        println!(
            "More notifications available: {}",
            style(format!("floor notify list --offset {}", page.offset + page.limit)).yellow()
        );
    }
    Ok(())
}

fn notification_row(n: &Notification) -> Vec<String> {
    vec![
        n.id.to_string(),
        if n.is_read { String::new() } else { "*".to_string() },
        n.priority.to_string(),
        n.kind.to_string(),
        n.title.clone(),
        n.created_by.clone().unwrap_or_default(),
        n.created_at.format("%Y-%m-%d %H:%M").to_string(),
    ]
}

fn run_unread(global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let count = ws.dispatcher().unread_count(&ws.actor)?;

    match global.format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "unread": count })),
        _ => println!("{}", count),
    }
    Ok(())
}

fn run_read(args: IdArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let notification = ws.dispatcher().mark_read(&args.id, &ws.actor)?;

    if !print_structured(global.format, &notification)? && !global.quiet {
        println!(
            "{} Marked {} as read",
            style("✓").green(),
            style(&notification.id).cyan()
        );
    }
    Ok(())
}

fn run_read_all(global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let count = ws.dispatcher().mark_all_read(&ws.actor)?;

    if !global.quiet {
        println!("{} Marked {} notification(s) as read", style("✓").green(), count);
    }
    Ok(())
}

fn run_delete(args: IdArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    ws.dispatcher().delete(&args.id, &ws.actor)?;

    if !global.quiet {
        println!("{} Deleted {}", style("✓").green(), style(&args.id).cyan());
    }
    Ok(())
}

fn run_send(args: SendArgs, global: &GlobalOpts) -> Result<()> {
    let recipients: Vec<String> = args
        .to
        .iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect();
    if recipients.is_empty() {
        bail!("No recipients given. Use --to alice,bob");
    }

    let ws = Workspace::open(global)?;
    let draft = args.draft.build(&ws.actor.name)?;
    let sent = ws.dispatcher().dispatch(recipients, &draft)?;
    report_sent(&sent, global)
}

enum Audience {
    Administrators,
    Elevated,
}

fn run_wide(args: DraftArgs, global: &GlobalOpts, audience: Audience) -> Result<()> {
    let ws = Workspace::open(global)?;
    let draft = args.build(&ws.actor.name)?;
    let dispatcher = ws.dispatcher();
    let sent = match audience {
        Audience::Administrators => dispatcher.notify_administrators(&ws.roster, &draft)?,
        Audience::Elevated => dispatcher.notify_elevated(&ws.roster, &draft)?,
    };
    if sent.is_empty() && !global.quiet {
        println!(
            "{} Nobody on the roster matched. Add members with {}",
            style("!").yellow(),
            style("floor team add").yellow()
        );
        return Ok(());
    }
    report_sent(&sent, global)
}

fn report_sent(sent: &[Notification], global: &GlobalOpts) -> Result<()> {
    if print_structured(global.format, sent)? {
        return Ok(());
    }
    if global.format == OutputFormat::Id {
        for n in sent {
            println!("{}", n.id);
        }
        return Ok(());
    }
    if !global.quiet {
        let recipients: Vec<&str> = sent.iter().map(|n| n.recipient.as_str()).collect();
        println!(
            "{} Sent {} notification(s) to {}",
            style("✓").green(),
            sent.len(),
            style(recipients.join(", ")).cyan()
        );
    }
    Ok(())
}

fn run_cleanup(args: CleanupArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let days = args
        .days
        .unwrap_or_else(|| ws.config.notification_retention_days());
    let removed = ws.dispatcher().cleanup(days)?;

    if !global.quiet {
        println!(
            "{} Removed {} read notification(s) older than {} days",
            style("✓").green(),
            removed,
            days
        );
    }
    Ok(())
}
