//! `floor team` command - Team roster management

use clap::{Args, Subcommand};
use console::style;
use miette::{bail, IntoDiagnostic, Result};

use crate::cli::args::{GlobalOpts, OutputFormat};
use crate::cli::commands::utils::discover_project;
use crate::cli::helpers::{print_rows, print_structured, Column};
use crate::core::team::{Role, TeamMember, TeamRoster};

/// Team roster management
#[derive(Debug, Subcommand)]
pub enum TeamCommands {
    /// List team members
    List(TeamListArgs),
    /// Add a team member, or update one with the same username
    Add(TeamAddArgs),
}

/// List team members
#[derive(Debug, Args)]
pub struct TeamListArgs {
    /// Filter by role
    #[arg(long, short = 'r')]
    pub role: Option<Role>,

    /// Include inactive members
    #[arg(long)]
    pub all: bool,
}

/// Add a team member
#[derive(Debug, Args)]
pub struct TeamAddArgs {
    /// Username; notifications are addressed to this
    #[arg(long)]
    pub username: String,

    /// Member's full name
    #[arg(long)]
    pub name: String,

    /// Member's email
    #[arg(long)]
    pub email: Option<String>,

    /// Roles (comma-separated: technician,supervisor,manager,admin)
    #[arg(long, value_delimiter = ',')]
    pub roles: Vec<Role>,

    /// Mark the member inactive; inactive members receive no wide notifications
    #[arg(long)]
    pub inactive: bool,
}

impl TeamCommands {
    pub fn run(&self, global: &GlobalOpts) -> Result<()> {
        match self {
            TeamCommands::List(args) => args.run(global),
            TeamCommands::Add(args) => args.run(global),
        }
    }
}

impl TeamListArgs {
    pub fn run(&self, global: &GlobalOpts) -> Result<()> {
        let project = discover_project(global)?;

        let Some(roster) = TeamRoster::load(&project) else {
            bail!("No team roster found. Add a member with 'floor team add'.");
        };

        let members: Vec<&TeamMember> = roster
            .members
            .iter()
            .filter(|m| self.all || m.active)
            .filter(|m| self.role.map_or(true, |r| m.has_role(r)))
            .collect();

        if print_structured(global.format, &members)? {
            return Ok(());
        }

        if members.is_empty() {
            println!("No team members found.");
            return Ok(());
        }

        if global.format == OutputFormat::Id {
            for m in &members {
                println!("{}", m.username);
            }
            return Ok(());
        }

        let columns = [
            Column::new("USERNAME", 15),
            Column::new("NAME", 20),
            Column::new("EMAIL", 25),
            Column::new("ROLES", 30),
        ];
        let rows: Vec<Vec<String>> = members
            .iter()
            .map(|m| {
                vec![
                    m.username.clone(),
                    m.name.clone(),
                    m.email.clone().unwrap_or_default(),
                    m.roles
                        .iter()
                        .map(|r| r.to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                ]
            })
            .collect();
        print_rows(global.format, &columns, &rows)
    }
}

impl TeamAddArgs {
    pub fn run(&self, global: &GlobalOpts) -> Result<()> {
        let project = discover_project(global)?;
        let mut roster = TeamRoster::load(&project).unwrap_or_default();
        let existed = roster.find_member(&self.username).is_some();

        roster.upsert(TeamMember {
            username: self.username.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            roles: self.roles.clone(),
            active: !self.inactive,
        });
        roster.save(&project).into_diagnostic()?;

        if !global.quiet {
            println!(
                "{} {} {} ({}) {} team roster",
                style("✓").green(),
                if existed { "Updated" } else { "Added" },
                self.name,
                style(&self.username).cyan(),
                if existed { "in" } else { "to" }
            );
            println!(
                "Roles: {}",
                self.roles
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Ok(())
    }
}
