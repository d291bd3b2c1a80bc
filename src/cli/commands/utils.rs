//! Shared utilities for CLI commands

use miette::{miette, Result};

use crate::cli::args::GlobalOpts;
use crate::core::config::Config;
use crate::core::notify::Dispatcher;
use crate::core::project::Project;
use crate::core::resolver::EntityResolver;
use crate::core::store::Store;
use crate::core::team::{Actor, TeamRoster};
use crate::core::workflow::Workshop;
use crate::entities::register_all;

/// Locate the project from `--project` or the current directory
pub fn discover_project(global: &GlobalOpts) -> Result<Project> {
    match &global.project {
        Some(path) => Project::discover_from(path),
        None => Project::discover(),
    }
    .map_err(|e| miette!("{}", e))
}

/// Everything a command needs to act on an open project
pub struct Workspace {
    pub project: Project,
    pub config: Config,
    pub store: Store,
    pub roster: TeamRoster,
    pub resolver: EntityResolver,
    pub actor: Actor,
}

impl Workspace {
    pub fn open(global: &GlobalOpts) -> Result<Self> {
        let project = discover_project(global)?;
        let config = Config::load(Some(&project));
        let store = Store::open_project(&project)?;
        let roster = TeamRoster::load(&project).unwrap_or_default();

        let mut resolver = EntityResolver::new();
        register_all(&mut resolver, &project);

        let name = global.actor.clone().unwrap_or_else(|| config.actor());
        let actor = roster.actor(&name);
        tracing::debug!(actor = %actor.name, admin = actor.admin, root = %project.root().display(), "workspace opened");

        Ok(Self {
            project,
            config,
            store,
            roster,
            resolver,
            actor,
        })
    }

    pub fn workshop(&self) -> Workshop<'_> {
        Workshop::new(&self.project, &self.store, &self.roster)
    }

    pub fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher::new(&self.store)
    }
}
