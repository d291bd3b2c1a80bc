//! Team roster, roles and acting identities

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::Project;

/// Roster file location within the project's .floor directory
const ROSTER_FILE: &str = "team.yaml";

/// Account roles
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Technician,
    Supervisor,
    Manager,
    Admin,
}

impl Role {
    /// Roles treated as elevated-privilege (staff) accounts
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Supervisor | Role::Manager | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Technician => write!(f, "technician"),
            Role::Supervisor => write!(f, "supervisor"),
            Role::Manager => write!(f, "manager"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "technician" => Ok(Role::Technician),
            "supervisor" => Ok(Role::Supervisor),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// A team member with their roles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    /// Login identity; notifications are addressed to this
    pub username: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl TeamMember {
    /// Check if member has a specific role
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is_elevated(&self) -> bool {
        self.roles.iter().any(Role::is_elevated)
    }
}

/// Team roster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRoster {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub members: Vec<TeamMember>,
}

fn default_version() -> u32 {
    1
}

impl Default for TeamRoster {
    fn default() -> Self {
        Self {
            version: 1,
            members: Vec::new(),
        }
    }
}

impl TeamRoster {
    /// Load team roster from the project's .floor/team.yaml
    pub fn load(project: &Project) -> Option<Self> {
        Self::load_from_path(&project.floor_dir().join(ROSTER_FILE))
    }

    /// Load team roster from a specific path
    pub fn load_from_path(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str(&contents) {
            Ok(roster) => Some(roster),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable team roster");
                None
            }
        }
    }

    /// Save team roster to the project's .floor/team.yaml
    pub fn save(&self, project: &Project) -> std::io::Result<()> {
        self.save_to_path(&project.floor_dir().join(ROSTER_FILE))
    }

    /// Save team roster to a specific path
    pub fn save_to_path(&self, path: &Path) -> std::io::Result<()> {
        let contents = serde_yml::to_string(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, contents)
    }

    /// Find active member by username
    pub fn find_member(&self, username: &str) -> Option<&TeamMember> {
        self.members
            .iter()
            .find(|m| m.active && m.username.eq_ignore_ascii_case(username))
    }

    /// Add a member, replacing any existing entry with the same username
    pub fn upsert(&mut self, member: TeamMember) {
        self.members
            .retain(|m| !m.username.eq_ignore_ascii_case(&member.username));
        self.members.push(member);
    }

    /// Usernames of active administrators
    pub fn administrators(&self) -> Vec<String> {
        self.usernames_where(TeamMember::is_admin)
    }

    /// Usernames of active elevated-privilege accounts
    pub fn elevated(&self) -> Vec<String> {
        self.usernames_where(TeamMember::is_elevated)
    }

    fn usernames_where(&self, pred: impl Fn(&TeamMember) -> bool) -> Vec<String> {
        self.members
            .iter()
            .filter(|m| m.active && pred(m))
            .map(|m| m.username.clone())
            .collect()
    }

    /// Build the acting identity for a username
    pub fn actor(&self, username: &str) -> Actor {
        Actor {
            name: username.to_string(),
            admin: self.find_member(username).is_some_and(TeamMember::is_admin),
        }
    }
}

/// The identity performing an operation, supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub name: String,
    /// Administrators may read or delete other accounts' notifications
    pub admin: bool,
}

impl Actor {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            admin: false,
        }
    }

    pub fn admin(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            admin: true,
        }
    }
}
