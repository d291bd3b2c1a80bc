//! Core module - fundamental types and utilities

pub mod activity;
pub mod config;
pub mod entity;
pub mod export;
pub mod identity;
pub mod loader;
pub mod notify;
pub mod project;
pub mod resolver;
pub mod store;
pub mod team;
pub mod workflow;

pub use activity::{ActivityAction, ActivityError, ActivityEvent, ActivityLogEntry, ActivityLogger, ChangeSet};
pub use config::Config;
pub use entity::{Entity, Record, Referable};
pub use export::{ExportFormat, ExportSpec, Exporter};
pub use identity::{EntityId, EntityPrefix, EntityReference, IdParseError};
pub use notify::{Dispatcher, Notification, NotificationDraft, NotificationKind, Priority};
pub use project::{Project, ProjectError};
pub use resolver::{EntityResolver, Resolved};
pub use store::{Store, StoreError};
pub use team::{Actor, Role, TeamMember, TeamRoster};
pub use workflow::{Workshop, WorkflowError};
