//! Entity type definitions
//!
//! Floor keeps the following workshop records:
//!
//! - [`Employee`] - Workshop staff, optionally tied to a roster account
//! - [`JobCard`] - Production work with an assignee and progress
//! - [`LeaveRequest`] - Time-off requests decided by supervisors
//!
//! Each one is stored as YAML under the project root and registered with
//! the resolver by [`register_all`].

pub mod employee;
pub mod job_card;
pub mod leave;

pub use employee::Employee;
pub use job_card::{JobCard, JobStatus};
pub use leave::{LeaveRequest, LeaveStatus};

use serde::de::DeserializeOwned;

use crate::core::entity::{Entity, Record};
use crate::core::identity::EntityPrefix;
use crate::core::loader::YamlAccessor;
use crate::core::project::Project;
use crate::core::resolver::EntityResolver;

/// Register every workshop entity kind with the resolver
pub fn register_all(resolver: &mut EntityResolver, project: &Project) {
    register_dir::<Employee>(resolver, project, EntityPrefix::Emp);
    register_dir::<JobCard>(resolver, project, EntityPrefix::Job);
    register_dir::<LeaveRequest>(resolver, project, EntityPrefix::Lve);
}

fn register_dir<E>(resolver: &mut EntityResolver, project: &Project, prefix: EntityPrefix)
where
    E: Entity + Record + DeserializeOwned + 'static,
{
    if let Some(dir) = project.entity_dir(prefix) {
        resolver.register::<E>(YamlAccessor::<E>::new(dir));
    }
}
