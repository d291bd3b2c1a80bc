//! Floor: notifications, audit trail and exports for a workshop floor
//!
//! Business records refer to each other through [`core::EntityReference`]
//! values resolved at run time, so notifications, the activity log and the
//! exporter work with any registered entity kind.

pub mod cli;
pub mod core;
pub mod entities;
