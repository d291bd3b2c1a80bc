//! CLI command implementations

pub mod utils;

pub mod activity;
pub mod completions;
pub mod employee;
pub mod export;
pub mod init;
pub mod job;
pub mod leave;
pub mod notify;
pub mod team;
