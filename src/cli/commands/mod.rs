//! CLI command implementations

pub mod utils;

pub mod auth;
pub mod completions;
pub mod config;
pub mod db;
pub mod eng;
pub mod equip;
pub mod init;
pub mod insp;
pub mod remind;
pub mod report;
pub mod status;
pub mod user;
