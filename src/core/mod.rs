//! Core module - storage, rules and configuration

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod maintenance;
pub mod nr13;
pub mod workspace;

pub use auth::{Action, Session};
pub use config::{Config, SmtpSettings};
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use logging::{LogFormat, LoggingConfig};
pub use maintenance::{MaintenanceInfo, MaintenanceStatus};
pub use nr13::{Category, FluidClass};
pub use workspace::{Workspace, WorkspaceError};
