//! nr13: NR-13 pressure equipment inspection tracker
//!
//! Keeps client companies, engineers, boilers and pressure vessels, their
//! inspections and issued reports in an embedded SQLite database, and tracks
//! maintenance and inspection deadlines under the NR-13 regulatory tables.

pub mod cli;
pub mod core;
pub mod entities;
pub mod notify;
pub mod render;
