//! Structured (JSON/YAML) output and the key/value layout of `show` commands

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::fmt::Display;

use crate::cli::OutputFormat;

/// Print `value` as JSON or YAML; returns `false` for other formats
pub fn print_structured<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<bool> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value).into_diagnostic()?;
            println!("{}", json);
            Ok(true)
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(value).into_diagnostic()?;
            print!("{}", yaml);
            Ok(true)
        }
        _ => Ok(false),
    }
}

pub fn rule() {
    println!("{}", style("─".repeat(60)).dim());
}

/// `Label: value`
pub fn field(label: &str, value: impl Display) {
    println!("{}: {}", style(label).bold(), value);
}

/// `Label: value`, skipped when absent
pub fn opt_field<T: Display>(label: &str, value: Option<T>) {
    if let Some(v) = value {
        field(label, v);
    }
}

pub fn section(title: &str) {
    println!();
    println!("{}", style(title).bold());
}

pub fn success(message: impl Display) {
    println!("{} {}", style("✓").green(), message);
}
