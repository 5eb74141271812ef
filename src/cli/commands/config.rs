//! `nr13 config` command - Configuration inspection
//!
//! Shows the merged configuration (global file, workspace file, `.env` and
//! environment) and where the configuration files live.

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::commands::utils::discover_workspace;
use crate::cli::output::print_structured;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration (passwords masked)
    Show,

    /// Show paths to configuration files
    Path,
}

pub fn run(cmd: ConfigCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ConfigCommands::Show => run_show(global),
        ConfigCommands::Path => run_path(global),
    }
}

fn run_show(global: &GlobalOpts) -> Result<()> {
    // outside a workspace only the global file and environment apply
    let workspace = discover_workspace(global).ok();
    let config = Config::load(workspace.as_ref()).redacted();

    let format = match global.format {
        OutputFormat::Json => OutputFormat::Json,
        _ => OutputFormat::Yaml,
    };
    print_structured(&config, format)?;

    if let Some(ws) = &workspace {
        if !global.quiet && format == OutputFormat::Yaml {
            eprintln!(
                "{} database: {}",
                style("#").dim(),
                config.database_path(ws).display()
            );
            eprintln!(
                "{} reports:  {}",
                style("#").dim(),
                config.reports_dir(ws).display()
            );
        }
    }
    Ok(())
}

fn run_path(global: &GlobalOpts) -> Result<()> {
    let global_path = Config::global_config_path()
        .ok_or_else(|| miette::miette!("Could not determine the user config directory"))?;
    let workspace_path = discover_workspace(global).map(|ws| ws.config_path());

    if global.format == OutputFormat::Json {
        let value = serde_json::json!({
            "global": global_path,
            "workspace": workspace_path.as_ref().ok(),
        });
        println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
        return Ok(());
    }

    println!("{}", style("Configuration file paths:").bold());
    println!();
    println!("  {} {}", style("Global:").cyan(), global_path.display());
    if global_path.exists() {
        println!("            {}", style("(exists)").green());
    } else {
        println!("            {}", style("(not created)").dim());
    }

    println!();
    match workspace_path {
        Ok(path) => {
            println!("  {} {}", style("Workspace:").cyan(), path.display());
            if path.exists() {
                println!("            {}", style("(exists)").green());
            } else {
                println!("            {}", style("(not created)").dim());
            }
        }
        Err(_) => println!(
            "  {} {}",
            style("Workspace:").cyan(),
            style("(not in an nr13 workspace)").dim()
        ),
    }
    Ok(())
}
