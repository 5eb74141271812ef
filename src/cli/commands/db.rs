//! `nr13 db` command - Database maintenance and ad hoc queries

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use tabled::{builder::Builder, settings::Style};

use crate::cli::commands::utils::Context;
use crate::cli::output::{field, print_structured, rule};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::auth::Action;

#[derive(Subcommand, Debug)]
pub enum DbCommands {
    /// Show database file, schema version and row counts
    Status,

    /// Check the connection, reconnecting if needed
    Check,

    /// Run a read-only SQL query (administrators only)
    Query(QueryArgs),
}

#[derive(clap::Args, Debug)]
pub struct QueryArgs {
    /// SQL statement (SELECT only)
    pub sql: String,
}

pub fn run(cmd: DbCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        DbCommands::Status => run_status(global),
        DbCommands::Check => run_check(global),
        DbCommands::Query(args) => run_query(args, global),
    }
}

fn run_status(global: &GlobalOpts) -> Result<()> {
    let ctx = Context::open(global)?;
    let stats = ctx.db.statistics()?;

    if print_structured(&stats, global.format)? {
        return Ok(());
    }

    rule();
    field(
        "Database",
        stats
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(in memory)".to_string()),
    );
    field("Schema version", stats.schema_version);
    field("Size", format_size(stats.size_bytes));
    rule();
    for (table, count) in &stats.rows {
        println!("  {:<14} {}", table, style(count).cyan());
    }
    Ok(())
}

fn run_check(global: &GlobalOpts) -> Result<()> {
    let mut ctx = Context::open(global)?;
    let reconnected = ctx.db.ensure_connected()?;
    if !global.quiet {
        if reconnected {
            println!("{} Database reachable (reconnected)", style("✓").green());
        } else {
            println!("{} Database reachable", style("✓").green());
        }
    }
    Ok(())
}

fn run_query(args: QueryArgs, global: &GlobalOpts) -> Result<()> {
    let (ctx, me) = Context::login_required(global)?;
    me.require(Action::RawQuery)?;

    let columns = ctx.db.query_columns(&args.sql)?;
    let rows = ctx.db.query_raw(&args.sql)?;

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => {
            let records: Vec<serde_json::Map<String, serde_json::Value>> = rows
                .iter()
                .map(|row| {
                    columns
                        .iter()
                        .cloned()
                        .zip(row.iter().cloned().map(serde_json::Value::String))
                        .collect()
                })
                .collect();
            print_structured(&records, global.format)?;
        }
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(std::io::stdout());
            wtr.write_record(&columns).into_diagnostic()?;
            for row in &rows {
                wtr.write_record(row).into_diagnostic()?;
            }
            wtr.flush().into_diagnostic()?;
        }
        _ => {
            let mut builder = Builder::default();
            builder.push_record(columns.iter());
            for row in &rows {
                builder.push_record(row.iter());
            }
            let mut table = builder.build();
            if global.format == OutputFormat::Md {
                table.with(Style::markdown());
            } else {
                table.with(Style::psql());
            }
            println!("{}", table);
            if !global.quiet {
                println!("\n{} row(s)", style(rows.len()).cyan());
            }
        }
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
