//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    auth::LoginArgs,
    completions::CompletionsArgs,
    config::ConfigCommands,
    db::DbCommands,
    eng::EngCommands,
    equip::EquipCommands,
    init::InitArgs,
    insp::InspCommands,
    remind::RemindArgs,
    report::ReportCommands,
    status::StatusArgs,
    user::UserCommands,
};
use crate::core::logging::LogFormat;

#[derive(Parser)]
#[command(name = "nr13")]
#[command(author, version, about = "NR-13 pressure-equipment inspection tracker")]
#[command(long_about = "Track pressure vessels, boilers and their NR-13 inspections, issue PDF inspection reports and e-mail maintenance reminders to client companies.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Workspace root (default: auto-detect by finding .nr13/)
    #[arg(long, global = true, env = "NR13_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a workspace, its database and the first administrator
    Init(InitArgs),

    /// Log in and store the session in the workspace
    Login(LoginArgs),

    /// End the current session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// User management (administrators, clients, engineers)
    #[command(subcommand)]
    User(UserCommands),

    /// Engineers and their inspection workload
    #[command(subcommand)]
    Eng(EngCommands),

    /// Equipment management (vessels, boilers, piping, tanks)
    #[command(subcommand)]
    Equip(EquipCommands),

    /// Inspection management
    #[command(subcommand)]
    Insp(InspCommands),

    /// PDF inspection reports
    #[command(subcommand)]
    Report(ReportCommands),

    /// E-mail maintenance and inspection reminders to client companies
    Remind(RemindArgs),

    /// Show the maintenance and inspection dashboard
    Status(StatusArgs),

    /// Configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Database maintenance
    #[command(subcommand)]
    Db(DbCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (pretty for show, tsv for list)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
    /// Just IDs, one per line
    Id,
}

impl OutputFormat {
    /// Format used by list commands when none was given
    pub fn for_list(self) -> Self {
        match self {
            OutputFormat::Auto => OutputFormat::Tsv,
            other => other,
        }
    }

    pub fn is_structured(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["nr13", "equip", "list", "-f", "json", "--verbose"]).unwrap();
        assert_eq!(cli.global.format, OutputFormat::Json);
        assert!(cli.global.verbose);
        assert!(matches!(cli.command, Commands::Equip(_)));
    }

    #[test]
    fn test_auto_format_lists_as_tsv() {
        assert_eq!(OutputFormat::Auto.for_list(), OutputFormat::Tsv);
        assert_eq!(OutputFormat::Csv.for_list(), OutputFormat::Csv);
        assert!(OutputFormat::Yaml.is_structured());
    }
}
