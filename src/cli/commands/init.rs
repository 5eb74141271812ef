//! `nr13 init` command - Initialize a new workspace

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use tracing::info;

use crate::cli::helpers::resolve_password;
use crate::core::{Config, Database, Workspace, WorkspaceError};
use crate::entities::{NewUser, Role};

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Name of the first administrator
    #[arg(long, default_value = "Administrador")]
    pub admin_name: String,

    /// E-mail (login) of the first administrator
    #[arg(long)]
    pub admin_email: Option<String>,

    /// Password of the first administrator (prompted if omitted)
    #[arg(long, env = "NR13_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,

    /// Reinitialize even if .nr13/ already exists (data is kept)
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        println!(
            "{} Created directory {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
    }

    let workspace = match Workspace::init(&path, args.force) {
        Ok(ws) => ws,
        Err(WorkspaceError::AlreadyExists(existing)) => {
            println!(
                "{} NR-13 workspace already exists at {}",
                style("!").yellow(),
                style(existing.display()).cyan()
            );
            println!();
            println!("Use {} to reinitialize", style("nr13 init --force").yellow());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let config = Config::load(Some(&workspace));
    let db_path = config.database_path(&workspace);
    let db = Database::open(&db_path)?;

    println!(
        "{} Initialized NR-13 workspace at {}",
        style("✓").green(),
        style(workspace.root().display()).cyan()
    );
    println!("   Database: {}", style(db_path.display()).dim());

    if db.count_active_admins()? > 0 {
        println!(
            "{} An administrator already exists; skipping account creation",
            style("!").yellow()
        );
    } else {
        let email = args.admin_email.ok_or_else(|| {
            miette::miette!(
                help = "Re-run with --admin-email <EMAIL>",
                "The first administrator needs an e-mail address"
            )
        })?;
        let password = resolve_password(args.admin_password, "Administrator password", true)?;
        let admin = db.create_user(&NewUser {
            nome: args.admin_name,
            email,
            password,
            tipo_acesso: Role::Admin,
            empresa: None,
            crea: None,
        })?;
        info!(user_id = admin.id, "first administrator created");
        println!(
            "{} Created administrator {} <{}>",
            style("✓").green(),
            style(&admin.nome).yellow(),
            admin.email
        );
    }

    println!();
    println!("Next steps:");
    println!("  {} Log in", style("nr13 login --email <EMAIL>").yellow());
    println!(
        "  {} Register a client company",
        style("nr13 user new --role cliente").yellow()
    );
    println!("  {} Register equipment", style("nr13 equip new").yellow());
    Ok(())
}
