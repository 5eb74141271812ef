//! Shared utilities for CLI commands: workspace, database and session loading

use chrono::{Local, NaiveDate};
use clap::ValueEnum;
use miette::Result;
use tracing::{debug, warn};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::auth::Session;
use crate::core::{Config, Database, StoreError, Workspace};
use crate::entities::{InspectionDetail, User};
use crate::render::ReportGenerator;

/// Workspace from `--workspace` or by searching upwards from the current directory
pub fn discover_workspace(global: &GlobalOpts) -> Result<Workspace> {
    let workspace = match &global.workspace {
        Some(path) => Workspace::discover_from(path)?,
        None => Workspace::discover()?,
    };
    Ok(workspace)
}

/// `--format`, or the configured `default_format` when left on `auto`
pub fn resolve_format(global: &GlobalOpts) -> OutputFormat {
    if global.format != OutputFormat::Auto {
        return global.format;
    }
    let workspace = discover_workspace(global).ok();
    let config = Config::load_files(workspace.as_ref());
    parse_format(config.default_format.as_deref())
}

fn parse_format(name: Option<&str>) -> OutputFormat {
    match name.map(str::trim) {
        None | Some("") => OutputFormat::Auto,
        Some(name) => <OutputFormat as ValueEnum>::from_str(name, true).unwrap_or_else(|_| {
            warn!(value = name, "ignoring invalid default_format");
            OutputFormat::Auto
        }),
    }
}

/// Everything a command needs: workspace, merged configuration and open database
pub struct Context {
    pub workspace: Workspace,
    pub config: Config,
    pub db: Database,
}

impl Context {
    pub fn open(global: &GlobalOpts) -> Result<Self> {
        let workspace = discover_workspace(global)?;
        let config = Config::load(Some(&workspace));
        let path = config.database_path(&workspace);
        debug!(path = %path.display(), "opening database");
        let db = Database::open(&path)?;
        Ok(Self {
            workspace,
            config,
            db,
        })
    }

    /// Open the workspace and require a logged-in, active user
    pub fn login_required(global: &GlobalOpts) -> Result<(Self, User)> {
        let ctx = Self::open(global)?;
        let user = ctx.current_user()?;
        Ok((ctx, user))
    }

    /// The user of the stored session, re-read from the database
    pub fn current_user(&self) -> Result<User> {
        let nr13_dir = self.workspace.nr13_dir();
        let session = Session::load(&nr13_dir)?.ok_or_else(|| {
            miette::miette!(help = "Run `nr13 login --email <EMAIL>` first", "Not logged in")
        })?;

        let user = match self.db.get_user(session.user_id) {
            Ok(user) => user,
            Err(StoreError::NotFound { .. }) => {
                Session::clear(&nr13_dir)?;
                return Err(miette::miette!(
                    help = "Log in again",
                    "The logged-in user no longer exists"
                ));
            }
            Err(e) => return Err(e.into()),
        };

        if !user.ativo {
            return Err(miette::miette!(
                help = "Ask an administrator to reactivate the account",
                "User {} is inactive",
                user.email
            ));
        }
        debug!(user_id = user.id, role = %user.tipo_acesso, "session user loaded");
        Ok(user)
    }

    pub fn reports(&self) -> Result<ReportGenerator> {
        let dir = self.config.reports_dir(&self.workspace);
        Ok(ReportGenerator::new(self.workspace.root(), &dir)?)
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Clients may only see inspections of their own company
pub fn ensure_visible(user: &User, detail: &InspectionDetail) -> Result<()> {
    match user.company_scope() {
        Some(company) if company != detail.empresa_id => Err(StoreError::not_found(
            "inspection",
            detail.inspection.id,
        )
        .into()),
        _ => Ok(()),
    }
}
