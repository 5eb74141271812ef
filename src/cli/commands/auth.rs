//! `nr13 login`, `nr13 logout` and `nr13 whoami`

use console::style;
use miette::Result;
use tracing::info;

use crate::cli::commands::utils::{discover_workspace, Context};
use crate::cli::helpers::resolve_password;
use crate::cli::output::{field, opt_field, print_structured, rule};
use crate::cli::GlobalOpts;
use crate::core::auth::Session;

#[derive(clap::Args, Debug)]
pub struct LoginArgs {
    /// Login e-mail
    #[arg(long, short = 'e')]
    pub email: String,

    /// Password (prompted if omitted)
    #[arg(long, short = 'p', env = "NR13_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

pub fn run_login(args: LoginArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::open(global)?;
    let password = resolve_password(args.password, "Password", false)?;
    let user = ctx.db.authenticate(&args.email, &password)?;

    Session::new(&user).save(&ctx.workspace.nr13_dir())?;
    info!(user_id = user.id, "logged in");

    if !global.quiet {
        println!(
            "{} Logged in as {} ({})",
            style("✓").green(),
            style(&user.nome).yellow(),
            user.tipo_acesso
        );
    }
    Ok(())
}

pub fn run_logout(global: &GlobalOpts) -> Result<()> {
    let workspace = discover_workspace(global)?;
    if Session::clear(&workspace.nr13_dir())? {
        info!("logged out");
        if !global.quiet {
            println!("{} Logged out", style("✓").green());
        }
    } else if !global.quiet {
        println!("{} Not logged in", style("!").yellow());
    }
    Ok(())
}

pub fn run_whoami(global: &GlobalOpts) -> Result<()> {
    let ctx = Context::open(global)?;
    let user = ctx.current_user()?;

    if print_structured(&user, global.format)? {
        return Ok(());
    }
    if global.format == crate::cli::OutputFormat::Id {
        println!("{}", user.id);
        return Ok(());
    }

    let session = Session::load(&ctx.workspace.nr13_dir())?;
    rule();
    field("User", format!("{} <{}>", style(&user.nome).yellow(), user.email));
    field("Role", user.tipo_acesso);
    opt_field("Company", user.empresa.as_deref());
    opt_field("CREA", user.crea.as_deref());
    if let Some(session) = session {
        field(
            "Logged in",
            session.logged_in_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"),
        );
    }
    rule();
    Ok(())
}
