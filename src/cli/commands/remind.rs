//! `nr13 remind` command - E-mail maintenance and inspection reminders

use console::style;
use miette::Result;
use tracing::info;

use crate::cli::commands::utils::{today, Context};
use crate::cli::helpers::parse_days;
use crate::cli::output::print_structured;
use crate::cli::GlobalOpts;
use crate::core::auth::Action;
use crate::notify::{collect_reminders, send_reminders, DryRunMailer, Mailer, SmtpMailer};
use crate::render::TemplateRenderer;

#[derive(clap::Args, Debug)]
pub struct RemindArgs {
    /// Look-ahead window in days (default: due_soon_days from config)
    #[arg(long, short = 'd', value_parser = parse_days)]
    pub days: Option<i64>,

    /// Print the messages instead of sending them
    #[arg(long)]
    pub dry_run: bool,

    /// Send every message to this address instead of the companies
    #[arg(long)]
    pub to: Option<String>,
}

pub fn run(args: RemindArgs, global: &GlobalOpts) -> Result<()> {
    let (ctx, me) = Context::login_required(global)?;
    me.require(Action::SendReminders)?;

    let mailer: Box<dyn Mailer> = if args.dry_run {
        Box::new(DryRunMailer {
            echo: !global.format.is_structured(),
        })
    } else {
        let settings = ctx.config.smtp().ok_or_else(|| {
            miette::miette!(
                help = "Set SMTP_HOST (and SMTP_USERNAME/SMTP_PASSWORD) in .env or the environment, or use --dry-run",
                "No SMTP server configured"
            )
        })?;
        Box::new(SmtpMailer::new(&settings)?)
    };

    let today = today();
    let window = args.days.unwrap_or_else(|| ctx.config.due_soon_days());
    let reminders = collect_reminders(&ctx.db, today, window)?;

    if reminders.is_empty() {
        if !global.quiet {
            println!(
                "{} Nothing due within {} day(s), no reminders to send",
                style("✓").green(),
                window
            );
        }
        return Ok(());
    }

    let renderer = TemplateRenderer::new()?;
    let outcome = send_reminders(
        mailer.as_ref(),
        &renderer,
        &reminders,
        today,
        window,
        args.to.as_deref(),
    );
    info!(
        sent = outcome.sent.len(),
        failed = outcome.failed.len(),
        dry_run = args.dry_run,
        "reminder run finished"
    );

    if global.format.is_structured() {
        print_structured(&outcome, global.format)?;
    } else if !global.quiet {
        let verb = if args.dry_run { "Prepared" } else { "Sent" };
        println!(
            "{} {} {} reminder(s)",
            style("✓").green(),
            verb,
            outcome.sent.len()
        );
        for (company, error) in &outcome.failed {
            println!("{} {}: {}", style("✗").red(), company, error);
        }
    }

    if !outcome.failed.is_empty() {
        return Err(miette::miette!(
            "{} of {} reminder(s) could not be sent",
            outcome.failed.len(),
            reminders.len()
        ));
    }
    Ok(())
}
