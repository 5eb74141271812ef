use clap::Parser;
use miette::Result;
use nr13::cli::commands;
use nr13::cli::{Cli, Commands};
use nr13::core::LoggingConfig;

fn main() -> Result<()> {
    // Restore default SIGPIPE so `nr13 ... | head` exits quietly
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let mut global = cli.global;

    LoggingConfig::from_flags(global.verbose, global.quiet, global.log_format).init();
    global.format = commands::utils::resolve_format(&global);

    match cli.command {
        Commands::Init(args) => commands::init::run(args),
        Commands::Login(args) => commands::auth::run_login(args, &global),
        Commands::Logout => commands::auth::run_logout(&global),
        Commands::Whoami => commands::auth::run_whoami(&global),
        Commands::User(cmd) => commands::user::run(cmd, &global),
        Commands::Eng(cmd) => commands::eng::run(cmd, &global),
        Commands::Equip(cmd) => commands::equip::run(cmd, &global),
        Commands::Insp(cmd) => commands::insp::run(cmd, &global),
        Commands::Report(cmd) => commands::report::run(cmd, &global),
        Commands::Remind(args) => commands::remind::run(args, &global),
        Commands::Status(args) => commands::status::run(args, &global),
        Commands::Config(cmd) => commands::config::run(cmd, &global),
        Commands::Db(cmd) => commands::db::run(cmd, &global),
        Commands::Completions(args) => commands::completions::run(args),
    }
}
