//! `nr13 user` command - User management

use clap::{Subcommand, ValueEnum};
use console::style;
use miette::Result;

use crate::cli::commands::utils::Context;
use crate::cli::helpers::{confirm_action, resolve_password};
use crate::cli::output::{field, opt_field, print_structured, rule, success};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::auth::Action;
use crate::core::StoreError;
use crate::entities::{NewUser, Role, User, UserFilter, UserPatch};

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// List users with filtering
    List(ListArgs),

    /// Create a user (administrator, client company or engineer)
    New(NewArgs),

    /// Show a user's details
    Show(IdArgs),

    /// Change a user's name, e-mail, role, company or CREA
    Edit(EditArgs),

    /// Reactivate a user
    Activate(IdArgs),

    /// Deactivate a user (they can no longer log in)
    Deactivate(IdArgs),

    /// Change a password (your own unless an id is given)
    Passwd(PasswdArgs),

    /// Delete a user that owns no equipment and has no inspections
    Delete(DeleteArgs),
}

/// Columns to display in list output
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ListColumn {
    Id,
    Name,
    Email,
    Role,
    Company,
    Crea,
    Active,
    Created,
}

impl ListColumn {
    fn key(self) -> &'static str {
        match self {
            ListColumn::Id => "id",
            ListColumn::Name => "name",
            ListColumn::Email => "email",
            ListColumn::Role => "role",
            ListColumn::Company => "company",
            ListColumn::Crea => "crea",
            ListColumn::Active => "active",
            ListColumn::Created => "created",
        }
    }
}

impl std::fmt::Display for ListColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

const USER_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 6),
    ColumnDef::new("name", "NAME", 28),
    ColumnDef::new("email", "EMAIL", 32),
    ColumnDef::new("role", "ROLE", 12),
    ColumnDef::new("company", "COMPANY", 26),
    ColumnDef::new("crea", "CREA", 14),
    ColumnDef::new("active", "ACTIVE", 10),
    ColumnDef::new("created", "CREATED", 18),
];

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by role
    #[arg(long, short = 'r')]
    pub role: Option<Role>,

    /// Include inactive users
    #[arg(long, short = 'a')]
    pub all: bool,

    /// Search in name, e-mail and company
    #[arg(long)]
    pub search: Option<String>,

    /// Columns to display (can specify multiple)
    #[arg(long, value_delimiter = ',', default_values_t = vec![
        ListColumn::Id,
        ListColumn::Name,
        ListColumn::Email,
        ListColumn::Role,
        ListColumn::Company,
        ListColumn::Active,
    ])]
    pub columns: Vec<ListColumn>,

    /// Limit output to N items
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Show count only
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Full name (or contact name for a client company)
    #[arg(long)]
    pub name: String,

    /// Login e-mail
    #[arg(long, short = 'e')]
    pub email: String,

    /// Access level
    #[arg(long, short = 'r', default_value = "cliente")]
    pub role: Role,

    /// Company name (required for clients)
    #[arg(long)]
    pub company: Option<String>,

    /// CREA registration number (required for engineers)
    #[arg(long)]
    pub crea: Option<String>,

    /// Initial password (prompted if omitted)
    #[arg(long, short = 'p')]
    pub password: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct IdArgs {
    /// User id
    pub id: i64,
}

#[derive(clap::Args, Debug)]
pub struct EditArgs {
    /// User id
    pub id: i64,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, short = 'e')]
    pub email: Option<String>,

    #[arg(long, short = 'r')]
    pub role: Option<Role>,

    #[arg(long)]
    pub company: Option<String>,

    #[arg(long)]
    pub crea: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct PasswdArgs {
    /// User id (administrators only; default: yourself)
    pub id: Option<i64>,

    /// New password (prompted if omitted)
    #[arg(long, short = 'p')]
    pub password: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// User id
    pub id: i64,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Run a user subcommand
pub fn run(cmd: UserCommands, global: &GlobalOpts) -> Result<()> {
    let (ctx, me) = Context::login_required(global)?;
    match cmd {
        UserCommands::List(args) => run_list(&ctx, &me, args, global),
        UserCommands::New(args) => run_new(&ctx, &me, args),
        UserCommands::Show(args) => run_show(&ctx, &me, args.id, global),
        UserCommands::Edit(args) => run_edit(&ctx, &me, args),
        UserCommands::Activate(args) => run_set_active(&ctx, &me, args.id, true),
        UserCommands::Deactivate(args) => run_set_active(&ctx, &me, args.id, false),
        UserCommands::Passwd(args) => run_passwd(&ctx, &me, args),
        UserCommands::Delete(args) => run_delete(&ctx, &me, args),
    }
}

fn user_row(user: &User) -> TableRow {
    TableRow::new(user.id)
        .cell("id", CellValue::Id(user.id))
        .cell("name", CellValue::Text(user.nome.clone()))
        .cell("email", CellValue::Text(user.email.clone()))
        .cell("role", CellValue::Role(user.tipo_acesso))
        .cell(
            "company",
            user.empresa
                .clone()
                .map(CellValue::Text)
                .unwrap_or(CellValue::Empty),
        )
        .cell(
            "crea",
            user.crea.clone().map(CellValue::Text).unwrap_or(CellValue::Empty),
        )
        .cell("active", CellValue::Active(user.ativo))
        .cell("created", CellValue::DateTime(user.criado_em))
}

fn run_list(ctx: &Context, me: &User, args: ListArgs, global: &GlobalOpts) -> Result<()> {
    me.require(Action::ManageUsers)?;

    let users = ctx.db.list_users(&UserFilter {
        role: args.role,
        include_inactive: args.all,
        search: args.search,
        limit: args.limit,
    })?;

    if args.count {
        println!("{}", users.len());
        return Ok(());
    }
    if users.is_empty() && !global.format.is_structured() {
        println!("No users found.");
        return Ok(());
    }

    let format = global.format.for_list();
    if print_structured(&users, format)? {
        return Ok(());
    }

    let visible: Vec<&str> = args.columns.iter().map(|c| c.key()).collect();
    TableFormatter::new(USER_COLUMNS, "user").output(users.iter().map(user_row), format, &visible);
    Ok(())
}

fn run_new(ctx: &Context, me: &User, args: NewArgs) -> Result<()> {
    me.require(Action::ManageUsers)?;

    let password = resolve_password(args.password, "Password for the new user", true)?;
    let user = ctx.db.create_user(&NewUser {
        nome: args.name,
        email: args.email,
        password,
        tipo_acesso: args.role,
        empresa: args.company,
        crea: args.crea,
    })?;

    success(format!(
        "Created {} user {} (id {})",
        user.tipo_acesso,
        style(&user.email).yellow(),
        style(user.id).cyan()
    ));
    Ok(())
}

fn run_show(ctx: &Context, me: &User, id: i64, global: &GlobalOpts) -> Result<()> {
    if id != me.id {
        me.require(Action::ManageUsers)?;
    }
    let user = ctx.db.get_user(id)?;

    if print_structured(&user, global.format)? {
        return Ok(());
    }
    if global.format == OutputFormat::Id {
        println!("{}", user.id);
        return Ok(());
    }

    rule();
    field("ID", style(user.id).cyan());
    field("Name", style(&user.nome).yellow());
    field("E-mail", &user.email);
    field("Role", user.tipo_acesso);
    opt_field("Company", user.empresa.as_deref());
    opt_field("CREA", user.crea.as_deref());
    field("Active", if user.ativo { "yes" } else { "no" });
    rule();
    println!(
        "{}: {}",
        style("Created").dim(),
        user.criado_em
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
    );
    Ok(())
}

fn run_edit(ctx: &Context, me: &User, args: EditArgs) -> Result<()> {
    me.require(Action::ManageUsers)?;

    let patch = UserPatch {
        nome: args.name,
        email: args.email,
        tipo_acesso: args.role,
        empresa: args.company,
        crea: args.crea,
    };
    if patch.is_empty() {
        return Err(miette::miette!(
            help = "Pass at least one of --name, --email, --role, --company, --crea",
            "Nothing to change"
        ));
    }

    let user = ctx.db.update_user(args.id, &patch)?;
    success(format!("Updated user {}", style(&user.email).yellow()));
    Ok(())
}

fn run_set_active(ctx: &Context, me: &User, id: i64, active: bool) -> Result<()> {
    me.require(Action::ManageUsers)?;
    if !active && id == me.id {
        return Err(StoreError::conflict("you cannot deactivate your own account").into());
    }

    let user = ctx.db.set_user_active(id, active)?;
    success(format!(
        "{} user {}",
        if active { "Activated" } else { "Deactivated" },
        style(&user.email).yellow()
    ));
    Ok(())
}

fn run_passwd(ctx: &Context, me: &User, args: PasswdArgs) -> Result<()> {
    let id = args.id.unwrap_or(me.id);
    if id != me.id {
        me.require(Action::ManageUsers)?;
    }
    let user = ctx.db.get_user(id)?;

    let password = resolve_password(args.password, "New password", true)?;
    ctx.db.change_password(user.id, &password)?;
    success(format!("Password changed for {}", style(&user.email).yellow()));
    Ok(())
}

fn run_delete(ctx: &Context, me: &User, args: DeleteArgs) -> Result<()> {
    me.require(Action::ManageUsers)?;
    if args.id == me.id {
        return Err(StoreError::conflict("you cannot delete your own account").into());
    }

    let user = ctx.db.get_user(args.id)?;
    if !confirm_action(args.yes, &format!("Delete user {} <{}>?", user.nome, user.email))? {
        println!("Cancelled.");
        return Ok(());
    }

    ctx.db.delete_user(user.id)?;
    success(format!("Deleted user {}", style(&user.email).yellow()));
    Ok(())
}
