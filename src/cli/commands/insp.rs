//! `nr13 insp` command - Inspection management

use chrono::NaiveDate;
use clap::{Subcommand, ValueEnum};
use console::style;
use miette::Result;

use crate::cli::commands::utils::{ensure_visible, today, Context};
use crate::cli::helpers::{confirm_action, describe_days, format_date, parse_date, parse_days};
use crate::cli::output::{field, print_structured, rule, section, success};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::auth::Action;
use crate::core::db::UpcomingInspection;
use crate::core::StoreError;
use crate::entities::{
    Inspection, InspectionDetail, InspectionFilter, InspectionKind, InspectionPatch,
    InspectionResult, InspectionStatus, NewInspection, ReportFilter, Role, User,
};

#[derive(Subcommand, Debug)]
pub enum InspCommands {
    /// List inspections, newest first
    List(ListArgs),

    /// Schedule or register an inspection
    New(NewArgs),

    /// Show an inspection with equipment, engineer and reports
    Show(IdArgs),

    /// Change an open inspection
    Edit(EditArgs),

    /// Record the result and conclude an inspection
    Complete(CompleteArgs),

    /// Cancel an open inspection
    Cancel(ConfirmArgs),

    /// Delete an inspection that has no reports
    Delete(ConfirmArgs),

    /// Inspections falling due in the next days (overdue ones included)
    Upcoming(UpcomingArgs),
}

/// Columns to display in list output
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ListColumn {
    Id,
    Date,
    Equipment,
    Company,
    Engineer,
    Type,
    Status,
    Result,
    Next,
}

impl ListColumn {
    fn key(self) -> &'static str {
        match self {
            ListColumn::Id => "id",
            ListColumn::Date => "date",
            ListColumn::Equipment => "equipment",
            ListColumn::Company => "company",
            ListColumn::Engineer => "engineer",
            ListColumn::Type => "type",
            ListColumn::Status => "status",
            ListColumn::Result => "result",
            ListColumn::Next => "next",
        }
    }
}

impl std::fmt::Display for ListColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

const INSPECTION_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 6),
    ColumnDef::new("date", "DATE", 12),
    ColumnDef::new("due", "DUE", 12),
    ColumnDef::new("days", "DAYS", 6),
    ColumnDef::new("equipment", "EQUIPMENT", 16),
    ColumnDef::new("company", "COMPANY", 24),
    ColumnDef::new("engineer", "ENGINEER", 22),
    ColumnDef::new("type", "TYPE", 20),
    ColumnDef::new("status", "STATUS", 14),
    ColumnDef::new("result", "RESULT", 16),
    ColumnDef::new("next", "NEXT", 12),
    ColumnDef::new("kind", "KIND", 10),
];

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by equipment id
    #[arg(long, short = 'e')]
    pub equipment: Option<i64>,

    /// Filter by engineer (user id)
    #[arg(long)]
    pub engineer: Option<i64>,

    /// Only inspections assigned to me
    #[arg(long, conflicts_with = "engineer")]
    pub mine: bool,

    /// Filter by client company (user id)
    #[arg(long, short = 'c')]
    pub company: Option<i64>,

    /// Filter by status
    #[arg(long, short = 's')]
    pub status: Option<InspectionStatus>,

    /// Inspections on or after this date
    #[arg(long, value_parser = parse_date)]
    pub from: Option<NaiveDate>,

    /// Inspections on or before this date
    #[arg(long, value_parser = parse_date)]
    pub to: Option<NaiveDate>,

    /// Columns to display (can specify multiple)
    #[arg(long, value_delimiter = ',', default_values_t = vec![
        ListColumn::Id,
        ListColumn::Date,
        ListColumn::Equipment,
        ListColumn::Engineer,
        ListColumn::Type,
        ListColumn::Status,
        ListColumn::Result,
        ListColumn::Next,
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
    /// Equipment id
    #[arg(long, short = 'e')]
    pub equipment: i64,

    /// Responsible engineer (user id; default: yourself when you are an engineer)
    #[arg(long)]
    pub engineer: Option<i64>,

    /// Inspection date (default: today)
    #[arg(long, short = 'd', value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Inspection type
    #[arg(long = "type", short = 't', default_value = "periodica_externa")]
    pub kind: InspectionKind,

    /// Initial status (agendada or em_andamento)
    #[arg(long, short = 's', default_value = "agendada")]
    pub status: InspectionStatus,

    #[arg(long)]
    pub recommendations: Option<String>,

    /// Next inspection date (default: from the NR-13 interval table)
    #[arg(long, value_parser = parse_date)]
    pub next: Option<NaiveDate>,
}

#[derive(clap::Args, Debug)]
pub struct EditArgs {
    /// Inspection id
    pub id: i64,

    /// Reassign to another engineer (user id)
    #[arg(long)]
    pub engineer: Option<i64>,

    #[arg(long, short = 'd', value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    #[arg(long = "type", short = 't')]
    pub kind: Option<InspectionKind>,

    #[arg(long, short = 's')]
    pub status: Option<InspectionStatus>,

    #[arg(long)]
    pub recommendations: Option<String>,

    #[arg(long, value_parser = parse_date)]
    pub next: Option<NaiveDate>,
}

#[derive(clap::Args, Debug)]
pub struct CompleteArgs {
    /// Inspection id
    pub id: i64,

    /// Result (aprovado, aprovado_com_restricoes, reprovado)
    #[arg(long, short = 'r')]
    pub result: InspectionResult,

    #[arg(long)]
    pub recommendations: Option<String>,

    /// Next inspection date (default: kept, or from the NR-13 interval table)
    #[arg(long, value_parser = parse_date)]
    pub next: Option<NaiveDate>,
}

#[derive(clap::Args, Debug)]
pub struct IdArgs {
    /// Inspection id
    pub id: i64,
}

#[derive(clap::Args, Debug)]
pub struct ConfirmArgs {
    /// Inspection id
    pub id: i64,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct UpcomingArgs {
    /// Look-ahead window in days (default: due_soon_days from config)
    #[arg(long, short = 'd', value_parser = parse_days)]
    pub days: Option<i64>,

    /// Only this client company (user id)
    #[arg(long, short = 'c')]
    pub company: Option<i64>,
}

/// Run an insp subcommand
pub fn run(cmd: InspCommands, global: &GlobalOpts) -> Result<()> {
    let (mut ctx, me) = Context::login_required(global)?;
    match cmd {
        InspCommands::List(args) => run_list(&ctx, &me, args, global),
        InspCommands::New(args) => run_new(&ctx, &me, args),
        InspCommands::Show(args) => run_show(&ctx, &me, args.id, global),
        InspCommands::Edit(args) => run_edit(&ctx, &me, args),
        InspCommands::Complete(args) => run_complete(&mut ctx, &me, args),
        InspCommands::Cancel(args) => run_cancel(&ctx, &me, args),
        InspCommands::Delete(args) => run_delete(&ctx, &me, args),
        InspCommands::Upcoming(args) => run_upcoming(&ctx, &me, args, global),
    }
}

/// Engineers may only change their own inspections
fn ensure_can_manage(me: &User, inspection: &Inspection) -> Result<()> {
    me.require(Action::ManageInspections)?;
    if me.tipo_acesso == Role::Engenheiro && inspection.engenheiro_id != me.id {
        return Err(StoreError::Permission(format!(
            "inspection #{} is assigned to another engineer",
            inspection.id
        ))
        .into());
    }
    Ok(())
}

fn company_filter(me: &User, requested: Option<i64>) -> Result<Option<i64>> {
    match (me.company_scope(), requested) {
        (Some(own), Some(other)) if own != other => Err(StoreError::Permission(
            "clients can only see their own company's inspections".into(),
        )
        .into()),
        (Some(own), _) => Ok(Some(own)),
        (None, requested) => Ok(requested),
    }
}

fn inspection_row(detail: &InspectionDetail) -> TableRow {
    let i = &detail.inspection;
    TableRow::new(i.id)
        .cell("id", CellValue::Id(i.id))
        .cell("date", CellValue::Date(Some(i.data_inspecao)))
        .cell("equipment", CellValue::Text(detail.equipamento_tag.clone()))
        .cell("company", CellValue::Text(detail.empresa.clone()))
        .cell("engineer", CellValue::Text(detail.engenheiro.clone()))
        .cell("type", CellValue::Text(i.tipo_inspecao.to_string()))
        .cell("status", CellValue::InspStatus(i.status))
        .cell("result", CellValue::Verdict(i.resultado))
        .cell("next", CellValue::Date(i.proxima_inspecao))
}

fn run_list(ctx: &Context, me: &User, args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let engenheiro_id = if args.mine { Some(me.id) } else { args.engineer };
    let inspections = ctx.db.list_inspections(&InspectionFilter {
        equipamento_id: args.equipment,
        engenheiro_id,
        empresa_id: company_filter(me, args.company)?,
        status: args.status,
        from: args.from,
        to: args.to,
        limit: args.limit,
    })?;

    if args.count {
        println!("{}", inspections.len());
        return Ok(());
    }
    if inspections.is_empty() && !global.format.is_structured() {
        println!("No inspections found.");
        return Ok(());
    }

    let format = global.format.for_list();
    if print_structured(&inspections, format)? {
        return Ok(());
    }

    let visible: Vec<&str> = args.columns.iter().map(|c| c.key()).collect();
    TableFormatter::new(INSPECTION_COLUMNS, "inspection").output(
        inspections.iter().map(inspection_row),
        format,
        &visible,
    );
    Ok(())
}

fn run_new(ctx: &Context, me: &User, args: NewArgs) -> Result<()> {
    me.require(Action::ManageInspections)?;

    let engenheiro_id = match (me.tipo_acesso, args.engineer) {
        (Role::Engenheiro, Some(other)) if other != me.id => {
            return Err(StoreError::Permission(
                "engineers can only schedule inspections for themselves".into(),
            )
            .into())
        }
        (Role::Engenheiro, _) => me.id,
        (_, Some(id)) => id,
        (_, None) => {
            return Err(miette::miette!(
                help = "Pass --engineer <USER_ID>; see `nr13 eng list`",
                "An engineer must be assigned to the inspection"
            ))
        }
    };

    let inspection = ctx.db.create_inspection(&NewInspection {
        equipamento_id: args.equipment,
        engenheiro_id,
        data_inspecao: args.date.unwrap_or_else(today),
        tipo_inspecao: args.kind,
        recomendacoes: args.recommendations,
        proxima_inspecao: args.next,
        status: args.status,
    })?;

    success(format!(
        "Created inspection {} on {} ({})",
        style(format!("#{}", inspection.id)).cyan(),
        inspection.data_inspecao,
        inspection.tipo_inspecao
    ));
    if let Some(next) = inspection.proxima_inspecao {
        println!("   Next inspection: {}", style(next).yellow());
    }
    Ok(())
}

fn run_show(ctx: &Context, me: &User, id: i64, global: &GlobalOpts) -> Result<()> {
    let detail = ctx.db.get_inspection_detail(id)?;
    ensure_visible(me, &detail)?;
    let reports = ctx.db.list_reports(&ReportFilter {
        inspecao_id: Some(id),
        ..Default::default()
    })?;

    if global.format.is_structured() {
        let value = serde_json::json!({
            "inspection": detail,
            "reports": reports,
        });
        print_structured(&value, global.format)?;
        return Ok(());
    }
    if global.format == OutputFormat::Id {
        println!("{}", id);
        return Ok(());
    }

    let i = &detail.inspection;
    rule();
    field("ID", style(format!("#{}", i.id)).cyan());
    field(
        "Equipment",
        format!("{} (id {})", style(&detail.equipamento_tag).yellow(), i.equipamento_id),
    );
    field("Company", &detail.empresa);
    field(
        "Engineer",
        match &detail.engenheiro_crea {
            Some(crea) => format!("{} (CREA {})", detail.engenheiro, crea),
            None => detail.engenheiro.clone(),
        },
    );
    rule();
    field("Date", i.data_inspecao);
    field("Type", i.tipo_inspecao);
    field("Status", CellValue::InspStatus(i.status).format_tsv(0));
    field("Result", CellValue::Verdict(i.resultado).format_tsv(0));
    field("Next inspection", format_date(i.proxima_inspecao));
    if let Some(rec) = &i.recomendacoes {
        section("Recommendations");
        println!("{}", rec);
    }

    if !reports.is_empty() {
        section(&format!("Reports ({})", reports.len()));
        for report in &reports {
            println!(
                "  #{:<5} {}  {}",
                report.id,
                report.data_emissao,
                style(report.link_arquivo.display()).dim()
            );
        }
    }
    Ok(())
}

fn run_edit(ctx: &Context, me: &User, args: EditArgs) -> Result<()> {
    let current = ctx.db.get_inspection(args.id)?;
    ensure_can_manage(me, &current)?;
    if me.tipo_acesso == Role::Engenheiro && args.engineer.is_some_and(|e| e != me.id) {
        return Err(StoreError::Permission(
            "engineers cannot reassign inspections to someone else".into(),
        )
        .into());
    }

    let patch = InspectionPatch {
        engenheiro_id: args.engineer,
        data_inspecao: args.date,
        tipo_inspecao: args.kind,
        recomendacoes: args.recommendations,
        proxima_inspecao: args.next,
        status: args.status,
    };
    let inspection = ctx.db.update_inspection(args.id, &patch)?;
    success(format!(
        "Updated inspection {}",
        style(format!("#{}", inspection.id)).cyan()
    ));
    Ok(())
}

fn run_complete(ctx: &mut Context, me: &User, args: CompleteArgs) -> Result<()> {
    let current = ctx.db.get_inspection(args.id)?;
    ensure_can_manage(me, &current)?;

    let inspection =
        ctx.db
            .complete_inspection(args.id, args.result, args.recommendations, args.next)?;

    success(format!(
        "Concluded inspection {}: {}",
        style(format!("#{}", inspection.id)).cyan(),
        CellValue::Verdict(inspection.resultado).format_tsv(0)
    ));
    println!(
        "   Next inspection: {}",
        style(format_date(inspection.proxima_inspecao)).yellow()
    );
    println!(
        "   Generate the report with {}",
        style(format!("nr13 report generate {}", inspection.id)).yellow()
    );
    Ok(())
}

fn run_cancel(ctx: &Context, me: &User, args: ConfirmArgs) -> Result<()> {
    let current = ctx.db.get_inspection(args.id)?;
    ensure_can_manage(me, &current)?;

    if !confirm_action(args.yes, &format!("Cancel inspection #{}?", args.id))? {
        println!("Cancelled.");
        return Ok(());
    }
    ctx.db.cancel_inspection(args.id)?;
    success(format!("Inspection {} cancelled", style(format!("#{}", args.id)).cyan()));
    Ok(())
}

fn run_delete(ctx: &Context, me: &User, args: ConfirmArgs) -> Result<()> {
    let current = ctx.db.get_inspection(args.id)?;
    ensure_can_manage(me, &current)?;

    if !confirm_action(args.yes, &format!("Delete inspection #{}?", args.id))? {
        println!("Cancelled.");
        return Ok(());
    }
    ctx.db.delete_inspection(args.id)?;
    success(format!("Deleted inspection {}", style(format!("#{}", args.id)).cyan()));
    Ok(())
}

fn upcoming_row(upcoming: &UpcomingInspection, today: NaiveDate) -> TableRow {
    inspection_row(&upcoming.detail)
        .cell("due", CellValue::Date(Some(upcoming.due)))
        .cell("days", CellValue::Days(Some((upcoming.due - today).num_days())))
        .cell(
            "kind",
            CellValue::Text(if upcoming.scheduled { "scheduled" } else { "next due" }.into()),
        )
}

fn run_upcoming(ctx: &Context, me: &User, args: UpcomingArgs, global: &GlobalOpts) -> Result<()> {
    let today = today();
    let window = args.days.unwrap_or_else(|| ctx.config.due_soon_days());
    let upcoming = ctx
        .db
        .upcoming_inspections(today, window, company_filter(me, args.company)?)?;

    let format = global.format.for_list();
    if print_structured(&upcoming, format)? {
        return Ok(());
    }
    if upcoming.is_empty() {
        println!(
            "{} No inspections due within {} day(s)",
            style("✓").green(),
            window
        );
        return Ok(());
    }

    if format == OutputFormat::Tsv && !global.quiet {
        let overdue = upcoming.iter().filter(|u| u.due < today).count();
        if overdue > 0 {
            println!(
                "{} {} inspection(s) overdue, earliest {}",
                style("!").red().bold(),
                overdue,
                describe_days(upcoming.first().map(|u| (u.due - today).num_days()))
            );
        }
    }

    let columns = ["id", "due", "days", "equipment", "company", "engineer", "type", "kind"];
    TableFormatter::new(INSPECTION_COLUMNS, "inspection").output(
        upcoming.iter().map(|u| upcoming_row(u, today)),
        format,
        &columns,
    );
    Ok(())
}
