//! `nr13 report` command - Inspection report PDFs

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::commands::utils::{ensure_visible, Context};
use crate::cli::helpers::confirm_action;
use crate::cli::output::{field, opt_field, print_structured, rule, success};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::auth::Action;
use crate::core::StoreError;
use crate::entities::{Report, ReportFilter, Role, User};

#[derive(Subcommand, Debug)]
pub enum ReportCommands {
    /// Generate the PDF report of a concluded inspection
    Generate(GenerateArgs),

    /// List issued reports
    List(ListArgs),

    /// Show a report and the location of its file
    Show(IdArgs),

    /// Rewrite a report's PDF from the current inspection data
    Regenerate(IdArgs),

    /// Delete a report (administrators only)
    Delete(DeleteArgs),
}

#[derive(clap::Args, Debug)]
pub struct GenerateArgs {
    /// Inspection id
    pub inspection: i64,

    /// Observations printed on the report
    #[arg(long)]
    pub obs: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by inspection id
    #[arg(long, short = 'i')]
    pub inspection: Option<i64>,

    /// Filter by client company (user id)
    #[arg(long, short = 'c')]
    pub company: Option<i64>,

    /// Limit output to N items
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Show count only
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct IdArgs {
    /// Report id
    pub id: i64,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Report id
    pub id: i64,

    /// Keep the PDF on disk, only remove the record
    #[arg(long)]
    pub keep_file: bool,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

const REPORT_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 6),
    ColumnDef::new("inspection", "INSPECTION", 11),
    ColumnDef::new("issued", "ISSUED", 12),
    ColumnDef::new("file", "FILE", 48),
    ColumnDef::new("obs", "OBSERVATIONS", 30),
];

pub fn run(cmd: ReportCommands, global: &GlobalOpts) -> Result<()> {
    let (ctx, me) = Context::login_required(global)?;
    match cmd {
        ReportCommands::Generate(args) => run_generate(&ctx, &me, args),
        ReportCommands::List(args) => run_list(&ctx, &me, args, global),
        ReportCommands::Show(args) => run_show(&ctx, &me, args.id, global),
        ReportCommands::Regenerate(args) => run_regenerate(&ctx, &me, args.id),
        ReportCommands::Delete(args) => run_delete(&ctx, &me, args),
    }
}

/// Report actions need GenerateReports; engineers only on their own inspections
fn ensure_can_issue(ctx: &Context, me: &User, inspecao_id: i64) -> Result<()> {
    me.require(Action::GenerateReports)?;
    if me.tipo_acesso == Role::Engenheiro {
        let inspection = ctx.db.get_inspection(inspecao_id)?;
        if inspection.engenheiro_id != me.id {
            return Err(StoreError::Permission(format!(
                "inspection #{} is assigned to another engineer",
                inspecao_id
            ))
            .into());
        }
    }
    Ok(())
}

fn report_row(report: &Report) -> TableRow {
    TableRow::new(report.id)
        .cell("id", CellValue::Id(report.id))
        .cell("inspection", CellValue::Id(report.inspecao_id))
        .cell("issued", CellValue::Date(Some(report.data_emissao)))
        .cell(
            "file",
            CellValue::Text(report.link_arquivo.display().to_string()),
        )
        .cell(
            "obs",
            report
                .observacoes
                .clone()
                .map(CellValue::Text)
                .unwrap_or(CellValue::Empty),
        )
}

fn run_generate(ctx: &Context, me: &User, args: GenerateArgs) -> Result<()> {
    ensure_can_issue(ctx, me, args.inspection)?;

    let generator = ctx.reports()?;
    let report = generator.generate(&ctx.db, args.inspection, args.obs)?;

    success(format!(
        "Generated report {} for inspection #{}",
        style(format!("#{}", report.id)).cyan(),
        report.inspecao_id
    ));
    println!(
        "   {}",
        style(generator.resolve(&report.link_arquivo).display()).dim()
    );
    Ok(())
}

fn run_list(ctx: &Context, me: &User, args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let empresa_id = match (me.company_scope(), args.company) {
        (Some(own), Some(other)) if own != other => {
            return Err(StoreError::Permission(
                "clients can only see their own company's reports".into(),
            )
            .into())
        }
        (Some(own), _) => Some(own),
        (None, requested) => requested,
    };

    let reports = ctx.db.list_reports(&ReportFilter {
        inspecao_id: args.inspection,
        empresa_id,
        engenheiro_id: None,
        limit: args.limit,
    })?;

    if args.count {
        println!("{}", reports.len());
        return Ok(());
    }
    if reports.is_empty() && !global.format.is_structured() {
        println!("No reports found.");
        return Ok(());
    }

    let format = global.format.for_list();
    if print_structured(&reports, format)? {
        return Ok(());
    }

    let visible: Vec<&str> = REPORT_COLUMNS.iter().map(|c| c.key).collect();
    TableFormatter::new(REPORT_COLUMNS, "report").output(
        reports.iter().map(report_row),
        format,
        &visible,
    );
    Ok(())
}

fn run_show(ctx: &Context, me: &User, id: i64, global: &GlobalOpts) -> Result<()> {
    let report = ctx.db.get_report(id)?;
    let detail = ctx.db.get_inspection_detail(report.inspecao_id)?;
    ensure_visible(me, &detail).map_err(|_| StoreError::not_found("report", id))?;

    let path = ctx.reports()?.resolve(&report.link_arquivo);
    let exists = path.is_file();

    if global.format.is_structured() {
        let value = serde_json::json!({
            "report": report,
            "path": path,
            "file_exists": exists,
        });
        print_structured(&value, global.format)?;
        return Ok(());
    }
    if global.format == OutputFormat::Id {
        println!("{}", report.id);
        return Ok(());
    }

    rule();
    field("ID", style(format!("#{}", report.id)).cyan());
    field(
        "Inspection",
        format!(
            "#{} ({}, {})",
            report.inspecao_id, detail.equipamento_tag, detail.inspection.data_inspecao
        ),
    );
    field("Company", &detail.empresa);
    field("Engineer", &detail.engenheiro);
    field("Issued", report.data_emissao);
    opt_field("Observations", report.observacoes.as_deref());
    rule();
    if exists {
        field("File", path.display());
    } else {
        field(
            "File",
            format!("{} {}", path.display(), style("(missing)").red()),
        );
        println!(
            "   Recreate it with {}",
            style(format!("nr13 report regenerate {}", report.id)).yellow()
        );
    }
    Ok(())
}

fn run_regenerate(ctx: &Context, me: &User, id: i64) -> Result<()> {
    let existing = ctx.db.get_report(id)?;
    ensure_can_issue(ctx, me, existing.inspecao_id)?;

    let generator = ctx.reports()?;
    let report = generator.regenerate(&ctx.db, id)?;
    success(format!(
        "Regenerated report {} ({})",
        style(format!("#{}", report.id)).cyan(),
        generator.resolve(&report.link_arquivo).display()
    ));
    Ok(())
}

fn run_delete(ctx: &Context, me: &User, args: DeleteArgs) -> Result<()> {
    if !me.is_admin() {
        return Err(StoreError::Permission("only administrators can delete reports".into()).into());
    }
    let report = ctx.db.get_report(args.id)?;

    if !confirm_action(
        args.yes,
        &format!(
            "Delete report #{} of inspection #{}?",
            report.id, report.inspecao_id
        ),
    )? {
        println!("Cancelled.");
        return Ok(());
    }

    ctx.reports()?.delete(&ctx.db, report.id, args.keep_file)?;
    success(format!(
        "Deleted report {}{}",
        style(format!("#{}", report.id)).cyan(),
        if args.keep_file { " (file kept)" } else { "" }
    ));
    Ok(())
}
