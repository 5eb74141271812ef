//! `nr13 eng` command - Engineers and their inspection workload

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::commands::utils::Context;
use crate::cli::output::{field, opt_field, print_structured, rule, section};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::db::EngineerSummary;
use crate::entities::InspectionFilter;

#[derive(Subcommand, Debug)]
pub enum EngCommands {
    /// List engineers with inspection counts
    List(ListArgs),

    /// Show an engineer's workload and open inspections
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Include inactive engineers
    #[arg(long, short = 'a')]
    pub all: bool,

    /// Show count only
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Engineer (user) id
    pub id: i64,
}

const ENGINEER_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 6),
    ColumnDef::new("name", "NAME", 28),
    ColumnDef::new("crea", "CREA", 14),
    ColumnDef::new("total", "TOTAL", 7),
    ColumnDef::new("open", "OPEN", 6),
    ColumnDef::new("done", "DONE", 6),
    ColumnDef::new("next", "NEXT", 12),
    ColumnDef::new("active", "ACTIVE", 10),
];

pub fn run(cmd: EngCommands, global: &GlobalOpts) -> Result<()> {
    let (ctx, _me) = Context::login_required(global)?;
    match cmd {
        EngCommands::List(args) => run_list(&ctx, args, global),
        EngCommands::Show(args) => run_show(&ctx, args, global),
    }
}

fn engineer_row(eng: &EngineerSummary) -> TableRow {
    TableRow::new(eng.id)
        .cell("id", CellValue::Id(eng.id))
        .cell("name", CellValue::Text(eng.nome.clone()))
        .cell(
            "crea",
            eng.crea.clone().map(CellValue::Text).unwrap_or(CellValue::Empty),
        )
        .cell("total", CellValue::Number(eng.total as i64))
        .cell("open", CellValue::Number(eng.abertas as i64))
        .cell("done", CellValue::Number(eng.concluidas as i64))
        .cell("next", CellValue::Date(eng.proxima_agendada))
        .cell("active", CellValue::Active(eng.ativo))
}

fn run_list(ctx: &Context, args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let engineers = ctx.db.list_engineers(args.all)?;

    if args.count {
        println!("{}", engineers.len());
        return Ok(());
    }

    let format = global.format.for_list();
    if print_structured(&engineers, format)? {
        return Ok(());
    }
    if engineers.is_empty() {
        println!("No engineers found.");
        return Ok(());
    }

    let visible: Vec<&str> = ENGINEER_COLUMNS.iter().map(|c| c.key).collect();
    TableFormatter::new(ENGINEER_COLUMNS, "engineer").output(
        engineers.iter().map(engineer_row),
        format,
        &visible,
    );
    Ok(())
}

fn run_show(ctx: &Context, args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let workload = ctx.db.engineer_workload(args.id)?;
    let open: Vec<_> = ctx
        .db
        .list_inspections(&InspectionFilter {
            engenheiro_id: Some(args.id),
            ..Default::default()
        })?
        .into_iter()
        .filter(|d| !d.inspection.status.is_final())
        .collect();

    if global.format.is_structured() {
        let value = serde_json::json!({
            "engineer": workload,
            "open_inspections": open,
        });
        print_structured(&value, global.format)?;
        return Ok(());
    }
    if global.format == OutputFormat::Id {
        println!("{}", workload.id);
        return Ok(());
    }

    rule();
    field("ID", style(workload.id).cyan());
    field("Name", style(&workload.nome).yellow());
    field("E-mail", &workload.email);
    opt_field("CREA", workload.crea.as_deref());
    field("Active", if workload.ativo { "yes" } else { "no" });
    rule();
    field(
        "Inspections",
        format!(
            "{} total, {} open, {} concluded",
            workload.total, workload.abertas, workload.concluidas
        ),
    );
    opt_field("Next scheduled", workload.proxima_agendada);

    if !open.is_empty() {
        section(&format!("Open inspections ({})", open.len()));
        for detail in &open {
            println!(
                "  #{:<5} {}  {:<12} {} ({})",
                detail.inspection.id,
                detail.inspection.data_inspecao,
                detail.equipamento_tag,
                detail.inspection.tipo_inspecao,
                detail.inspection.status
            );
        }
    }
    Ok(())
}
