//! `nr13 equip` command - Equipment management

use clap::{Subcommand, ValueEnum};
use console::style;
use miette::Result;
use std::path::PathBuf;

use crate::cli::commands::utils::{today, Context};
use crate::cli::helpers::{
    confirm_action, describe_days, format_date, or_dash, parse_date, parse_days,
};
use crate::cli::output::{field, opt_field, print_structured, rule, section, success};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::auth::Action;
use crate::core::maintenance::{MaintenanceInfo, MaintenanceStatus};
use crate::core::nr13::{Category, FluidClass, PotentialGroup};
use crate::core::StoreError;
use crate::entities::{
    EquipmentFilter, EquipmentPatch, EquipmentSummary, EquipmentType, InspectionFilter,
    MaintenanceQuery, NewEquipment, User,
};

#[derive(Subcommand, Debug)]
pub enum EquipCommands {
    /// List equipment with filtering
    List(ListArgs),

    /// Register new equipment
    New(NewArgs),

    /// Show equipment details, maintenance status and inspections
    Show(IdArgs),

    /// Change equipment fields
    Edit(EditArgs),

    /// Reactivate equipment
    Activate(IdArgs),

    /// Deactivate equipment (kept for history, hidden from lists)
    Deactivate(IdArgs),

    /// Delete equipment that has no inspections
    Delete(DeleteArgs),

    /// Equipment whose maintenance is overdue or due soon
    Due(DueArgs),

    /// Bulk-create equipment from a CSV file (all rows or none)
    Import(ImportArgs),

    /// Compute the NR-13 category from fluid class, pressure and volume
    Category(CategoryArgs),
}

/// Columns to display in list output
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ListColumn {
    Id,
    Tag,
    Type,
    Category,
    Company,
    Manufacturer,
    Serial,
    Location,
    Pmta,
    Volume,
    Frequency,
    Last,
    Next,
    Days,
    Maintenance,
    Active,
}

impl ListColumn {
    fn key(self) -> &'static str {
        match self {
            ListColumn::Id => "id",
            ListColumn::Tag => "tag",
            ListColumn::Type => "type",
            ListColumn::Category => "category",
            ListColumn::Company => "company",
            ListColumn::Manufacturer => "manufacturer",
            ListColumn::Serial => "serial",
            ListColumn::Location => "location",
            ListColumn::Pmta => "pmta",
            ListColumn::Volume => "volume",
            ListColumn::Frequency => "frequency",
            ListColumn::Last => "last",
            ListColumn::Next => "next",
            ListColumn::Days => "days",
            ListColumn::Maintenance => "maintenance",
            ListColumn::Active => "active",
        }
    }
}

impl std::fmt::Display for ListColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

const EQUIPMENT_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 6),
    ColumnDef::new("tag", "TAG", 16),
    ColumnDef::new("type", "TYPE", 14),
    ColumnDef::new("category", "CAT", 5),
    ColumnDef::new("company", "COMPANY", 24),
    ColumnDef::new("manufacturer", "MANUFACTURER", 20),
    ColumnDef::new("serial", "SERIAL", 16),
    ColumnDef::new("location", "LOCATION", 20),
    ColumnDef::new("pmta", "PMTA", 8),
    ColumnDef::new("volume", "VOL", 8),
    ColumnDef::new("frequency", "FREQ", 6),
    ColumnDef::new("last", "LAST MAINT", 12),
    ColumnDef::new("next", "NEXT DUE", 12),
    ColumnDef::new("days", "DAYS", 6),
    ColumnDef::new("maintenance", "STATUS", 13),
    ColumnDef::new("active", "ACTIVE", 10),
];

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by client company (user id)
    #[arg(long, short = 'c')]
    pub company: Option<i64>,

    /// Filter by NR-13 category
    #[arg(long)]
    pub category: Option<Category>,

    /// Filter by equipment type
    #[arg(long = "type", short = 't')]
    pub tipo: Option<EquipmentType>,

    /// Filter by maintenance status (overdue, due_soon, ok, unscheduled)
    #[arg(long, short = 'm')]
    pub maintenance: Option<MaintenanceStatus>,

    /// Search in tag, manufacturer, serial number and location
    #[arg(long)]
    pub search: Option<String>,

    /// Include inactive equipment
    #[arg(long, short = 'a')]
    pub all: bool,

    /// Columns to display (can specify multiple)
    #[arg(long, value_delimiter = ',', default_values_t = vec![
        ListColumn::Id,
        ListColumn::Tag,
        ListColumn::Type,
        ListColumn::Category,
        ListColumn::Company,
        ListColumn::Next,
        ListColumn::Days,
        ListColumn::Maintenance,
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
    /// Equipment tag (unique per company)
    #[arg(long)]
    pub tag: String,

    /// Owning client company (user id)
    #[arg(long, short = 'c')]
    pub company: i64,

    /// Equipment type
    #[arg(long = "type", short = 't', default_value = "vaso_pressao")]
    pub tipo: EquipmentType,

    /// NR-13 category (computed from class, PMTA and volume when omitted)
    #[arg(long)]
    pub category: Option<Category>,

    #[arg(long)]
    pub manufacturer: Option<String>,

    #[arg(long)]
    pub serial: Option<String>,

    /// Year of manufacture
    #[arg(long)]
    pub year: Option<i32>,

    /// Design pressure (MPa)
    #[arg(long)]
    pub design_pressure: Option<f64>,

    /// Operating pressure (MPa)
    #[arg(long)]
    pub working_pressure: Option<f64>,

    /// Maximum allowable working pressure (MPa)
    #[arg(long)]
    pub pmta: Option<f64>,

    /// Internal volume (m³)
    #[arg(long)]
    pub volume: Option<f64>,

    #[arg(long)]
    pub fluid: Option<String>,

    /// NR-13 fluid class (A, B, C or D)
    #[arg(long)]
    pub fluid_class: Option<FluidClass>,

    #[arg(long)]
    pub location: Option<String>,

    /// The equipment's record book (prontuário) is on file
    #[arg(long)]
    pub prontuario: bool,

    /// Days between maintenance interventions
    #[arg(long)]
    pub frequency: Option<i64>,

    /// Date of the last maintenance
    #[arg(long, value_parser = parse_date)]
    pub last_maintenance: Option<chrono::NaiveDate>,
}

#[derive(clap::Args, Debug)]
pub struct EditArgs {
    /// Equipment id
    pub id: i64,

    #[arg(long)]
    pub tag: Option<String>,

    /// Move to another client company (user id)
    #[arg(long, short = 'c')]
    pub company: Option<i64>,

    #[arg(long = "type", short = 't')]
    pub tipo: Option<EquipmentType>,

    #[arg(long)]
    pub category: Option<Category>,

    #[arg(long)]
    pub manufacturer: Option<String>,

    #[arg(long)]
    pub serial: Option<String>,

    #[arg(long)]
    pub year: Option<i32>,

    #[arg(long)]
    pub design_pressure: Option<f64>,

    #[arg(long)]
    pub working_pressure: Option<f64>,

    #[arg(long)]
    pub pmta: Option<f64>,

    #[arg(long)]
    pub volume: Option<f64>,

    #[arg(long)]
    pub fluid: Option<String>,

    #[arg(long)]
    pub fluid_class: Option<FluidClass>,

    #[arg(long)]
    pub location: Option<String>,

    /// Whether the record book (prontuário) is on file
    #[arg(long)]
    pub prontuario: Option<bool>,

    #[arg(long)]
    pub frequency: Option<i64>,

    #[arg(long, value_parser = parse_date)]
    pub last_maintenance: Option<chrono::NaiveDate>,
}

#[derive(clap::Args, Debug)]
pub struct IdArgs {
    /// Equipment id
    pub id: i64,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Equipment id
    pub id: i64,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct DueArgs {
    /// Look-ahead window in days (default: due_soon_days from config)
    #[arg(long, short = 'd', value_parser = parse_days)]
    pub days: Option<i64>,

    /// Only this client company (user id)
    #[arg(long, short = 'c')]
    pub company: Option<i64>,
}

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// CSV file with a header row (tag, empresa_id, tipo, categoria, ...)
    pub file: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct CategoryArgs {
    /// NR-13 fluid class (A, B, C or D)
    #[arg(long)]
    pub class: FluidClass,

    /// Pressure (MPa), normally the PMTA
    #[arg(long)]
    pub pressure: f64,

    /// Internal volume (m³)
    #[arg(long)]
    pub volume: f64,
}

/// Run an equip subcommand
pub fn run(cmd: EquipCommands, global: &GlobalOpts) -> Result<()> {
    if let EquipCommands::Category(args) = cmd {
        return run_category(args, global);
    }

    let (mut ctx, me) = Context::login_required(global)?;
    match cmd {
        EquipCommands::List(args) => run_list(&ctx, &me, args, global),
        EquipCommands::New(args) => run_new(&ctx, &me, args),
        EquipCommands::Show(args) => run_show(&ctx, &me, args.id, global),
        EquipCommands::Edit(args) => run_edit(&ctx, &me, args),
        EquipCommands::Activate(args) => run_set_active(&ctx, &me, args.id, true),
        EquipCommands::Deactivate(args) => run_set_active(&ctx, &me, args.id, false),
        EquipCommands::Delete(args) => run_delete(&ctx, &me, args),
        EquipCommands::Due(args) => run_due(&ctx, &me, args, global),
        EquipCommands::Import(args) => run_import(&mut ctx, &me, args),
        EquipCommands::Category(args) => run_category(args, global),
    }
}

/// Clients only see their own company's equipment
fn company_filter(me: &User, requested: Option<i64>) -> Result<Option<i64>> {
    match (me.company_scope(), requested) {
        (Some(own), Some(other)) if own != other => Err(StoreError::Permission(
            "clients can only list their own company's equipment".into(),
        )
        .into()),
        (Some(own), _) => Ok(Some(own)),
        (None, requested) => Ok(requested),
    }
}

fn load_visible(ctx: &Context, me: &User, id: i64) -> Result<EquipmentSummary> {
    let summary = ctx.db.get_equipment_summary(id)?;
    match me.company_scope() {
        Some(own) if own != summary.equipment.empresa_id => {
            Err(StoreError::not_found("equipment", id).into())
        }
        _ => Ok(summary),
    }
}

fn equipment_row(summary: &EquipmentSummary, info: &MaintenanceInfo) -> TableRow {
    let eq = &summary.equipment;
    let text = |value: &Option<String>| value.clone().map(CellValue::Text).unwrap_or(CellValue::Empty);
    TableRow::new(eq.id)
        .cell("id", CellValue::Id(eq.id))
        .cell("tag", CellValue::Text(eq.tag.clone()))
        .cell("type", CellValue::Text(eq.tipo.to_string()))
        .cell("category", CellValue::Category(eq.effective_category()))
        .cell("company", CellValue::Text(summary.empresa.clone()))
        .cell("manufacturer", text(&eq.fabricante))
        .cell("serial", text(&eq.numero_serie))
        .cell("location", text(&eq.localizacao))
        .cell("pmta", CellValue::Float(eq.pmta, 2))
        .cell("volume", CellValue::Float(eq.volume, 2))
        .cell(
            "frequency",
            eq.frequencia_manutencao.map(CellValue::Number).unwrap_or(CellValue::Empty),
        )
        .cell("last", CellValue::Date(eq.data_ultima_manutencao))
        .cell("next", CellValue::Date(info.next_due))
        .cell("days", CellValue::Days(info.days_remaining))
        .cell("maintenance", CellValue::Maintenance(info.status))
        .cell("active", CellValue::Active(eq.ativo))
}

#[derive(serde::Serialize)]
struct EquipmentWithMaintenance<'a> {
    #[serde(flatten)]
    summary: &'a EquipmentSummary,
    maintenance: MaintenanceInfo,
}

fn print_equipment_list(
    items: &[(EquipmentSummary, MaintenanceInfo)],
    columns: &[&str],
    format: OutputFormat,
) -> Result<()> {
    if format.is_structured() {
        let values: Vec<_> = items
            .iter()
            .map(|(summary, info)| EquipmentWithMaintenance {
                summary,
                maintenance: *info,
            })
            .collect();
        print_structured(&values, format)?;
        return Ok(());
    }

    TableFormatter::new(EQUIPMENT_COLUMNS, "equipment").output(
        items.iter().map(|(s, i)| equipment_row(s, i)),
        format,
        columns,
    );
    Ok(())
}

fn run_list(ctx: &Context, me: &User, args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let today = today();
    let due_soon_days = ctx.config.due_soon_days();
    let filter = EquipmentFilter {
        empresa_id: company_filter(me, args.company)?,
        categoria: args.category,
        tipo: args.tipo,
        include_inactive: args.all,
        search: args.search,
        maintenance: args.maintenance.map(|status| MaintenanceQuery {
            status,
            today,
            due_soon_days,
        }),
        limit: args.limit,
    };

    let items: Vec<_> = ctx
        .db
        .get_all_equipment(&filter)?
        .into_iter()
        .map(|s| {
            let info = s.equipment.maintenance(today, due_soon_days);
            (s, info)
        })
        .collect();

    if args.count {
        println!("{}", items.len());
        return Ok(());
    }
    if items.is_empty() && !global.format.is_structured() {
        println!("No equipment found.");
        return Ok(());
    }

    let visible: Vec<&str> = args.columns.iter().map(|c| c.key()).collect();
    print_equipment_list(&items, &visible, global.format.for_list())
}

fn run_new(ctx: &Context, me: &User, args: NewArgs) -> Result<()> {
    me.require(Action::ManageEquipment)?;

    let equipment = ctx.db.create_equipment(&NewEquipment {
        tag: args.tag,
        tipo: args.tipo,
        categoria: args.category,
        empresa_id: args.company,
        fabricante: args.manufacturer,
        numero_serie: args.serial,
        ano_fabricacao: args.year,
        pressao_projeto: args.design_pressure,
        pressao_trabalho: args.working_pressure,
        pmta: args.pmta,
        volume: args.volume,
        fluido: args.fluid,
        classe_fluido: args.fluid_class,
        localizacao: args.location,
        possui_prontuario: args.prontuario,
        frequencia_manutencao: args.frequency,
        data_ultima_manutencao: args.last_maintenance,
    })?;

    success(format!(
        "Registered {} {} (id {})",
        equipment.tipo,
        style(&equipment.tag).yellow(),
        style(equipment.id).cyan()
    ));
    if let Some(category) = equipment.categoria {
        println!("   NR-13 category: {}", style(category).bold());
    }
    Ok(())
}

fn run_show(ctx: &Context, me: &User, id: i64, global: &GlobalOpts) -> Result<()> {
    let summary = load_visible(ctx, me, id)?;
    let info = summary.equipment.maintenance(today(), ctx.config.due_soon_days());
    let inspections = ctx.db.list_inspections(&InspectionFilter {
        equipamento_id: Some(id),
        ..Default::default()
    })?;

    if global.format.is_structured() {
        let value = serde_json::json!({
            "equipment": summary,
            "maintenance": info,
            "inspections": inspections,
        });
        print_structured(&value, global.format)?;
        return Ok(());
    }
    if global.format == OutputFormat::Id {
        println!("{}", id);
        return Ok(());
    }

    let eq = &summary.equipment;
    rule();
    field("ID", style(eq.id).cyan());
    field("Tag", style(&eq.tag).yellow());
    field("Type", eq.tipo);
    field("Company", format!("{} (id {})", summary.empresa, eq.empresa_id));
    match (eq.categoria, eq.effective_category()) {
        (Some(category), _) => field("Category", category),
        (None, Some(computed)) => field("Category", format!("{} (computed)", computed)),
        (None, None) => field("Category", "-"),
    }
    field("Active", if eq.ativo { "yes" } else { "no" });
    rule();

    opt_field("Manufacturer", eq.fabricante.as_deref());
    opt_field("Serial number", eq.numero_serie.as_deref());
    opt_field("Year", eq.ano_fabricacao);
    opt_field("Location", eq.localizacao.as_deref());
    opt_field("Design pressure (MPa)", eq.pressao_projeto);
    opt_field("Working pressure (MPa)", eq.pressao_trabalho);
    opt_field("PMTA (MPa)", eq.pmta);
    opt_field("Volume (m³)", eq.volume);
    if let Some(fluid) = &eq.fluido {
        field("Fluid", format!("{} (class {})", fluid, or_dash(eq.classe_fluido)));
    } else {
        opt_field("Fluid class", eq.classe_fluido);
    }
    field("Record book", if eq.possui_prontuario { "on file" } else { "missing" });

    section("Maintenance");
    println!(
        "  Every {} day(s), last {}",
        or_dash(eq.frequencia_manutencao),
        format_date(eq.data_ultima_manutencao)
    );
    println!(
        "  Next due {} ({}) {}",
        format_date(info.next_due),
        describe_days(info.days_remaining),
        info.status.styled()
    );
    if let Some(category) = eq.effective_category() {
        println!(
            "  NR-13 maximum intervals: external {} year(s), internal {} year(s)",
            category.external_interval_years(),
            category.internal_interval_years()
        );
    }

    if !inspections.is_empty() {
        section(&format!("Inspections ({})", inspections.len()));
        for detail in inspections.iter().take(10) {
            let i = &detail.inspection;
            println!(
                "  #{:<5} {}  {:<20} {:<12} {}",
                i.id,
                i.data_inspecao,
                i.tipo_inspecao.to_string(),
                i.status.to_string(),
                or_dash(i.resultado)
            );
        }
        if inspections.len() > 10 {
            println!("  ... {} more", inspections.len() - 10);
        }
    }
    Ok(())
}

fn run_edit(ctx: &Context, me: &User, args: EditArgs) -> Result<()> {
    me.require(Action::ManageEquipment)?;

    let patch = EquipmentPatch {
        tag: args.tag,
        tipo: args.tipo,
        categoria: args.category,
        empresa_id: args.company,
        fabricante: args.manufacturer,
        numero_serie: args.serial,
        ano_fabricacao: args.year,
        pressao_projeto: args.design_pressure,
        pressao_trabalho: args.working_pressure,
        pmta: args.pmta,
        volume: args.volume,
        fluido: args.fluid,
        classe_fluido: args.fluid_class,
        localizacao: args.location,
        possui_prontuario: args.prontuario,
        frequencia_manutencao: args.frequency,
        data_ultima_manutencao: args.last_maintenance,
    };

    let equipment = ctx.db.update_equipment(args.id, &patch)?;
    success(format!("Updated equipment {}", style(&equipment.tag).yellow()));
    Ok(())
}

fn run_set_active(ctx: &Context, me: &User, id: i64, active: bool) -> Result<()> {
    me.require(Action::ManageEquipment)?;
    let equipment = ctx.db.set_equipment_active(id, active)?;
    success(format!(
        "{} equipment {}",
        if active { "Activated" } else { "Deactivated" },
        style(&equipment.tag).yellow()
    ));
    Ok(())
}

fn run_delete(ctx: &Context, me: &User, args: DeleteArgs) -> Result<()> {
    me.require(Action::ManageEquipment)?;
    let equipment = ctx.db.get_equipment(args.id)?;

    if !confirm_action(args.yes, &format!("Delete equipment {}?", equipment.tag))? {
        println!("Cancelled.");
        return Ok(());
    }

    ctx.db.delete_equipment(args.id)?;
    success(format!("Deleted equipment {}", style(&equipment.tag).yellow()));
    Ok(())
}

fn run_due(ctx: &Context, me: &User, args: DueArgs, global: &GlobalOpts) -> Result<()> {
    let window = args.days.unwrap_or_else(|| ctx.config.due_soon_days());
    let due = ctx
        .db
        .due_equipment(today(), window, company_filter(me, args.company)?)?;

    if due.is_empty() && !global.format.is_structured() {
        println!(
            "{} No equipment overdue or due within {} day(s)",
            style("✓").green(),
            window
        );
        return Ok(());
    }

    let columns = ["id", "tag", "company", "last", "next", "days", "maintenance"];
    print_equipment_list(&due, &columns, global.format.for_list())
}

fn run_import(ctx: &mut Context, me: &User, args: ImportArgs) -> Result<()> {
    me.require(Action::ManageEquipment)?;

    let stats = ctx.db.import_equipment_csv(&args.file)?;
    success(format!(
        "Imported {} equipment record(s) from {}",
        style(stats.created.len()).cyan(),
        args.file.display()
    ));
    Ok(())
}

fn run_category(args: CategoryArgs, global: &GlobalOpts) -> Result<()> {
    if !(args.pressure > 0.0 && args.pressure.is_finite()) || !(args.volume > 0.0 && args.volume.is_finite()) {
        return Err(StoreError::validation("pressure and volume must be positive numbers").into());
    }

    let group = PotentialGroup::from_pressure_volume(args.pressure, args.volume);
    let category = Category::from_class_and_group(args.class, group);

    if global.format.is_structured() {
        let value = serde_json::json!({
            "class": args.class.to_string(),
            "pressure_mpa": args.pressure,
            "volume_m3": args.volume,
            "pv": args.pressure * args.volume,
            "potential_group": group.value(),
            "category": category.to_string(),
            "external_interval_years": category.external_interval_years(),
            "internal_interval_years": category.internal_interval_years(),
        });
        print_structured(&value, global.format)?;
        return Ok(());
    }

    println!(
        "P·V = {:.3} MPa·m³ → potential group {}",
        args.pressure * args.volume,
        group
    );
    println!(
        "Fluid class {} → NR-13 category {}",
        args.class,
        style(category).bold().cyan()
    );
    println!(
        "Maximum inspection intervals: external {} year(s), internal {} year(s)",
        category.external_interval_years(),
        category.internal_interval_years()
    );
    Ok(())
}
