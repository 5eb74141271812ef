//! `nr13 status` command - Inspection tracker dashboard

use console::style;
use miette::Result;
use std::collections::BTreeMap;

use crate::cli::commands::utils::{today, Context};
use crate::cli::output::print_structured;
use crate::cli::GlobalOpts;
use crate::core::MaintenanceStatus;
use crate::entities::{EquipmentFilter, InspectionStatus, User};

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Due-soon window in days (default: due_soon_days from config)
    #[arg(long, short = 'd')]
    pub days: Option<i64>,
}

#[derive(serde::Serialize, Default)]
struct UserMetrics {
    total: usize,
    by_role: BTreeMap<String, usize>,
}

#[derive(serde::Serialize, Default)]
struct EquipmentMetrics {
    active: usize,
    overdue: usize,
    due_soon: usize,
    ok: usize,
    unscheduled: usize,
    without_category: usize,
}

#[derive(serde::Serialize, Default)]
struct InspectionMetrics {
    total: usize,
    by_status: BTreeMap<String, usize>,
    overdue: usize,
    due_in_window: usize,
    reports: usize,
}

#[derive(serde::Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Health {
    Healthy,
    Warning,
    Critical,
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Health::Healthy => write!(f, "Healthy"),
            Health::Warning => write!(f, "Warning"),
            Health::Critical => write!(f, "Critical"),
        }
    }
}

pub fn run(args: StatusArgs, global: &GlobalOpts) -> Result<()> {
    let (ctx, me) = Context::login_required(global)?;
    let window = args.days.unwrap_or_else(|| ctx.config.due_soon_days());
    let scope = me.company_scope();

    let users = collect_user_metrics(&ctx, &me)?;
    let equipment = collect_equipment_metrics(&ctx, scope, window)?;
    let inspections = collect_inspection_metrics(&ctx, scope, window)?;
    let health = calculate_health(&equipment, &inspections);

    if global.format.is_structured() {
        let status = serde_json::json!({
            "window_days": window,
            "users": users,
            "equipment": equipment,
            "inspections": inspections,
            "health": health,
        });
        print_structured(&status, global.format)?;
        return Ok(());
    }

    let width = 68;
    let title = match &me.empresa {
        Some(company) if scope.is_some() => format!("NR-13 Status - {}", company),
        _ => "NR-13 Status".to_string(),
    };
    println!("{}", style(title).bold().underlined());
    println!("{}", "═".repeat(width));
    println!();

    print_two_columns(
        "EQUIPMENT",
        &format_equipment_metrics(&equipment),
        "INSPECTIONS",
        &format_inspection_metrics(&inspections, window),
    );

    if scope.is_none() {
        println!();
        print_section("USERS", &format_user_metrics(&users));
    }

    println!();
    println!("{}", "═".repeat(width));

    let health_style = match health {
        Health::Healthy => style(health.to_string()).green().bold(),
        Health::Warning => style(health.to_string()).yellow().bold(),
        Health::Critical => style(health.to_string()).red().bold(),
    };
    println!("Health: {}", health_style);
    Ok(())
}

fn collect_user_metrics(ctx: &Context, me: &User) -> Result<UserMetrics> {
    let mut metrics = UserMetrics::default();
    if me.company_scope().is_some() {
        return Ok(metrics);
    }
    for (role, count) in ctx.db.count_users_by_role()? {
        metrics.total += count;
        metrics.by_role.insert(role.to_string(), count);
    }
    Ok(metrics)
}

fn collect_equipment_metrics(
    ctx: &Context,
    scope: Option<i64>,
    window: i64,
) -> Result<EquipmentMetrics> {
    let today = today();
    let mut metrics = EquipmentMetrics::default();

    let equipment = ctx.db.get_all_equipment(&EquipmentFilter {
        empresa_id: scope,
        ..Default::default()
    })?;
    for summary in &equipment {
        let eq = &summary.equipment;
        metrics.active += 1;
        if eq.effective_category().is_none() {
            metrics.without_category += 1;
        }
        match eq.maintenance(today, window).status {
            MaintenanceStatus::Overdue => metrics.overdue += 1,
            MaintenanceStatus::DueSoon => metrics.due_soon += 1,
            MaintenanceStatus::Ok => metrics.ok += 1,
            MaintenanceStatus::Unscheduled => metrics.unscheduled += 1,
        }
    }
    Ok(metrics)
}

fn collect_inspection_metrics(
    ctx: &Context,
    scope: Option<i64>,
    window: i64,
) -> Result<InspectionMetrics> {
    let today = today();
    let mut metrics = InspectionMetrics::default();

    for (status, count) in ctx.db.count_inspections_by_status(scope)? {
        metrics.total += count;
        metrics.by_status.insert(status.to_string(), count);
    }
    for upcoming in ctx.db.upcoming_inspections(today, window, scope)? {
        if upcoming.due < today {
            metrics.overdue += 1;
        } else {
            metrics.due_in_window += 1;
        }
    }
    metrics.reports = ctx.db.count_reports(scope)?;
    Ok(metrics)
}

fn format_equipment_metrics(m: &EquipmentMetrics) -> Vec<String> {
    let mut lines = vec![format!("Active:      {}", m.active)];
    if m.overdue > 0 {
        lines.push(format!("Overdue:     {} {}", m.overdue, style("⚠").red()));
    } else {
        lines.push(format!("Overdue:     {}", m.overdue));
    }
    lines.push(format!("Due soon:    {}", m.due_soon));
    lines.push(format!("Up to date:  {}", m.ok));
    lines.push(format!("No schedule: {}", m.unscheduled));
    if m.without_category > 0 {
        lines.push(format!("No category: {}", m.without_category));
    }
    lines
}

fn format_inspection_metrics(m: &InspectionMetrics, window: i64) -> Vec<String> {
    let count = |status: InspectionStatus| *m.by_status.get(&status.to_string()).unwrap_or(&0);
    let mut lines = vec![
        format!("Total:       {}", m.total),
        format!("Scheduled:   {}", count(InspectionStatus::Agendada)),
        format!("In progress: {}", count(InspectionStatus::EmAndamento)),
        format!("Concluded:   {}", count(InspectionStatus::Concluida)),
    ];
    if m.overdue > 0 {
        lines.push(format!("Overdue:     {} {}", m.overdue, style("⚠").red()));
    }
    lines.push(format!("Next {}d:    {}", window, m.due_in_window));
    lines.push(format!("Reports:     {}", m.reports));
    lines
}

fn format_user_metrics(m: &UserMetrics) -> Vec<String> {
    let mut lines = vec![format!("Active users: {}", m.total)];
    for (role, count) in &m.by_role {
        lines.push(format!("{:<13} {}", format!("{}:", role), count));
    }
    lines
}

fn print_two_columns(title1: &str, lines1: &[String], title2: &str, lines2: &[String]) {
    let col_width = 32;

    println!("{:<col_width$} {}", style(title1).bold(), style(title2).bold());
    println!("{:-<col_width$} {:-<col_width$}", "", "");

    let max_lines = lines1.len().max(lines2.len());
    for i in 0..max_lines {
        let l1 = lines1.get(i).map(|s| s.as_str()).unwrap_or("");
        let l2 = lines2.get(i).map(|s| s.as_str()).unwrap_or("");
        println!("  {:<30} {}", l1, l2);
    }
}

fn print_section(title: &str, lines: &[String]) {
    println!("{}", style(title).bold());
    println!("{:-<64}", "");
    for line in lines {
        println!("  {}", line);
    }
}

fn calculate_health(equipment: &EquipmentMetrics, inspections: &InspectionMetrics) -> Health {
    if equipment.overdue > 0 || inspections.overdue > 0 {
        Health::Critical
    } else if equipment.due_soon > 0 || inspections.due_in_window > 0 {
        Health::Warning
    } else {
        Health::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_levels() {
        let mut equipment = EquipmentMetrics {
            active: 3,
            ok: 3,
            ..Default::default()
        };
        let mut inspections = InspectionMetrics::default();
        assert_eq!(calculate_health(&equipment, &inspections), Health::Healthy);

        inspections.due_in_window = 1;
        assert_eq!(calculate_health(&equipment, &inspections), Health::Warning);

        equipment.overdue = 1;
        assert_eq!(calculate_health(&equipment, &inspections), Health::Critical);

        equipment.overdue = 0;
        inspections.due_in_window = 0;
        inspections.overdue = 2;
        assert_eq!(calculate_health(&equipment, &inspections), Health::Critical);
    }

    #[test]
    fn test_inspection_lines_show_status_counts() {
        let mut m = InspectionMetrics {
            total: 3,
            ..Default::default()
        };
        m.by_status
            .insert(InspectionStatus::Concluida.to_string(), 2);
        m.by_status
            .insert(InspectionStatus::Agendada.to_string(), 1);
        let lines = format_inspection_metrics(&m, 30);
        assert!(lines.iter().any(|l| l.starts_with("Concluded:") && l.ends_with('2')));
        assert!(lines.iter().any(|l| l.starts_with("Scheduled:") && l.ends_with('1')));
        assert!(lines.iter().any(|l| l.starts_with("Next 30d:")));
    }
}
