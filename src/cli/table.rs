//! Table formatting utilities for CLI list commands
//!
//! Every list command builds `TableRow`s of typed `CellValue`s and hands them
//! to a `TableFormatter`, which renders them as an aligned colored table
//! (TSV), CSV, a Markdown table or bare ids.

use chrono::{DateTime, Local, NaiveDate, Utc};
use console::style;
use std::io;

use crate::cli::helpers::truncate_str;
use crate::cli::OutputFormat;
use crate::core::maintenance::MaintenanceStatus;
use crate::core::nr13::Category;
use crate::entities::{InspectionResult, InspectionStatus, Role};

/// A typed cell value with semantic meaning for formatting
#[derive(Debug, Clone)]
pub enum CellValue {
    /// Numeric record id (cyan)
    Id(i64),
    /// Plain text, truncated to the column width
    Text(String),
    /// Access level with color coding
    Role(Role),
    /// Active flag (inactive is dimmed)
    Active(bool),
    /// Maintenance status with the red/yellow/green/grey code
    Maintenance(MaintenanceStatus),
    /// Inspection status with color coding
    InspStatus(InspectionStatus),
    /// Inspection result (aprovado=green, restricoes=yellow, reprovado=red)
    Verdict(Option<InspectionResult>),
    /// NR-13 category
    Category(Option<Category>),
    /// Calendar date
    Date(Option<NaiveDate>),
    /// Timestamp displayed with time in local zone
    DateTime(DateTime<Utc>),
    /// Integer count
    Number(i64),
    /// Float value with precision
    Float(Option<f64>, usize),
    /// Days until a due date; negative values are overdue
    Days(Option<i64>),
    /// Empty/placeholder
    Empty,
}

impl CellValue {
    /// Format for TSV output (with colors if terminal)
    pub fn format_tsv(&self, width: usize) -> String {
        match self {
            CellValue::Id(id) => format!("{:<width$}", style(id).cyan(), width = width),
            CellValue::Text(s) => {
                let truncated = truncate_str(s, width.saturating_sub(2).max(4));
                format!("{:<width$}", truncated, width = width)
            }
            CellValue::Role(role) => {
                let s = role.to_string();
                let styled = match role {
                    Role::Admin => style(s).magenta().bold(),
                    Role::Engenheiro => style(s).cyan(),
                    Role::Cliente => style(s).white(),
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Active(active) => {
                let styled = if *active {
                    style("active").green()
                } else {
                    style("inactive").dim()
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Maintenance(status) => {
                format!("{:<width$}", status.styled(), width = width)
            }
            CellValue::InspStatus(status) => {
                let s = status.to_string();
                let styled = match status {
                    InspectionStatus::Agendada => style(s).cyan(),
                    InspectionStatus::EmAndamento => style(s).yellow(),
                    InspectionStatus::Concluida => style(s).green(),
                    InspectionStatus::Cancelada => style(s).dim(),
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Verdict(result) => {
                let styled = match result {
                    Some(InspectionResult::Aprovado) => style("aprovado".to_string()).green(),
                    Some(InspectionResult::AprovadoComRestricoes) => {
                        style("com_restricoes".to_string()).yellow()
                    }
                    Some(InspectionResult::Reprovado) => style("reprovado".to_string()).red().bold(),
                    None => style("-".to_string()).dim(),
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Days(days) => {
                let styled = match days {
                    Some(d) if *d < 0 => style(d.to_string()).red().bold(),
                    Some(d) => style(d.to_string()),
                    None => style("-".to_string()).dim(),
                };
                format!("{:>width$}", styled, width = width)
            }
            CellValue::Number(n) => format!("{:>width$}", n, width = width),
            CellValue::Float(Some(f), precision) => {
                format!("{:>width$.prec$}", f, width = width, prec = precision)
            }
            other => format!("{:<width$}", other.raw_or_dash(), width = width),
        }
    }

    /// Format for CSV output (no colors, empty for missing values)
    pub fn format_csv(&self) -> String {
        self.raw()
    }

    /// Format for Markdown output (no colors, escaped pipes)
    pub fn format_md(&self) -> String {
        let raw = match self {
            CellValue::Verdict(Some(InspectionResult::Reprovado)) => "**reprovado**".to_string(),
            CellValue::Maintenance(MaintenanceStatus::Overdue) => "**overdue**".to_string(),
            other => other.raw_or_dash(),
        };
        raw.replace('|', "\\|")
    }

    fn raw_or_dash(&self) -> String {
        let raw = self.raw();
        if raw.is_empty() {
            "-".to_string()
        } else {
            raw
        }
    }

    /// Get raw string value (no formatting)
    pub fn raw(&self) -> String {
        match self {
            CellValue::Id(id) => id.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Role(role) => role.to_string(),
            CellValue::Active(active) => if *active { "active" } else { "inactive" }.to_string(),
            CellValue::Maintenance(status) => status.to_string(),
            CellValue::InspStatus(status) => status.to_string(),
            CellValue::Verdict(result) => result.map(|r| r.to_string()).unwrap_or_default(),
            CellValue::Category(cat) => cat.map(|c| c.to_string()).unwrap_or_default(),
            CellValue::Date(date) => date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            CellValue::DateTime(dt) => {
                let local: DateTime<Local> = dt.with_timezone(&Local);
                local.format("%Y-%m-%d %H:%M").to_string()
            }
            CellValue::Number(n) => n.to_string(),
            CellValue::Float(f, precision) => f
                .map(|f| format!("{:.prec$}", f, prec = precision))
                .unwrap_or_default(),
            CellValue::Days(days) => days.map(|d| d.to_string()).unwrap_or_default(),
            CellValue::Empty => String::new(),
        }
    }

    /// Display width of this cell's content (for dynamic column sizing)
    pub fn display_width(&self) -> usize {
        match self {
            CellValue::Verdict(Some(InspectionResult::AprovadoComRestricoes)) => 14,
            CellValue::Date(_) => 10,
            CellValue::DateTime(_) => 16,
            other => other.raw_or_dash().chars().count(),
        }
    }
}

/// Column definition with header label and maximum width
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub key: &'static str,
    pub header: &'static str,
    pub width: usize,
}

impl ColumnDef {
    pub const fn new(key: &'static str, header: &'static str, width: usize) -> Self {
        Self { key, header, width }
    }
}

/// A row of cell values for table output
pub struct TableRow {
    pub id: i64,
    pub cells: Vec<(&'static str, CellValue)>,
}

impl TableRow {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            cells: Vec::new(),
        }
    }

    pub fn cell(mut self, key: &'static str, value: CellValue) -> Self {
        self.cells.push((key, value));
        self
    }

    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.cells.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

/// Table formatter that outputs rows in various formats
pub struct TableFormatter<'a> {
    columns: &'a [ColumnDef],
    entity_name: &'static str,
    show_summary: bool,
}

impl<'a> TableFormatter<'a> {
    pub fn new(columns: &'a [ColumnDef], entity_name: &'static str) -> Self {
        Self {
            columns,
            entity_name,
            show_summary: true,
        }
    }

    /// Drop the "N item(s) found" line
    pub fn without_summary(mut self) -> Self {
        self.show_summary = false;
        self
    }

    /// Output rows in the specified format
    pub fn output<I>(&self, rows: I, format: OutputFormat, visible_columns: &[&str])
    where
        I: IntoIterator<Item = TableRow>,
    {
        let rows: Vec<TableRow> = rows.into_iter().collect();
        let visible: Vec<&ColumnDef> = self
            .columns
            .iter()
            .filter(|c| visible_columns.contains(&c.key))
            .collect();

        match format {
            OutputFormat::Csv => self.output_csv(&rows, &visible),
            OutputFormat::Md => self.output_md(&rows, &visible),
            OutputFormat::Id => {
                for row in &rows {
                    println!("{}", row.id);
                }
            }
            _ => self.output_tsv(&rows, &visible),
        }
    }

    /// Dynamic column widths: content plus padding, capped at the column maximum
    fn calculate_widths(&self, rows: &[TableRow], visible: &[&ColumnDef]) -> Vec<usize> {
        visible
            .iter()
            .map(|col| {
                let max_content = rows
                    .iter()
                    .filter_map(|r| r.get(col.key))
                    .map(|v| v.display_width())
                    .max()
                    .unwrap_or(0);
                col.header
                    .len()
                    .max(max_content.saturating_add(2))
                    .min(col.width.max(col.header.len()))
            })
            .collect()
    }

    fn output_tsv(&self, rows: &[TableRow], visible: &[&ColumnDef]) {
        let widths = self.calculate_widths(rows, visible);

        let header: Vec<String> = visible
            .iter()
            .zip(&widths)
            .map(|(col, w)| format!("{:<width$}", style(col.header).bold(), width = *w))
            .collect();
        println!("{}", header.join(" "));

        let total_width: usize = widths.iter().sum::<usize>() + widths.len().saturating_sub(1);
        println!("{}", "-".repeat(total_width));

        for row in rows {
            let parts: Vec<String> = visible
                .iter()
                .zip(&widths)
                .map(|(col, w)| match row.get(col.key) {
                    Some(value) => value.format_tsv(*w),
                    None => format!("{:<width$}", "-", width = *w),
                })
                .collect();
            println!("{}", parts.join(" "));
        }

        if self.show_summary {
            println!();
            println!("{} {}(s) found.", style(rows.len()).cyan(), self.entity_name);
        }
    }

    fn output_csv(&self, rows: &[TableRow], visible: &[&ColumnDef]) {
        let mut writer = csv::Writer::from_writer(io::stdout());
        let header: Vec<&str> = visible.iter().map(|c| c.key).collect();
        let mut result = writer.write_record(&header);

        for row in rows {
            if result.is_err() {
                break;
            }
            let record: Vec<String> = visible
                .iter()
                .map(|col| row.get(col.key).map(|v| v.format_csv()).unwrap_or_default())
                .collect();
            result = writer.write_record(&record);
        }
        if result.is_ok() {
            let _ = writer.flush();
        }
    }

    fn output_md(&self, rows: &[TableRow], visible: &[&ColumnDef]) {
        let headers: Vec<&str> = visible.iter().map(|c| c.header).collect();
        println!("| {} |", headers.join(" | "));
        let separators: Vec<&str> = headers.iter().map(|_| "---").collect();
        println!("|{}|", separators.join("|"));

        for row in rows {
            let values: Vec<String> = visible
                .iter()
                .map(|col| {
                    row.get(col.key)
                        .map(|v| v.format_md())
                        .unwrap_or_else(|| "-".to_string())
                })
                .collect();
            println!("| {} |", values.join(" | "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: &[ColumnDef] = &[
        ColumnDef::new("id", "ID", 6),
        ColumnDef::new("tag", "TAG", 12),
        ColumnDef::new("next", "NEXT DUE", 12),
    ];

    fn row() -> TableRow {
        TableRow::new(7)
            .cell("id", CellValue::Id(7))
            .cell("tag", CellValue::Text("VP-001 | reserva".into()))
            .cell("next", CellValue::Date(None))
    }

    #[test]
    fn test_widths_respect_header_and_cap() {
        let formatter = TableFormatter::new(COLUMNS, "equipment");
        let rows = vec![row()];
        let visible: Vec<&ColumnDef> = COLUMNS.iter().collect();
        let widths = formatter.calculate_widths(&rows, &visible);
        assert_eq!(widths, vec![3, 12, 12]);
    }

    #[test]
    fn test_markdown_escapes_pipes_and_dashes_missing() {
        let r = row();
        assert_eq!(r.get("tag").unwrap().format_md(), "VP-001 \\| reserva");
        assert_eq!(r.get("next").unwrap().format_md(), "-");
        assert_eq!(r.get("next").unwrap().format_csv(), "");
    }

    #[test]
    fn test_raw_values() {
        assert_eq!(CellValue::Days(Some(-4)).raw(), "-4");
        assert_eq!(CellValue::Float(Some(1.26), 1).raw(), "1.3");
        assert_eq!(CellValue::Category(Some(Category::III)).raw(), "III");
        assert_eq!(
            CellValue::Verdict(Some(InspectionResult::AprovadoComRestricoes)).raw(),
            "aprovado_com_restricoes"
        );
    }
}
