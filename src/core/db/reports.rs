//! Issued report rows

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::info;

use super::{clean, Database};
use crate::core::error::{StoreError, StoreResult};
use crate::entities::report::{Report, ReportFilter};

fn report_from_row(row: &Row) -> rusqlite::Result<Report> {
    Ok(Report {
        id: row.get(0)?,
        inspecao_id: row.get(1)?,
        data_emissao: row.get(2)?,
        link_arquivo: PathBuf::from(row.get::<_, String>(3)?),
        observacoes: row.get(4)?,
    })
}

impl Database {
    /// Record a generated report file
    pub fn insert_report(
        &self,
        inspecao_id: i64,
        data_emissao: NaiveDate,
        link_arquivo: &Path,
        observacoes: &Option<String>,
    ) -> StoreResult<Report> {
        self.conn.execute(
            "INSERT INTO relatorios (inspecao_id, data_emissao, link_arquivo, observacoes)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                inspecao_id,
                data_emissao,
                link_arquivo.to_string_lossy(),
                clean(observacoes),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(report_id = id, inspection_id = inspecao_id, "report recorded");
        self.get_report(id)
    }

    pub fn get_report(&self, id: i64) -> StoreResult<Report> {
        self.conn
            .query_row(
                "SELECT id, inspecao_id, data_emissao, link_arquivo, observacoes
                 FROM relatorios WHERE id = ?1",
                params![id],
                report_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("report", id))
    }

    /// List reports, most recently issued first
    pub fn list_reports(&self, filter: &ReportFilter) -> StoreResult<Vec<Report>> {
        let mut sql = String::from(
            "SELECT r.id, r.inspecao_id, r.data_emissao, r.link_arquivo, r.observacoes
             FROM relatorios r
             JOIN inspecoes i ON i.id = r.inspecao_id
             JOIN equipamentos e ON e.id = i.equipamento_id
             WHERE 1=1",
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![];

        if let Some(inspecao_id) = filter.inspecao_id {
            sql.push_str(" AND r.inspecao_id = ?");
            params_vec.push(Box::new(inspecao_id));
        }

        if let Some(empresa_id) = filter.empresa_id {
            sql.push_str(" AND e.empresa_id = ?");
            params_vec.push(Box::new(empresa_id));
        }

        if let Some(engenheiro_id) = filter.engenheiro_id {
            sql.push_str(" AND i.engenheiro_id = ?");
            params_vec.push(Box::new(engenheiro_id));
        }

        sql.push_str(" ORDER BY r.data_emissao DESC, r.id DESC");

        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_refs.as_slice(), report_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Bump the emission date after the file was rewritten
    pub fn touch_report(&self, id: i64, data_emissao: NaiveDate) -> StoreResult<Report> {
        let changed = self.conn.execute(
            "UPDATE relatorios SET data_emissao = ?1 WHERE id = ?2",
            params![data_emissao, id],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("report", id));
        }
        info!(report_id = id, "report reissued");
        self.get_report(id)
    }

    /// Remove the report row; the file is left to the caller
    pub fn delete_report_row(&self, id: i64) -> StoreResult<Report> {
        let report = self.get_report(id)?;
        self.conn
            .execute("DELETE FROM relatorios WHERE id = ?1", params![id])?;
        info!(report_id = id, "report deleted");
        Ok(report)
    }

    pub fn count_reports(&self, empresa_id: Option<i64>) -> StoreResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM relatorios r
             JOIN inspecoes i ON i.id = r.inspecao_id
             JOIN equipamentos e ON e.id = i.equipamento_id
             WHERE ?1 IS NULL OR e.empresa_id = ?1",
            params![empresa_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
