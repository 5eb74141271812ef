//! Inspection records

use chrono::{NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashSet;
use tracing::{info, warn};

use super::{clean, Database};
use crate::core::error::{StoreError, StoreResult};
use crate::core::maintenance::{add_days, MAX_DAYS};
use crate::core::nr13::default_next_inspection;
use crate::entities::inspection::{
    Inspection, InspectionDetail, InspectionFilter, InspectionPatch, InspectionResult,
    InspectionStatus, NewInspection,
};
use crate::entities::user::Role;

const DETAIL_COLUMNS: &str = "i.id, i.equipamento_id, i.engenheiro_id, i.data_inspecao, \
     i.tipo_inspecao, i.resultado, i.recomendacoes, i.proxima_inspecao, i.status, i.criado_em, \
     e.tag, e.empresa_id, COALESCE(c.empresa, c.nome), g.nome, g.crea";

const DETAIL_FROM: &str = "FROM inspecoes i \
     JOIN equipamentos e ON e.id = i.equipamento_id \
     JOIN usuarios c ON c.id = e.empresa_id \
     JOIN usuarios g ON g.id = i.engenheiro_id";

fn detail_from_row(row: &Row) -> rusqlite::Result<InspectionDetail> {
    Ok(InspectionDetail {
        inspection: Inspection {
            id: row.get(0)?,
            equipamento_id: row.get(1)?,
            engenheiro_id: row.get(2)?,
            data_inspecao: row.get(3)?,
            tipo_inspecao: row.get(4)?,
            resultado: row.get(5)?,
            recomendacoes: row.get(6)?,
            proxima_inspecao: row.get(7)?,
            status: row.get(8)?,
            criado_em: row.get(9)?,
        },
        equipamento_tag: row.get(10)?,
        empresa_id: row.get(11)?,
        empresa: row.get(12)?,
        engenheiro: row.get(13)?,
        engenheiro_crea: row.get(14)?,
    })
}

fn check_next_date(data: NaiveDate, proxima: Option<NaiveDate>) -> StoreResult<()> {
    match proxima {
        Some(next) if next <= data => Err(StoreError::validation(format!(
            "next inspection {} must be after the inspection date {}",
            next, data
        ))),
        _ => Ok(()),
    }
}

impl Database {
    /// The engineer must be an active `engenheiro` account
    fn check_engineer(&self, id: i64) -> StoreResult<()> {
        let user = self.get_user(id).map_err(|e| match e {
            StoreError::NotFound { id, .. } => StoreError::not_found("engineer", id),
            other => other,
        })?;
        if user.tipo_acesso != Role::Engenheiro {
            return Err(StoreError::validation(format!(
                "user #{} is a {} account, not an engineer",
                id, user.tipo_acesso
            )));
        }
        if !user.ativo {
            return Err(StoreError::validation(format!("engineer #{} is inactive", id)));
        }
        Ok(())
    }

    /// Schedule or register an inspection
    ///
    /// A missing next inspection date is filled in from the NR-13 interval
    /// of the equipment's category, or from its maintenance frequency.
    pub fn create_inspection(&self, new: &NewInspection) -> StoreResult<Inspection> {
        let equipment = self.get_equipment(new.equipamento_id)?;
        if !equipment.ativo {
            return Err(StoreError::validation(format!(
                "equipment #{} ({}) is inactive",
                equipment.id, equipment.tag
            )));
        }
        self.check_engineer(new.engenheiro_id)?;

        if new.status == InspectionStatus::Concluida {
            return Err(StoreError::validation(
                "register the inspection first, then use `complete` to record its result",
            ));
        }

        let proxima = new.proxima_inspecao.or_else(|| {
            default_next_inspection(
                equipment.effective_category(),
                equipment.frequencia_manutencao,
                new.tipo_inspecao,
                new.data_inspecao,
            )
        });
        check_next_date(new.data_inspecao, proxima)?;

        self.conn.execute(
            "INSERT INTO inspecoes (equipamento_id, engenheiro_id, data_inspecao, tipo_inspecao,
                 resultado, recomendacoes, proxima_inspecao, status, criado_em)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?7, ?8)",
            params![
                new.equipamento_id,
                new.engenheiro_id,
                new.data_inspecao,
                new.tipo_inspecao,
                clean(&new.recomendacoes),
                proxima,
                new.status,
                Utc::now(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(inspection_id = id, equipment_id = new.equipamento_id, "inspection created");
        self.get_inspection(id)
    }

    pub fn get_inspection(&self, id: i64) -> StoreResult<Inspection> {
        self.get_inspection_detail(id).map(|d| d.inspection)
    }

    /// Inspection joined with equipment, engineer and company names
    pub fn get_inspection_detail(&self, id: i64) -> StoreResult<InspectionDetail> {
        self.conn
            .query_row(
                &format!("SELECT {} {} WHERE i.id = ?1", DETAIL_COLUMNS, DETAIL_FROM),
                params![id],
                detail_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("inspection", id))
    }

    /// List inspections, newest first
    pub fn list_inspections(&self, filter: &InspectionFilter) -> StoreResult<Vec<InspectionDetail>> {
        let mut sql = format!("SELECT {} {} WHERE 1=1", DETAIL_COLUMNS, DETAIL_FROM);
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![];

        if let Some(equipamento_id) = filter.equipamento_id {
            sql.push_str(" AND i.equipamento_id = ?");
            params_vec.push(Box::new(equipamento_id));
        }

        if let Some(engenheiro_id) = filter.engenheiro_id {
            sql.push_str(" AND i.engenheiro_id = ?");
            params_vec.push(Box::new(engenheiro_id));
        }

        if let Some(empresa_id) = filter.empresa_id {
            sql.push_str(" AND e.empresa_id = ?");
            params_vec.push(Box::new(empresa_id));
        }

        if let Some(status) = filter.status {
            sql.push_str(" AND i.status = ?");
            params_vec.push(Box::new(status));
        }

        if let Some(from) = filter.from {
            sql.push_str(" AND i.data_inspecao >= ?");
            params_vec.push(Box::new(from));
        }

        if let Some(to) = filter.to {
            sql.push_str(" AND i.data_inspecao <= ?");
            params_vec.push(Box::new(to));
        }

        sql.push_str(" ORDER BY i.data_inspecao DESC, i.id DESC");

        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_refs.as_slice(), detail_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Update scheduling fields of an open inspection
    pub fn update_inspection(&self, id: i64, patch: &InspectionPatch) -> StoreResult<Inspection> {
        let current = self.get_inspection(id)?;
        if current.status.is_final() {
            return Err(StoreError::conflict(format!(
                "inspection #{} is {} and can no longer be edited",
                id, current.status
            )));
        }
        if patch.status == Some(InspectionStatus::Concluida) {
            return Err(StoreError::validation(
                "use `complete` to conclude an inspection",
            ));
        }

        if let Some(engenheiro_id) = patch.engenheiro_id {
            if engenheiro_id != current.engenheiro_id {
                self.check_engineer(engenheiro_id)?;
            }
        }

        let data = patch.data_inspecao.unwrap_or(current.data_inspecao);
        let proxima = patch.proxima_inspecao.or(current.proxima_inspecao);
        check_next_date(data, proxima)?;

        let recomendacoes = match patch.recomendacoes {
            Some(_) => clean(&patch.recomendacoes),
            None => current.recomendacoes.clone(),
        };

        self.conn.execute(
            "UPDATE inspecoes SET engenheiro_id = ?1, data_inspecao = ?2, tipo_inspecao = ?3,
                 recomendacoes = ?4, proxima_inspecao = ?5, status = ?6
             WHERE id = ?7",
            params![
                patch.engenheiro_id.unwrap_or(current.engenheiro_id),
                data,
                patch.tipo_inspecao.unwrap_or(current.tipo_inspecao),
                recomendacoes,
                proxima,
                patch.status.unwrap_or(current.status),
                id,
            ],
        )?;
        info!(inspection_id = id, "inspection updated");
        self.get_inspection(id)
    }

    /// Record the result of an inspection
    ///
    /// Sets the result, marks it concluded and moves the equipment's last
    /// maintenance date to the inspection date, all in one transaction.
    pub fn complete_inspection(
        &mut self,
        id: i64,
        resultado: InspectionResult,
        recomendacoes: Option<String>,
        proxima: Option<NaiveDate>,
    ) -> StoreResult<Inspection> {
        let current = self.get_inspection(id)?;
        if current.status.is_final() {
            return Err(StoreError::conflict(format!(
                "inspection #{} is already {}",
                id, current.status
            )));
        }

        let equipment = self.get_equipment(current.equipamento_id)?;
        let proxima = proxima.or(current.proxima_inspecao).or_else(|| {
            default_next_inspection(
                equipment.effective_category(),
                equipment.frequencia_manutencao,
                current.tipo_inspecao,
                current.data_inspecao,
            )
        });
        check_next_date(current.data_inspecao, proxima)?;

        let recomendacoes = clean(&recomendacoes).or(current.recomendacoes.clone());

        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE inspecoes SET resultado = ?1, recomendacoes = ?2, proxima_inspecao = ?3,
                 status = ?4
             WHERE id = ?5",
            params![
                resultado,
                recomendacoes,
                proxima,
                InspectionStatus::Concluida,
                id
            ],
        )?;
        // Never move the last maintenance date backwards
        tx.execute(
            "UPDATE equipamentos SET data_ultima_manutencao = ?1
             WHERE id = ?2 AND (data_ultima_manutencao IS NULL OR data_ultima_manutencao < ?1)",
            params![current.data_inspecao, current.equipamento_id],
        )?;
        tx.commit()?;

        info!(
            inspection_id = id,
            equipment_id = current.equipamento_id,
            result = %resultado,
            "inspection completed"
        );
        self.get_inspection(id)
    }

    pub fn cancel_inspection(&self, id: i64) -> StoreResult<Inspection> {
        let current = self.get_inspection(id)?;
        match current.status {
            InspectionStatus::Concluida => {
                return Err(StoreError::conflict(format!(
                    "inspection #{} is concluded and cannot be cancelled",
                    id
                )))
            }
            InspectionStatus::Cancelada => return Ok(current),
            _ => {}
        }

        self.conn.execute(
            "UPDATE inspecoes SET status = ?1 WHERE id = ?2",
            params![InspectionStatus::Cancelada, id],
        )?;
        info!(inspection_id = id, "inspection cancelled");
        self.get_inspection(id)
    }

    /// Delete an inspection that has no reports
    pub fn delete_inspection(&self, id: i64) -> StoreResult<()> {
        self.get_inspection(id)?;

        let reports: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM relatorios WHERE inspecao_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if reports > 0 {
            warn!(inspection_id = id, reports, "refused to delete inspection with reports");
            return Err(StoreError::conflict(format!(
                "inspection #{} has {} report(s); delete them first",
                id, reports
            )));
        }

        self.conn
            .execute("DELETE FROM inspecoes WHERE id = ?1", params![id])?;
        info!(inspection_id = id, "inspection deleted");
        Ok(())
    }

    /// Inspections falling due between today and `today + window_days`
    ///
    /// Includes scheduled or in-progress inspections dated in the window, and
    /// the `proxima_inspecao` of the most recent concluded inspection of each
    /// equipment. Overdue open inspections (dated before today) are included too.
    pub fn upcoming_inspections(
        &self,
        today: NaiveDate,
        window_days: i64,
        empresa_id: Option<i64>,
    ) -> StoreResult<Vec<UpcomingInspection>> {
        let until = add_days(today, window_days.clamp(0, MAX_DAYS)).unwrap_or(NaiveDate::MAX);
        let mut upcoming = Vec::new();

        let open = self.list_inspections(&InspectionFilter {
            empresa_id,
            to: Some(until),
            ..Default::default()
        })?;
        let mut covered = HashSet::new();
        for detail in open {
            if detail.inspection.status.is_final() {
                continue;
            }
            covered.insert(detail.inspection.equipamento_id);
            upcoming.push(UpcomingInspection {
                due: detail.inspection.data_inspecao,
                scheduled: true,
                detail,
            });
        }

        let concluded = self.list_inspections(&InspectionFilter {
            empresa_id,
            status: Some(InspectionStatus::Concluida),
            ..Default::default()
        })?;
        // newest first, so the first per equipment is the latest
        let mut seen = HashSet::new();
        for detail in concluded {
            if !seen.insert(detail.inspection.equipamento_id) {
                continue;
            }
            if covered.contains(&detail.inspection.equipamento_id) {
                continue;
            }
            if let Some(next) = detail.inspection.proxima_inspecao {
                if next <= until {
                    upcoming.push(UpcomingInspection {
                        due: next,
                        scheduled: false,
                        detail,
                    });
                }
            }
        }

        upcoming.sort_by_key(|u| (u.due, u.detail.inspection.id));
        Ok(upcoming)
    }

    /// Number of inspections per status, optionally for one company
    pub fn count_inspections_by_status(
        &self,
        empresa_id: Option<i64>,
    ) -> StoreResult<Vec<(InspectionStatus, usize)>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.status, COUNT(*) FROM inspecoes i
             JOIN equipamentos e ON e.id = i.equipamento_id
             WHERE ?1 IS NULL OR e.empresa_id = ?1
             GROUP BY i.status ORDER BY i.status",
        )?;
        let rows = stmt.query_map(params![empresa_id], |row| {
            Ok((row.get(0)?, row.get::<_, i64>(1)? as usize))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

/// An inspection that falls due soon
#[derive(Debug, Clone, serde::Serialize)]
pub struct UpcomingInspection {
    pub due: NaiveDate,
    /// `true` for an open inspection, `false` for the next date of a concluded one
    pub scheduled: bool,
    #[serde(flatten)]
    pub detail: InspectionDetail,
}
