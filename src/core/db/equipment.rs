//! Equipment records

use chrono::{Datelike, Local, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use super::{clean, Database};
use crate::core::error::{StoreError, StoreResult};
use crate::core::maintenance::{MaintenanceInfo, MAX_DAYS};
use crate::entities::equipment::{
    Equipment, EquipmentFilter, EquipmentPatch, EquipmentSummary, NewEquipment,
};
use crate::entities::user::Role;

const EQUIPMENT_COLUMNS: &str = "e.id, e.tag, e.tipo, e.categoria, e.empresa_id, e.fabricante, \
     e.numero_serie, e.ano_fabricacao, e.pressao_projeto, e.pressao_trabalho, e.pmta, e.volume, \
     e.fluido, e.classe_fluido, e.localizacao, e.possui_prontuario, e.frequencia_manutencao, \
     e.data_ultima_manutencao, e.ativo, e.criado_em, COALESCE(u.empresa, u.nome)";

const EQUIPMENT_FROM: &str = "FROM equipamentos e JOIN usuarios u ON u.id = e.empresa_id";

fn summary_from_row(row: &Row) -> rusqlite::Result<EquipmentSummary> {
    Ok(EquipmentSummary {
        equipment: Equipment {
            id: row.get(0)?,
            tag: row.get(1)?,
            tipo: row.get(2)?,
            categoria: row.get(3)?,
            empresa_id: row.get(4)?,
            fabricante: row.get(5)?,
            numero_serie: row.get(6)?,
            ano_fabricacao: row.get(7)?,
            pressao_projeto: row.get(8)?,
            pressao_trabalho: row.get(9)?,
            pmta: row.get(10)?,
            volume: row.get(11)?,
            fluido: row.get(12)?,
            classe_fluido: row.get(13)?,
            localizacao: row.get(14)?,
            possui_prontuario: row.get(15)?,
            frequencia_manutencao: row.get(16)?,
            data_ultima_manutencao: row.get(17)?,
            ativo: row.get(18)?,
            criado_em: row.get(19)?,
        },
        empresa: row.get(20)?,
    })
}

/// Outcome of a CSV import
#[derive(Debug, Clone, Default, Serialize)]
pub struct CsvImportStats {
    pub rows_read: usize,
    pub created: Vec<i64>,
}

/// Check field ranges and cross-field rules
pub(crate) fn validate_equipment(new: &NewEquipment, today: NaiveDate) -> StoreResult<()> {
    if new.tag.trim().is_empty() {
        return Err(StoreError::validation("tag must not be empty"));
    }

    if let Some(year) = new.ano_fabricacao {
        if year < 1800 || year > today.year() {
            return Err(StoreError::validation(format!(
                "manufacturing year {} is out of range (1800..={})",
                year,
                today.year()
            )));
        }
    }

    for (name, value) in [
        ("design pressure", new.pressao_projeto),
        ("operating pressure", new.pressao_trabalho),
        ("PMTA", new.pmta),
        ("volume", new.volume),
    ] {
        if let Some(v) = value {
            if !v.is_finite() || v <= 0.0 {
                return Err(StoreError::validation(format!("{} must be positive", name)));
            }
        }
    }

    if let (Some(work), Some(pmta)) = (new.pressao_trabalho, new.pmta) {
        if work > pmta {
            return Err(StoreError::validation(format!(
                "operating pressure {} MPa exceeds PMTA {} MPa",
                work, pmta
            )));
        }
    }

    if let Some(freq) = new.frequencia_manutencao {
        if freq <= 0 {
            return Err(StoreError::validation(
                "maintenance frequency must be a positive number of days",
            ));
        }
        if freq > MAX_DAYS {
            return Err(StoreError::validation(format!(
                "maintenance frequency {} exceeds the maximum of {} days",
                freq, MAX_DAYS
            )));
        }
    }

    if let Some(last) = new.data_ultima_manutencao {
        if last > today {
            return Err(StoreError::validation(format!(
                "last maintenance date {} is in the future",
                last
            )));
        }
    }

    Ok(())
}

/// The owner must be an active client account
fn check_company(conn: &Connection, empresa_id: i64) -> StoreResult<()> {
    let owner: Option<(Role, bool)> = conn
        .query_row(
            "SELECT tipo_acesso, ativo FROM usuarios WHERE id = ?1",
            params![empresa_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match owner {
        None => Err(StoreError::not_found("company", empresa_id)),
        Some((Role::Cliente, true)) => Ok(()),
        Some((Role::Cliente, false)) => Err(StoreError::validation(format!(
            "company #{} is inactive",
            empresa_id
        ))),
        Some((role, _)) => Err(StoreError::validation(format!(
            "user #{} is a {} account, not a client company",
            empresa_id, role
        ))),
    }
}

fn check_tag_unique(
    conn: &Connection,
    empresa_id: i64,
    tag: &str,
    exclude_id: Option<i64>,
) -> StoreResult<()> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM equipamentos WHERE empresa_id = ?1 AND tag = ?2 COLLATE NOCASE",
            params![empresa_id, tag],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        Some(id) if Some(id) != exclude_id => Err(StoreError::conflict(format!(
            "tag {} is already used by equipment #{} of this company",
            tag, id
        ))),
        _ => Ok(()),
    }
}

/// Fill in the NR-13 category from fluid class, pressure and volume when missing
/// Category from fluid class, PMTA (or design pressure) and volume, when all are known
fn computed_category(new: &NewEquipment) -> Option<crate::core::nr13::Category> {
    match (new.classe_fluido, new.pmta.or(new.pressao_projeto), new.volume) {
        (Some(class), Some(pressure), Some(volume)) => {
            Some(crate::core::nr13::Category::classify(class, pressure, volume))
        }
        _ => None,
    }
}

fn with_computed_category(new: &NewEquipment) -> NewEquipment {
    let mut new = new.clone();
    new.tag = new.tag.trim().to_string();
    if new.categoria.is_none() {
        new.categoria = computed_category(&new);
    }
    new
}

fn insert_equipment(conn: &Connection, new: &NewEquipment) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO equipamentos (tag, tipo, categoria, empresa_id, fabricante, numero_serie,
             ano_fabricacao, pressao_projeto, pressao_trabalho, pmta, volume, fluido, classe_fluido,
             localizacao, possui_prontuario, frequencia_manutencao, data_ultima_manutencao, ativo, criado_em)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, 1, ?18)",
        params![
            new.tag,
            new.tipo,
            new.categoria,
            new.empresa_id,
            clean(&new.fabricante),
            clean(&new.numero_serie),
            new.ano_fabricacao,
            new.pressao_projeto,
            new.pressao_trabalho,
            new.pmta,
            new.volume,
            clean(&new.fluido),
            new.classe_fluido,
            clean(&new.localizacao),
            new.possui_prontuario,
            new.frequencia_manutencao,
            new.data_ultima_manutencao,
            Utc::now(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    /// Register a new piece of equipment
    pub fn create_equipment(&self, new: &NewEquipment) -> StoreResult<Equipment> {
        let new = with_computed_category(new);
        validate_equipment(&new, Local::now().date_naive())?;
        check_company(&self.conn, new.empresa_id)?;
        check_tag_unique(&self.conn, new.empresa_id, &new.tag, None)?;

        let id = insert_equipment(&self.conn, &new)?;
        info!(equipment_id = id, tag = %new.tag, "equipment created");
        self.get_equipment(id)
    }

    pub fn get_equipment(&self, id: i64) -> StoreResult<Equipment> {
        self.get_equipment_summary(id).map(|s| s.equipment)
    }

    /// Equipment with its company name
    pub fn get_equipment_summary(&self, id: i64) -> StoreResult<EquipmentSummary> {
        self.conn
            .query_row(
                &format!("SELECT {} {} WHERE e.id = ?1", EQUIPMENT_COLUMNS, EQUIPMENT_FROM),
                params![id],
                summary_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("equipment", id))
    }

    /// List equipment ordered by tag
    pub fn get_all_equipment(&self, filter: &EquipmentFilter) -> StoreResult<Vec<EquipmentSummary>> {
        let mut sql = format!("SELECT {} {} WHERE 1=1", EQUIPMENT_COLUMNS, EQUIPMENT_FROM);
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![];

        if let Some(empresa_id) = filter.empresa_id {
            sql.push_str(" AND e.empresa_id = ?");
            params_vec.push(Box::new(empresa_id));
        }

        if let Some(categoria) = filter.categoria {
            sql.push_str(" AND e.categoria = ?");
            params_vec.push(Box::new(categoria));
        }

        if let Some(tipo) = filter.tipo {
            sql.push_str(" AND e.tipo = ?");
            params_vec.push(Box::new(tipo));
        }

        if !filter.include_inactive {
            sql.push_str(" AND e.ativo = 1");
        }

        if let Some(ref search) = filter.search {
            sql.push_str(
                " AND (e.tag LIKE ? OR e.fabricante LIKE ? OR e.numero_serie LIKE ? OR e.localizacao LIKE ?)",
            );
            let pattern = format!("%{}%", search);
            for _ in 0..4 {
                params_vec.push(Box::new(pattern.clone()));
            }
        }

        sql.push_str(" ORDER BY e.tag COLLATE NOCASE ASC, e.id ASC");

        // The maintenance filter runs in Rust, so LIMIT must come after it
        if filter.maintenance.is_none() {
            if let Some(limit) = filter.limit {
                sql.push_str(&format!(" LIMIT {}", limit));
            }
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_refs.as_slice(), summary_from_row)?;
        let mut equipment = rows.collect::<Result<Vec<_>, _>>()?;

        if let Some(query) = filter.maintenance {
            equipment.retain(|s| {
                s.equipment.maintenance(query.today, query.due_soon_days).status == query.status
            });
            if let Some(limit) = filter.limit {
                equipment.truncate(limit);
            }
        }

        Ok(equipment)
    }

    /// Update an equipment record
    pub fn update_equipment(&self, id: i64, patch: &EquipmentPatch) -> StoreResult<Equipment> {
        let current = self.get_equipment(id)?;
        let mut merged = patch.apply_to(&current);
        // Recompute when the inputs changed and no explicit category was given;
        // a stored category survives when the inputs are incomplete
        let inputs_changed = patch.classe_fluido.is_some()
            || patch.pmta.is_some()
            || patch.pressao_projeto.is_some()
            || patch.volume.is_some();
        if patch.categoria.is_none() && inputs_changed {
            if let Some(computed) = computed_category(&merged) {
                merged.categoria = Some(computed);
            }
        }
        let merged = with_computed_category(&merged);
        validate_equipment(&merged, Local::now().date_naive())?;

        if merged.empresa_id != current.empresa_id {
            check_company(&self.conn, merged.empresa_id)?;
        }
        check_tag_unique(&self.conn, merged.empresa_id, &merged.tag, Some(id))?;

        self.conn.execute(
            "UPDATE equipamentos SET tag = ?1, tipo = ?2, categoria = ?3, empresa_id = ?4,
                 fabricante = ?5, numero_serie = ?6, ano_fabricacao = ?7, pressao_projeto = ?8,
                 pressao_trabalho = ?9, pmta = ?10, volume = ?11, fluido = ?12, classe_fluido = ?13,
                 localizacao = ?14, possui_prontuario = ?15, frequencia_manutencao = ?16,
                 data_ultima_manutencao = ?17
             WHERE id = ?18",
            params![
                merged.tag,
                merged.tipo,
                merged.categoria,
                merged.empresa_id,
                clean(&merged.fabricante),
                clean(&merged.numero_serie),
                merged.ano_fabricacao,
                merged.pressao_projeto,
                merged.pressao_trabalho,
                merged.pmta,
                merged.volume,
                clean(&merged.fluido),
                merged.classe_fluido,
                clean(&merged.localizacao),
                merged.possui_prontuario,
                merged.frequencia_manutencao,
                merged.data_ultima_manutencao,
                id,
            ],
        )?;
        info!(equipment_id = id, "equipment updated");
        self.get_equipment(id)
    }

    pub fn set_equipment_active(&self, id: i64, active: bool) -> StoreResult<Equipment> {
        let changed = self.conn.execute(
            "UPDATE equipamentos SET ativo = ?1 WHERE id = ?2",
            params![active, id],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("equipment", id));
        }
        info!(equipment_id = id, active, "equipment activation changed");
        self.get_equipment(id)
    }

    /// Delete equipment that has no inspections
    pub fn delete_equipment(&self, id: i64) -> StoreResult<()> {
        self.get_equipment(id)?;

        let inspections: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM inspecoes WHERE equipamento_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if inspections > 0 {
            warn!(equipment_id = id, inspections, "refused to delete equipment with inspections");
            return Err(StoreError::conflict(format!(
                "equipment #{} has {} inspection(s) and cannot be deleted; deactivate it instead",
                id, inspections
            )));
        }

        self.conn
            .execute("DELETE FROM equipamentos WHERE id = ?1", params![id])?;
        info!(equipment_id = id, "equipment deleted");
        Ok(())
    }

    /// Active equipment whose maintenance is overdue or due within `window_days`
    pub fn due_equipment(
        &self,
        today: NaiveDate,
        window_days: i64,
        empresa_id: Option<i64>,
    ) -> StoreResult<Vec<(EquipmentSummary, MaintenanceInfo)>> {
        let filter = EquipmentFilter {
            empresa_id,
            ..Default::default()
        };
        let mut due: Vec<_> = self
            .get_all_equipment(&filter)?
            .into_iter()
            .map(|s| {
                let info = s.equipment.maintenance(today, window_days);
                (s, info)
            })
            .filter(|(_, info)| info.status.needs_attention())
            .collect();
        due.sort_by_key(|(_, info)| info.next_due);
        Ok(due)
    }

    /// Create equipment from a CSV file with a header row
    ///
    /// All rows are inserted in a single transaction; the first invalid row
    /// aborts the import and nothing is written.
    pub fn import_equipment_csv(&mut self, path: &Path) -> StoreResult<CsvImportStats> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;

        let today = Local::now().date_naive();
        let tx = self.conn.transaction()?;
        let mut stats = CsvImportStats::default();

        for (index, record) in reader.deserialize::<CsvEquipmentRow>().enumerate() {
            // header is line 1
            let line = index + 2;
            let row = record?;
            stats.rows_read += 1;

            let new = with_computed_category(
                &row.into_new_equipment()
                    .map_err(|e| StoreError::validation(format!("line {}: {}", line, e)))?,
            );
            let annotate = |e: StoreError| match e {
                StoreError::Validation(msg) => StoreError::validation(format!("line {}: {}", line, msg)),
                StoreError::Conflict(msg) => StoreError::conflict(format!("line {}: {}", line, msg)),
                other => other,
            };
            validate_equipment(&new, today).map_err(annotate)?;
            check_company(&tx, new.empresa_id).map_err(annotate)?;
            check_tag_unique(&tx, new.empresa_id, &new.tag, None).map_err(annotate)?;

            stats.created.push(insert_equipment(&tx, &new)?);
        }

        tx.commit()?;
        info!(rows = stats.rows_read, "equipment imported from CSV");
        Ok(stats)
    }
}

/// One CSV line; every column is optional text so errors can name the line
#[derive(Debug, Deserialize)]
struct CsvEquipmentRow {
    tag: Option<String>,
    tipo: Option<String>,
    categoria: Option<String>,
    empresa_id: Option<String>,
    fabricante: Option<String>,
    numero_serie: Option<String>,
    ano_fabricacao: Option<String>,
    pressao_projeto: Option<String>,
    pressao_trabalho: Option<String>,
    pmta: Option<String>,
    volume: Option<String>,
    fluido: Option<String>,
    classe_fluido: Option<String>,
    localizacao: Option<String>,
    possui_prontuario: Option<String>,
    frequencia_manutencao: Option<String>,
    data_ultima_manutencao: Option<String>,
}

fn parse_field<T: FromStr>(name: &str, value: &Option<String>) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    match clean(value) {
        None => Ok(None),
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("invalid {} '{}': {}", name, v, e)),
    }
}

fn parse_flag(value: &Option<String>) -> Result<bool, String> {
    match clean(value).map(|v| v.to_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "sim" | "s" | "yes" | "y" => Ok(true),
            "0" | "false" | "nao" | "não" | "n" | "no" => Ok(false),
            _ => Err(format!("invalid possui_prontuario '{}'", v)),
        },
    }
}

impl CsvEquipmentRow {
    fn into_new_equipment(self) -> Result<NewEquipment, String> {
        Ok(NewEquipment {
            tag: clean(&self.tag).ok_or("missing tag")?,
            tipo: parse_field("tipo", &self.tipo)?.unwrap_or_default(),
            categoria: parse_field("categoria", &self.categoria)?,
            empresa_id: parse_field("empresa_id", &self.empresa_id)?.ok_or("missing empresa_id")?,
            fabricante: clean(&self.fabricante),
            numero_serie: clean(&self.numero_serie),
            ano_fabricacao: parse_field("ano_fabricacao", &self.ano_fabricacao)?,
            pressao_projeto: parse_field("pressao_projeto", &self.pressao_projeto)?,
            pressao_trabalho: parse_field("pressao_trabalho", &self.pressao_trabalho)?,
            pmta: parse_field("pmta", &self.pmta)?,
            volume: parse_field("volume", &self.volume)?,
            fluido: clean(&self.fluido),
            classe_fluido: parse_field("classe_fluido", &self.classe_fluido)?,
            localizacao: clean(&self.localizacao),
            possui_prontuario: parse_flag(&self.possui_prontuario)?,
            frequencia_manutencao: parse_field("frequencia_manutencao", &self.frequencia_manutencao)?,
            data_ultima_manutencao: parse_field(
                "data_ultima_manutencao",
                &self.data_ultima_manutencao,
            )?,
        })
    }
}
