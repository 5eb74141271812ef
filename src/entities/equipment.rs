//! Equipment entity - pressure vessels, boilers, piping and tanks under NR-13

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::maintenance::{MaintenanceInfo, MaintenanceStatus};
use crate::core::nr13::{Category, FluidClass};

/// Kind of equipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentType {
    VasoPressao,
    Caldeira,
    Tubulacao,
    Tanque,
}

impl Default for EquipmentType {
    fn default() -> Self {
        EquipmentType::VasoPressao
    }
}

impl std::fmt::Display for EquipmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EquipmentType::VasoPressao => write!(f, "vaso_pressao"),
            EquipmentType::Caldeira => write!(f, "caldeira"),
            EquipmentType::Tubulacao => write!(f, "tubulacao"),
            EquipmentType::Tanque => write!(f, "tanque"),
        }
    }
}

impl std::str::FromStr for EquipmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "vaso_pressao" | "vaso" | "vessel" => Ok(EquipmentType::VasoPressao),
            "caldeira" | "boiler" => Ok(EquipmentType::Caldeira),
            "tubulacao" | "piping" => Ok(EquipmentType::Tubulacao),
            "tanque" | "tank" => Ok(EquipmentType::Tanque),
            _ => Err(format!(
                "Invalid equipment type: {}. Use vaso_pressao, caldeira, tubulacao, or tanque",
                s
            )),
        }
    }
}

/// A row of `equipamentos`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equipment {
    pub id: i64,
    pub tag: String,
    pub tipo: EquipmentType,
    pub categoria: Option<Category>,
    pub empresa_id: i64,
    pub fabricante: Option<String>,
    pub numero_serie: Option<String>,
    pub ano_fabricacao: Option<i32>,
    /// Design pressure (MPa)
    pub pressao_projeto: Option<f64>,
    /// Operating pressure (MPa)
    pub pressao_trabalho: Option<f64>,
    /// Maximum allowable working pressure (MPa)
    pub pmta: Option<f64>,
    /// Internal volume (m³)
    pub volume: Option<f64>,
    pub fluido: Option<String>,
    pub classe_fluido: Option<FluidClass>,
    pub localizacao: Option<String>,
    pub possui_prontuario: bool,
    /// Days between maintenance interventions
    pub frequencia_manutencao: Option<i64>,
    pub data_ultima_manutencao: Option<NaiveDate>,
    pub ativo: bool,
    pub criado_em: DateTime<Utc>,
}

impl Equipment {
    /// Maintenance due date and status relative to `today`
    pub fn maintenance(&self, today: NaiveDate, due_soon_days: i64) -> MaintenanceInfo {
        MaintenanceInfo::compute(
            self.data_ultima_manutencao,
            self.frequencia_manutencao,
            today,
            due_soon_days,
        )
    }

    /// Category as registered, or computed from fluid class, PMTA (or design
    /// pressure) and volume when not registered
    pub fn effective_category(&self) -> Option<Category> {
        self.categoria.or_else(|| {
            let class = self.classe_fluido?;
            let pressure = self.pmta.or(self.pressao_projeto)?;
            let volume = self.volume?;
            Some(Category::classify(class, pressure, volume))
        })
    }
}

/// Input for creating equipment
#[derive(Debug, Clone, Default)]
pub struct NewEquipment {
    pub tag: String,
    pub tipo: EquipmentType,
    pub categoria: Option<Category>,
    pub empresa_id: i64,
    pub fabricante: Option<String>,
    pub numero_serie: Option<String>,
    pub ano_fabricacao: Option<i32>,
    pub pressao_projeto: Option<f64>,
    pub pressao_trabalho: Option<f64>,
    pub pmta: Option<f64>,
    pub volume: Option<f64>,
    pub fluido: Option<String>,
    pub classe_fluido: Option<FluidClass>,
    pub localizacao: Option<String>,
    pub possui_prontuario: bool,
    pub frequencia_manutencao: Option<i64>,
    pub data_ultima_manutencao: Option<NaiveDate>,
}

/// Partial update of equipment; `None` leaves the column unchanged
#[derive(Debug, Clone, Default)]
pub struct EquipmentPatch {
    pub tag: Option<String>,
    pub tipo: Option<EquipmentType>,
    pub categoria: Option<Category>,
    pub empresa_id: Option<i64>,
    pub fabricante: Option<String>,
    pub numero_serie: Option<String>,
    pub ano_fabricacao: Option<i32>,
    pub pressao_projeto: Option<f64>,
    pub pressao_trabalho: Option<f64>,
    pub pmta: Option<f64>,
    pub volume: Option<f64>,
    pub fluido: Option<String>,
    pub classe_fluido: Option<FluidClass>,
    pub localizacao: Option<String>,
    pub possui_prontuario: Option<bool>,
    pub frequencia_manutencao: Option<i64>,
    pub data_ultima_manutencao: Option<NaiveDate>,
}

impl EquipmentPatch {
    /// Apply the patch on top of an existing record, producing the values to validate
    pub fn apply_to(&self, current: &Equipment) -> NewEquipment {
        NewEquipment {
            tag: self.tag.clone().unwrap_or_else(|| current.tag.clone()),
            tipo: self.tipo.unwrap_or(current.tipo),
            categoria: self.categoria.or(current.categoria),
            empresa_id: self.empresa_id.unwrap_or(current.empresa_id),
            fabricante: self.fabricante.clone().or_else(|| current.fabricante.clone()),
            numero_serie: self
                .numero_serie
                .clone()
                .or_else(|| current.numero_serie.clone()),
            ano_fabricacao: self.ano_fabricacao.or(current.ano_fabricacao),
            pressao_projeto: self.pressao_projeto.or(current.pressao_projeto),
            pressao_trabalho: self.pressao_trabalho.or(current.pressao_trabalho),
            pmta: self.pmta.or(current.pmta),
            volume: self.volume.or(current.volume),
            fluido: self.fluido.clone().or_else(|| current.fluido.clone()),
            classe_fluido: self.classe_fluido.or(current.classe_fluido),
            localizacao: self
                .localizacao
                .clone()
                .or_else(|| current.localizacao.clone()),
            possui_prontuario: self.possui_prontuario.unwrap_or(current.possui_prontuario),
            frequencia_manutencao: self.frequencia_manutencao.or(current.frequencia_manutencao),
            data_ultima_manutencao: self
                .data_ultima_manutencao
                .or(current.data_ultima_manutencao),
        }
    }
}

/// Filter for listing equipment
#[derive(Debug, Clone, Default)]
pub struct EquipmentFilter {
    pub empresa_id: Option<i64>,
    pub categoria: Option<Category>,
    pub tipo: Option<EquipmentType>,
    pub include_inactive: bool,
    pub search: Option<String>,
    /// Applied after loading, since it depends on today's date
    pub maintenance: Option<MaintenanceQuery>,
    pub limit: Option<usize>,
}

/// Keep only equipment in a given maintenance state as of `today`
#[derive(Debug, Clone, Copy)]
pub struct MaintenanceQuery {
    pub status: MaintenanceStatus,
    pub today: NaiveDate,
    pub due_soon_days: i64,
}

/// Equipment row together with the owning company's display name
#[derive(Debug, Clone, Serialize)]
pub struct EquipmentSummary {
    #[serde(flatten)]
    pub equipment: Equipment,
    pub empresa: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Equipment {
        Equipment {
            id: 1,
            tag: "VP-001".into(),
            tipo: EquipmentType::VasoPressao,
            categoria: None,
            empresa_id: 2,
            fabricante: None,
            numero_serie: None,
            ano_fabricacao: None,
            pressao_projeto: Some(1.2),
            pressao_trabalho: Some(0.8),
            pmta: Some(1.0),
            volume: Some(2.0),
            fluido: Some("ar comprimido".into()),
            classe_fluido: Some(FluidClass::C),
            localizacao: None,
            possui_prontuario: true,
            frequencia_manutencao: Some(180),
            data_ultima_manutencao: NaiveDate::from_ymd_opt(2024, 1, 1),
            ativo: true,
            criado_em: Utc::now(),
        }
    }

    #[test]
    fn test_effective_category_prefers_registered_value() {
        let mut eq = sample();
        // PMTA 1.0 x 2.0 = 2.0 -> group 4 -> class C gives IV
        assert_eq!(eq.effective_category(), Some(Category::IV));
        eq.categoria = Some(Category::II);
        assert_eq!(eq.effective_category(), Some(Category::II));
    }

    #[test]
    fn test_patch_keeps_unset_fields() {
        let eq = sample();
        let patch = EquipmentPatch {
            tag: Some("VP-002".into()),
            ..Default::default()
        };
        let merged = patch.apply_to(&eq);
        assert_eq!(merged.tag, "VP-002");
        assert_eq!(merged.pmta, Some(1.0));
        assert_eq!(merged.frequencia_manutencao, Some(180));
    }

    #[test]
    fn test_type_parse_aliases() {
        assert_eq!("boiler".parse::<EquipmentType>().unwrap(), EquipmentType::Caldeira);
        assert_eq!(
            "vaso-pressao".parse::<EquipmentType>().unwrap(),
            EquipmentType::VasoPressao
        );
    }
}
