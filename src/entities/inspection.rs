//! Inspection entity - NR-13 examinations performed by an engineer

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Kind of examination (`tipo_inspecao`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionKind {
    /// First inspection before entering service
    Inicial,
    /// Periodic external examination
    PeriodicaExterna,
    /// Periodic internal examination
    PeriodicaInterna,
    /// Extraordinary inspection (after damage, repair, long shutdown)
    Extraordinaria,
    /// Hydrostatic pressure test
    TesteHidrostatico,
}

impl Default for InspectionKind {
    fn default() -> Self {
        InspectionKind::PeriodicaExterna
    }
}

impl std::fmt::Display for InspectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InspectionKind::Inicial => write!(f, "inicial"),
            InspectionKind::PeriodicaExterna => write!(f, "periodica_externa"),
            InspectionKind::PeriodicaInterna => write!(f, "periodica_interna"),
            InspectionKind::Extraordinaria => write!(f, "extraordinaria"),
            InspectionKind::TesteHidrostatico => write!(f, "teste_hidrostatico"),
        }
    }
}

impl std::str::FromStr for InspectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "inicial" | "initial" => Ok(InspectionKind::Inicial),
            "periodica_externa" | "externa" | "external" => Ok(InspectionKind::PeriodicaExterna),
            "periodica_interna" | "interna" | "internal" => Ok(InspectionKind::PeriodicaInterna),
            "extraordinaria" | "extraordinary" => Ok(InspectionKind::Extraordinaria),
            "teste_hidrostatico" | "hidrostatico" | "hydrostatic" => {
                Ok(InspectionKind::TesteHidrostatico)
            }
            _ => Err(format!(
                "Invalid inspection type: {}. Use inicial, periodica_externa, periodica_interna, extraordinaria, or teste_hidrostatico",
                s
            )),
        }
    }
}

/// Outcome of a completed inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionResult {
    Aprovado,
    AprovadoComRestricoes,
    Reprovado,
}

impl std::fmt::Display for InspectionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InspectionResult::Aprovado => write!(f, "aprovado"),
            InspectionResult::AprovadoComRestricoes => write!(f, "aprovado_com_restricoes"),
            InspectionResult::Reprovado => write!(f, "reprovado"),
        }
    }
}

impl std::str::FromStr for InspectionResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "aprovado" | "approved" | "pass" => Ok(InspectionResult::Aprovado),
            "aprovado_com_restricoes" | "restricoes" | "conditional" => {
                Ok(InspectionResult::AprovadoComRestricoes)
            }
            "reprovado" | "rejected" | "fail" => Ok(InspectionResult::Reprovado),
            _ => Err(format!(
                "Invalid inspection result: {}. Use aprovado, aprovado_com_restricoes, or reprovado",
                s
            )),
        }
    }
}

/// Workflow status of an inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionStatus {
    Agendada,
    EmAndamento,
    Concluida,
    Cancelada,
}

impl Default for InspectionStatus {
    fn default() -> Self {
        InspectionStatus::Agendada
    }
}

impl InspectionStatus {
    /// Concluded and cancelled inspections can no longer change
    pub fn is_final(&self) -> bool {
        matches!(self, InspectionStatus::Concluida | InspectionStatus::Cancelada)
    }
}

impl std::fmt::Display for InspectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InspectionStatus::Agendada => write!(f, "agendada"),
            InspectionStatus::EmAndamento => write!(f, "em_andamento"),
            InspectionStatus::Concluida => write!(f, "concluida"),
            InspectionStatus::Cancelada => write!(f, "cancelada"),
        }
    }
}

impl std::str::FromStr for InspectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "agendada" | "scheduled" => Ok(InspectionStatus::Agendada),
            "em_andamento" | "in_progress" => Ok(InspectionStatus::EmAndamento),
            "concluida" | "done" | "completed" => Ok(InspectionStatus::Concluida),
            "cancelada" | "cancelled" | "canceled" => Ok(InspectionStatus::Cancelada),
            _ => Err(format!(
                "Invalid inspection status: {}. Use agendada, em_andamento, concluida, or cancelada",
                s
            )),
        }
    }
}

/// A row of `inspecoes`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inspection {
    pub id: i64,
    pub equipamento_id: i64,
    pub engenheiro_id: i64,
    pub data_inspecao: NaiveDate,
    pub tipo_inspecao: InspectionKind,
    pub resultado: Option<InspectionResult>,
    pub recomendacoes: Option<String>,
    pub proxima_inspecao: Option<NaiveDate>,
    pub status: InspectionStatus,
    pub criado_em: DateTime<Utc>,
}

/// Input for scheduling or registering an inspection
#[derive(Debug, Clone)]
pub struct NewInspection {
    pub equipamento_id: i64,
    pub engenheiro_id: i64,
    pub data_inspecao: NaiveDate,
    pub tipo_inspecao: InspectionKind,
    pub recomendacoes: Option<String>,
    pub proxima_inspecao: Option<NaiveDate>,
    pub status: InspectionStatus,
}

/// Partial update of an inspection; `None` leaves the column unchanged
#[derive(Debug, Clone, Default)]
pub struct InspectionPatch {
    pub engenheiro_id: Option<i64>,
    pub data_inspecao: Option<NaiveDate>,
    pub tipo_inspecao: Option<InspectionKind>,
    pub recomendacoes: Option<String>,
    pub proxima_inspecao: Option<NaiveDate>,
    pub status: Option<InspectionStatus>,
}

/// Filter for listing inspections
#[derive(Debug, Clone, Default)]
pub struct InspectionFilter {
    pub equipamento_id: Option<i64>,
    pub engenheiro_id: Option<i64>,
    pub empresa_id: Option<i64>,
    pub status: Option<InspectionStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<usize>,
}

/// Inspection joined with equipment, engineer and company data
#[derive(Debug, Clone, Serialize)]
pub struct InspectionDetail {
    #[serde(flatten)]
    pub inspection: Inspection,
    pub equipamento_tag: String,
    pub empresa_id: i64,
    pub empresa: String,
    pub engenheiro: String,
    pub engenheiro_crea: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            InspectionKind::Inicial,
            InspectionKind::PeriodicaExterna,
            InspectionKind::PeriodicaInterna,
            InspectionKind::Extraordinaria,
            InspectionKind::TesteHidrostatico,
        ] {
            assert_eq!(kind.to_string().parse::<InspectionKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_status_is_final() {
        assert!(InspectionStatus::Concluida.is_final());
        assert!(InspectionStatus::Cancelada.is_final());
        assert!(!InspectionStatus::Agendada.is_final());
        assert!(!InspectionStatus::EmAndamento.is_final());
    }

    #[test]
    fn test_result_aliases() {
        assert_eq!(
            "conditional".parse::<InspectionResult>().unwrap(),
            InspectionResult::AprovadoComRestricoes
        );
        assert!("maybe".parse::<InspectionResult>().is_err());
    }
}
