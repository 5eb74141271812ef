//! Report entity - PDF inspection reports issued for concluded inspections

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A row of `relatorios`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub inspecao_id: i64,
    pub data_emissao: NaiveDate,
    pub link_arquivo: PathBuf,
    pub observacoes: Option<String>,
}

/// Filter for listing reports
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub inspecao_id: Option<i64>,
    pub empresa_id: Option<i64>,
    pub engenheiro_id: Option<i64>,
    pub limit: Option<usize>,
}
