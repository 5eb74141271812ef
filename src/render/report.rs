//! Inspection report generation
//!
//! A report is the `report.txt.tera` template rendered with the inspection,
//! equipment and engineer data, laid out as an A4 PDF under the reports
//! directory, plus a `relatorios` row pointing at the file.

use chrono::{Local, NaiveDate};
use miette::Diagnostic;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::pdf::render_pdf;
use super::template::{TemplateError, TemplateRenderer, REPORT_TEMPLATE};
use crate::core::db::Database;
use crate::core::error::StoreError;
use crate::entities::{EquipmentSummary, InspectionDetail, InspectionStatus, Report};

#[derive(Debug, Error, Diagnostic)]
pub enum ReportError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    #[error("inspection #{id} is {status}; reports are only issued for concluded inspections")]
    #[diagnostic(code(nr13::report::not_concluded), help("Record the result with 'nr13 insp complete' first"))]
    NotConcluded { id: i64, status: InspectionStatus },

    #[error("PDF generation failed: {0}")]
    #[diagnostic(code(nr13::report::pdf))]
    Pdf(String),

    #[error("IO error on {}: {source}", .path.display())]
    #[diagnostic(code(nr13::report::io))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Serialize)]
struct Field {
    label: &'static str,
    value: String,
}

fn field(label: &'static str, value: impl Into<String>) -> Field {
    Field {
        label,
        value: value.into(),
    }
}

fn or_blank<T: ToString>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "n/d".to_string())
}

fn br_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn with_unit(value: Option<f64>, unit: &str) -> String {
    value
        .map(|v| format!("{} {}", v, unit))
        .unwrap_or_else(|| "n/d".to_string())
}

/// Values handed to the report template
#[derive(Debug, Serialize)]
struct ReportContext {
    inspecao_id: i64,
    emissao: String,
    empresa: String,
    equipamento: Vec<Field>,
    inspecao: Vec<Field>,
    recomendacoes: String,
    engenheiro: String,
    crea: String,
    observacoes: Option<String>,
}

impl ReportContext {
    fn build(
        detail: &InspectionDetail,
        equipment: &EquipmentSummary,
        emissao: NaiveDate,
        observacoes: &Option<String>,
    ) -> Self {
        let eq = &equipment.equipment;
        let insp = &detail.inspection;

        let categoria = match (eq.categoria, eq.effective_category()) {
            (Some(c), _) => c.to_string(),
            (None, Some(c)) => format!("{} (calculada)", c),
            (None, None) => "nao classificado".to_string(),
        };
        let fluido = match (&eq.fluido, eq.classe_fluido) {
            (Some(f), Some(c)) => format!("{} (classe {})", f, c),
            (Some(f), None) => f.clone(),
            (None, Some(c)) => format!("classe {}", c),
            (None, None) => "n/d".to_string(),
        };

        let equipamento = vec![
            field("TAG", eq.tag.clone()),
            field("Tipo", eq.tipo.to_string()),
            field("Categoria NR-13", categoria),
            field("Fabricante", or_blank(&eq.fabricante)),
            field("Numero de serie", or_blank(&eq.numero_serie)),
            field("Ano de fabricacao", or_blank(&eq.ano_fabricacao)),
            field("Pressao de projeto", with_unit(eq.pressao_projeto, "MPa")),
            field("Pressao de trabalho", with_unit(eq.pressao_trabalho, "MPa")),
            field("PMTA", with_unit(eq.pmta, "MPa")),
            field("Volume", with_unit(eq.volume, "m3")),
            field("Fluido", fluido),
            field("Localizacao", or_blank(&eq.localizacao)),
            field("Prontuario", if eq.possui_prontuario { "sim" } else { "nao" }),
        ];

        let inspecao = vec![
            field("Data", br_date(insp.data_inspecao)),
            field("Tipo", insp.tipo_inspecao.to_string()),
            field("Status", insp.status.to_string()),
            field("Resultado", or_blank(&insp.resultado)),
            field(
                "Proxima inspecao",
                insp.proxima_inspecao
                    .map(br_date)
                    .unwrap_or_else(|| "n/d".to_string()),
            ),
        ];

        Self {
            inspecao_id: insp.id,
            emissao: br_date(emissao),
            empresa: detail.empresa.clone(),
            equipamento,
            inspecao,
            recomendacoes: insp
                .recomendacoes
                .clone()
                .unwrap_or_else(|| "Nenhuma recomendacao registrada.".to_string()),
            engenheiro: detail.engenheiro.clone(),
            crea: or_blank(&detail.engenheiro_crea),
            observacoes: crate::core::db::clean(observacoes),
        }
    }
}

/// Writes report PDFs for a workspace
pub struct ReportGenerator {
    renderer: TemplateRenderer,
    /// Workspace root; stored paths are relative to it when possible
    root: PathBuf,
    output_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(root: &Path, output_dir: &Path) -> Result<Self, ReportError> {
        Ok(Self {
            renderer: TemplateRenderer::new()?,
            root: root.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// Absolute location of a stored report path
    pub fn resolve(&self, link: &Path) -> PathBuf {
        if link.is_absolute() {
            link.to_path_buf()
        } else {
            self.root.join(link)
        }
    }

    fn stored_path(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    /// Render the report text for an inspection
    pub fn render_text(
        &self,
        db: &Database,
        inspecao_id: i64,
        emissao: NaiveDate,
        observacoes: &Option<String>,
    ) -> Result<String, ReportError> {
        let detail = db.get_inspection_detail(inspecao_id)?;
        if detail.inspection.status != InspectionStatus::Concluida {
            return Err(ReportError::NotConcluded {
                id: inspecao_id,
                status: detail.inspection.status,
            });
        }
        let equipment = db.get_equipment_summary(detail.inspection.equipamento_id)?;
        let context = ReportContext::build(&detail, &equipment, emissao, observacoes);
        Ok(self.renderer.render(REPORT_TEMPLATE, &context)?)
    }

    fn pdf_bytes(&self, inspecao_id: i64, text: &str) -> Result<Vec<u8>, ReportError> {
        let title = format!("Relatorio de inspecao NR-13 no {}", inspecao_id);
        render_pdf(&title, text).map_err(|e| ReportError::Pdf(e.to_string()))
    }

    fn ensure_parent(path: &Path) -> Result<(), ReportError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ReportError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    fn write_pdf(&self, path: &Path, inspecao_id: i64, text: &str) -> Result<(), ReportError> {
        let bytes = self.pdf_bytes(inspecao_id, text)?;
        Self::ensure_parent(path)?;
        std::fs::write(path, bytes).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write a PDF to a file that did not exist before, suffixing `_2`, `_3`...
    /// to the stem until a free name is found
    fn write_new_pdf(&self, stem: &str, inspecao_id: i64, text: &str) -> Result<PathBuf, ReportError> {
        let bytes = self.pdf_bytes(inspecao_id, text)?;
        Self::ensure_parent(&self.output_dir.join(stem))?;

        let mut attempt = 1u32;
        loop {
            let name = if attempt == 1 {
                format!("{}.pdf", stem)
            } else {
                format!("{}_{}.pdf", stem, attempt)
            };
            let path = self.output_dir.join(name);
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut file) => {
                    if let Err(source) = file.write_all(&bytes) {
                        let _ = std::fs::remove_file(&path);
                        return Err(ReportError::Io { path, source });
                    }
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(source) => return Err(ReportError::Io { path, source }),
            }
        }
    }

    /// Issue a new report for a concluded inspection
    pub fn generate(
        &self,
        db: &Database,
        inspecao_id: i64,
        observacoes: Option<String>,
    ) -> Result<Report, ReportError> {
        let now = Local::now();
        let emissao = now.date_naive();
        let text = self.render_text(db, inspecao_id, emissao, &observacoes)?;

        let stem = format!("relatorio_{}_{}", inspecao_id, now.format("%Y%m%d%H%M%S"));
        let path = self.write_new_pdf(&stem, inspecao_id, &text)?;

        match db.insert_report(inspecao_id, emissao, &self.stored_path(&path), &observacoes) {
            Ok(report) => {
                info!(report_id = report.id, path = %path.display(), "report generated");
                Ok(report)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "removing report file after failed insert");
                let _ = std::fs::remove_file(&path);
                Err(e.into())
            }
        }
    }

    /// Rewrite the PDF of an existing report from current data
    pub fn regenerate(&self, db: &Database, report_id: i64) -> Result<Report, ReportError> {
        let report = db.get_report(report_id)?;
        let emissao = Local::now().date_naive();
        let text = self.render_text(db, report.inspecao_id, emissao, &report.observacoes)?;
        self.write_pdf(&self.resolve(&report.link_arquivo), report.inspecao_id, &text)?;
        Ok(db.touch_report(report_id, emissao)?)
    }

    /// Delete a report row and, unless `keep_file`, its PDF
    pub fn delete(&self, db: &Database, report_id: i64, keep_file: bool) -> Result<Report, ReportError> {
        let report = db.delete_report_row(report_id)?;
        if !keep_file {
            let path = self.resolve(&report.link_arquivo);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(path = %path.display(), "report file was already missing");
                }
                Err(source) => return Err(ReportError::Io { path, source }),
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::*;
    use tempfile::TempDir;

    fn seeded() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let client = db
            .create_user(&NewUser {
                nome: "Acme".into(),
                email: "acme@example.com".into(),
                password: "segredo123".into(),
                tipo_acesso: Role::Cliente,
                empresa: Some("Acme Industria".into()),
                crea: None,
            })
            .unwrap();
        let engineer = db
            .create_user(&NewUser {
                nome: "Carla Souza".into(),
                email: "carla@example.com".into(),
                password: "segredo123".into(),
                tipo_acesso: Role::Engenheiro,
                empresa: None,
                crea: Some("RJ-998877".into()),
            })
            .unwrap();
        let eq = db
            .create_equipment(&NewEquipment {
                tag: "CA-01".into(),
                tipo: EquipmentType::Caldeira,
                empresa_id: client.id,
                fabricante: Some("Aalborg".into()),
                frequencia_manutencao: Some(365),
                ..Default::default()
            })
            .unwrap();
        let insp = db
            .create_inspection(&NewInspection {
                equipamento_id: eq.id,
                engenheiro_id: engineer.id,
                data_inspecao: NaiveDate::from_ymd_opt(2025, 2, 10).unwrap(),
                tipo_inspecao: InspectionKind::PeriodicaInterna,
                recomendacoes: None,
                proxima_inspecao: None,
                status: InspectionStatus::Agendada,
            })
            .unwrap();
        (db, insp.id)
    }

    #[test]
    fn test_report_requires_concluded_inspection() {
        let (db, insp) = seeded();
        let tmp = TempDir::new().unwrap();
        let generator = ReportGenerator::new(tmp.path(), &tmp.path().join("reports")).unwrap();

        let err = generator.generate(&db, insp, None).unwrap_err();
        assert!(matches!(err, ReportError::NotConcluded { .. }));
        assert!(db.list_reports(&ReportFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_generate_writes_pdf_and_row() {
        let (mut db, insp) = seeded();
        db.complete_inspection(
            insp,
            InspectionResult::AprovadoComRestricoes,
            Some("Substituir valvula de seguranca".into()),
            None,
        )
        .unwrap();

        let tmp = TempDir::new().unwrap();
        let generator = ReportGenerator::new(tmp.path(), &tmp.path().join("reports")).unwrap();

        let text = generator
            .render_text(&db, insp, NaiveDate::from_ymd_opt(2025, 2, 11).unwrap(), &None)
            .unwrap();
        assert!(text.contains("CA-01"));
        assert!(text.contains("RJ-998877"));
        assert!(text.contains("Substituir valvula"));
        assert!(text.contains("11/02/2025"));

        let report = generator
            .generate(&db, insp, Some("Emitido para auditoria".into()))
            .unwrap();
        let name = report.link_arquivo.to_string_lossy().to_string();
        assert!(name.starts_with("reports/relatorio_"));
        assert!(name.ends_with(".pdf"));

        let path = generator.resolve(&report.link_arquivo);
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        generator.regenerate(&db, report.id).unwrap();
        assert!(path.exists());

        generator.delete(&db, report.id, false).unwrap();
        assert!(!path.exists());
        assert!(db.get_report(report.id).is_err());
    }

    #[test]
    fn test_reports_issued_back_to_back_get_distinct_files() {
        let (mut db, insp) = seeded();
        db.complete_inspection(insp, InspectionResult::Aprovado, None, None)
            .unwrap();

        let tmp = TempDir::new().unwrap();
        let generator = ReportGenerator::new(tmp.path(), &tmp.path().join("reports")).unwrap();

        let first = generator.generate(&db, insp, None).unwrap();
        let second = generator.generate(&db, insp, None).unwrap();
        assert_ne!(first.link_arquivo, second.link_arquivo);

        let second_path = generator.resolve(&second.link_arquivo);
        generator.delete(&db, first.id, false).unwrap();
        assert!(!generator.resolve(&first.link_arquivo).exists());
        assert!(second_path.exists());
        assert!(std::fs::read(&second_path).unwrap().starts_with(b"%PDF"));
    }
}
