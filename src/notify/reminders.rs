//! Maintenance and inspection reminders grouped per client company

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use super::mailer::{MailError, Mailer, OutgoingMail};
use crate::core::db::Database;
use crate::core::error::StoreResult;
use crate::core::maintenance::MaintenanceStatus;
use crate::render::template::{TemplateError, TemplateRenderer, REMINDER_TEMPLATE};

/// Equipment whose maintenance is overdue or due soon
#[derive(Debug, Clone, Serialize)]
pub struct DueItem {
    pub equipamento_id: i64,
    pub tag: String,
    pub tipo: String,
    pub status: MaintenanceStatus,
    pub next_due: Option<NaiveDate>,
    pub days_remaining: Option<i64>,
}

/// Inspection falling due in the window
#[derive(Debug, Clone, Serialize)]
pub struct InspectionItem {
    pub inspecao_id: i64,
    pub tag: String,
    pub tipo: String,
    pub due: NaiveDate,
    pub engenheiro: String,
}

/// Everything one client should be reminded about
#[derive(Debug, Clone, Serialize)]
pub struct CompanyReminder {
    pub empresa_id: i64,
    pub empresa: String,
    pub email: String,
    pub equipment: Vec<DueItem>,
    pub inspections: Vec<InspectionItem>,
}

impl CompanyReminder {
    pub fn is_empty(&self) -> bool {
        self.equipment.is_empty() && self.inspections.is_empty()
    }
}

/// Reminder slot for a company, created on first use; `None` for inactive companies
fn company_entry<'a>(
    db: &Database,
    by_company: &'a mut BTreeMap<i64, CompanyReminder>,
    empresa_id: i64,
) -> StoreResult<Option<&'a mut CompanyReminder>> {
    if !by_company.contains_key(&empresa_id) {
        let company = db.get_user(empresa_id)?;
        if !company.ativo {
            return Ok(None);
        }
        by_company.insert(
            empresa_id,
            CompanyReminder {
                empresa_id,
                empresa: company.company_name().to_string(),
                email: company.email.clone(),
                equipment: Vec::new(),
                inspections: Vec::new(),
            },
        );
    }
    Ok(by_company.get_mut(&empresa_id))
}

/// Gather due equipment and upcoming inspections, one entry per company
///
/// Companies whose account is inactive are skipped.
pub fn collect_reminders(
    db: &Database,
    today: NaiveDate,
    window_days: i64,
) -> StoreResult<Vec<CompanyReminder>> {
    let mut by_company: BTreeMap<i64, CompanyReminder> = BTreeMap::new();

    for (summary, info) in db.due_equipment(today, window_days, None)? {
        let eq = &summary.equipment;
        if let Some(reminder) = company_entry(db, &mut by_company, eq.empresa_id)? {
            reminder.equipment.push(DueItem {
                equipamento_id: eq.id,
                tag: eq.tag.clone(),
                tipo: eq.tipo.to_string(),
                status: info.status,
                next_due: info.next_due,
                days_remaining: info.days_remaining,
            });
        }
    }

    for upcoming in db.upcoming_inspections(today, window_days, None)? {
        let detail = &upcoming.detail;
        if let Some(reminder) = company_entry(db, &mut by_company, detail.empresa_id)? {
            reminder.inspections.push(InspectionItem {
                inspecao_id: detail.inspection.id,
                tag: detail.equipamento_tag.clone(),
                tipo: detail.inspection.tipo_inspecao.to_string(),
                due: upcoming.due,
                engenheiro: detail.engenheiro.clone(),
            });
        }
    }

    Ok(by_company.into_values().filter(|r| !r.is_empty()).collect())
}

#[derive(Serialize)]
struct EquipmentLine {
    tag: String,
    tipo: String,
    situacao: String,
    vencimento: String,
}

#[derive(Serialize)]
struct InspectionLine {
    tag: String,
    tipo: String,
    data: String,
    engenheiro: String,
}

#[derive(Serialize)]
struct ReminderContext {
    empresa: String,
    hoje: String,
    janela: i64,
    equipamentos: Vec<EquipmentLine>,
    inspecoes: Vec<InspectionLine>,
}

fn br_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn situation(item: &DueItem) -> String {
    match (item.status, item.days_remaining) {
        (MaintenanceStatus::Overdue, Some(days)) => format!("VENCIDA ha {} dia(s)", -days),
        (MaintenanceStatus::DueSoon, Some(0)) => "vence hoje".to_string(),
        (MaintenanceStatus::DueSoon, Some(days)) => format!("vence em {} dia(s)", days),
        (status, _) => status.to_string(),
    }
}

/// Render the reminder message for one company
pub fn render_reminder(
    renderer: &TemplateRenderer,
    reminder: &CompanyReminder,
    today: NaiveDate,
    window_days: i64,
) -> Result<OutgoingMail, TemplateError> {
    let context = ReminderContext {
        empresa: reminder.empresa.clone(),
        hoje: br_date(today),
        janela: window_days,
        equipamentos: reminder
            .equipment
            .iter()
            .map(|item| EquipmentLine {
                tag: item.tag.clone(),
                tipo: item.tipo.clone(),
                situacao: situation(item),
                vencimento: item.next_due.map(br_date).unwrap_or_default(),
            })
            .collect(),
        inspecoes: reminder
            .inspections
            .iter()
            .map(|item| InspectionLine {
                tag: item.tag.clone(),
                tipo: item.tipo.clone(),
                data: br_date(item.due),
                engenheiro: item.engenheiro.clone(),
            })
            .collect(),
    };

    let overdue = reminder
        .equipment
        .iter()
        .filter(|i| i.status == MaintenanceStatus::Overdue)
        .count();
    let subject = if overdue > 0 {
        format!("[NR-13] {} equipamento(s) com manutencao vencida - {}", overdue, reminder.empresa)
    } else {
        format!("[NR-13] Lembrete de manutencao e inspecoes - {}", reminder.empresa)
    };

    Ok(OutgoingMail {
        to: reminder.email.clone(),
        subject,
        body: renderer.render(REMINDER_TEMPLATE, &context)?,
    })
}

/// Result of a reminder run
#[derive(Debug, Default, Serialize)]
pub struct SendOutcome {
    pub sent: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Send one message per company, continuing past failures
///
/// `override_to` redirects every message to a single address.
pub fn send_reminders(
    mailer: &dyn Mailer,
    renderer: &TemplateRenderer,
    reminders: &[CompanyReminder],
    today: NaiveDate,
    window_days: i64,
    override_to: Option<&str>,
) -> SendOutcome {
    let mut outcome = SendOutcome::default();

    for reminder in reminders {
        let result = render_reminder(renderer, reminder, today, window_days)
            .map_err(|e| MailError::Message(e.to_string()))
            .and_then(|mut mail| {
                if let Some(to) = override_to {
                    mail.to = to.to_string();
                }
                mailer.send(&mail)
            });

        match result {
            Ok(()) => outcome.sent.push(reminder.empresa.clone()),
            Err(e) => {
                warn!(empresa_id = reminder.empresa_id, error = %e, "reminder not sent");
                outcome.failed.push((reminder.empresa.clone(), e.to_string()));
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::*;
    use chrono::Duration;
    use std::cell::RefCell;

    struct Recording {
        sent: RefCell<Vec<OutgoingMail>>,
        fail_for: Option<String>,
    }

    impl Mailer for Recording {
        fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
            if self.fail_for.as_deref() == Some(mail.to.as_str()) {
                return Err(MailError::Transport("connection refused".into()));
            }
            self.sent.borrow_mut().push(mail.clone());
            Ok(())
        }
    }

    fn client(db: &Database, nome: &str, email: &str) -> User {
        db.create_user(&NewUser {
            nome: nome.into(),
            email: email.into(),
            password: "segredo123".into(),
            tipo_acesso: Role::Cliente,
            empresa: Some(format!("{} SA", nome)),
            crea: None,
        })
        .unwrap()
    }

    fn equipment(db: &Database, empresa_id: i64, tag: &str, last: NaiveDate) {
        db.create_equipment(&NewEquipment {
            tag: tag.into(),
            empresa_id,
            frequencia_manutencao: Some(90),
            data_ultima_manutencao: Some(last),
            ..Default::default()
        })
        .unwrap();
    }

    #[test]
    fn test_collect_groups_by_company() {
        let db = Database::open_in_memory().unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let a = client(&db, "Alfa", "alfa@example.com");
        let b = client(&db, "Beta", "beta@example.com");
        let c = client(&db, "Gama", "gama@example.com");

        equipment(&db, a.id, "A-1", today - Duration::days(100));
        equipment(&db, a.id, "A-2", today - Duration::days(80));
        equipment(&db, b.id, "B-1", today - Duration::days(10));
        equipment(&db, c.id, "C-1", today - Duration::days(95));
        db.set_user_active(c.id, false).unwrap();

        let reminders = collect_reminders(&db, today, 30).unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].empresa, "Alfa SA");
        assert_eq!(reminders[0].equipment.len(), 2);
        assert_eq!(reminders[0].equipment[0].status, MaintenanceStatus::Overdue);
    }

    #[test]
    fn test_send_continues_after_failure() {
        let db = Database::open_in_memory().unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let a = client(&db, "Alfa", "alfa@example.com");
        let b = client(&db, "Beta", "beta@example.com");
        equipment(&db, a.id, "A-1", today - Duration::days(100));
        equipment(&db, b.id, "B-1", today - Duration::days(85));

        let reminders = collect_reminders(&db, today, 30).unwrap();
        let renderer = TemplateRenderer::new().unwrap();
        let mailer = Recording {
            sent: RefCell::new(Vec::new()),
            fail_for: Some("alfa@example.com".into()),
        };

        let outcome = send_reminders(&mailer, &renderer, &reminders, today, 30, None);
        assert_eq!(outcome.sent, vec!["Beta SA".to_string()]);
        assert_eq!(outcome.failed.len(), 1);

        let sent = mailer.sent.borrow();
        assert!(sent[0].body.contains("B-1"));
        assert!(sent[0].body.contains("vence em 5 dia(s)"));
        assert!(sent[0].subject.contains("Beta SA"));
    }
}
