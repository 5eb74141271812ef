use super::*;
use crate::core::maintenance::MaintenanceStatus;
use crate::entities::*;
use chrono::{Duration, Local, NaiveDate};
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn new_user(nome: &str, email: &str, role: Role) -> NewUser {
    NewUser {
        nome: nome.to_string(),
        email: email.to_string(),
        password: "segredo123".to_string(),
        tipo_acesso: role,
        empresa: (role == Role::Cliente).then(|| format!("{} Ltda", nome)),
        crea: (role == Role::Engenheiro).then(|| "SP-123456".to_string()),
    }
}

struct Fixture {
    db: Database,
    admin: User,
    client: User,
    engineer: User,
}

fn fixture() -> Fixture {
    let db = Database::open_in_memory().unwrap();
    let admin = db
        .create_user(&new_user("Admin", "admin@example.com", Role::Admin))
        .unwrap();
    let client = db
        .create_user(&new_user("Acme", "contato@acme.com", Role::Cliente))
        .unwrap();
    let engineer = db
        .create_user(&new_user("Beatriz", "beatriz@insp.com", Role::Engenheiro))
        .unwrap();
    Fixture {
        db,
        admin,
        client,
        engineer,
    }
}

fn vessel(empresa_id: i64, tag: &str) -> NewEquipment {
    NewEquipment {
        tag: tag.to_string(),
        tipo: EquipmentType::VasoPressao,
        empresa_id,
        pressao_projeto: Some(1.2),
        pressao_trabalho: Some(0.8),
        pmta: Some(1.0),
        volume: Some(2.0),
        classe_fluido: Some(crate::core::nr13::FluidClass::C),
        frequencia_manutencao: Some(365),
        ..Default::default()
    }
}

fn schedule(f: &Fixture, equipamento_id: i64, when: NaiveDate) -> Inspection {
    f.db.create_inspection(&NewInspection {
        equipamento_id,
        engenheiro_id: f.engineer.id,
        data_inspecao: when,
        tipo_inspecao: InspectionKind::PeriodicaExterna,
        recomendacoes: None,
        proxima_inspecao: None,
        status: InspectionStatus::Agendada,
    })
    .unwrap()
}

#[test]
fn test_open_file_creates_schema_once() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join(".nr13").join("nr13.db");
    {
        let db = Database::open(&path).unwrap();
        db.create_user(&new_user("Admin", "admin@example.com", Role::Admin))
            .unwrap();
    }
    let mut db = Database::open(&path).unwrap();
    assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
    assert!(!db.ensure_connected().unwrap());

    let stats = db.statistics().unwrap();
    assert_eq!(stats.rows["usuarios"], 1);
    assert!(stats.size_bytes > 0);
}

#[test]
fn test_authenticate() {
    let f = fixture();
    let user = f.db.authenticate("ADMIN@example.com", "segredo123").unwrap();
    assert_eq!(user.id, f.admin.id);

    let wrong = f.db.authenticate("admin@example.com", "nope").unwrap_err();
    let unknown = f.db.authenticate("ghost@example.com", "segredo123").unwrap_err();
    assert_eq!(wrong.to_string(), unknown.to_string());

    f.db.set_user_active(f.engineer.id, false).unwrap();
    assert!(f.db.authenticate("beatriz@insp.com", "segredo123").is_err());
}

#[test]
fn test_authenticate_upgrades_legacy_hash_once() {
    let f = fixture();
    // sha256("admin123")
    f.db.conn
        .execute(
            "UPDATE usuarios SET senha_hash = ?1 WHERE id = ?2",
            rusqlite::params![
                "240be518fabd2724ddb6f04eeb1da5967448d7e831c08c8fa822809f74c720a9",
                f.admin.id
            ],
        )
        .unwrap();

    let user = f.db.authenticate("admin@example.com", "admin123").unwrap();
    assert!(!crate::core::auth::needs_rehash(&user.senha_hash));
    assert_eq!(f.db.get_user(f.admin.id).unwrap().senha_hash, user.senha_hash);

    let again = f.db.authenticate("admin@example.com", "admin123").unwrap();
    assert_eq!(again.senha_hash, user.senha_hash);
}

#[test]
fn test_duplicate_email_is_conflict() {
    let f = fixture();
    let err = f
        .db
        .create_user(&new_user("Outro", "Contato@Acme.com", Role::Cliente))
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[test]
fn test_last_admin_is_protected() {
    let f = fixture();
    assert!(f.db.set_user_active(f.admin.id, false).is_err());
    assert!(f.db.delete_user(f.admin.id).is_err());

    f.db.create_user(&new_user("Second", "second@example.com", Role::Admin))
        .unwrap();
    assert!(f.db.set_user_active(f.admin.id, false).is_ok());
}

#[test]
fn test_create_equipment_and_list() {
    let f = fixture();
    let eq = f.db.create_equipment(&vessel(f.client.id, "VP-001")).unwrap();
    // PMTA 1.0 MPa x 2.0 m3, class C -> group 4 -> category IV
    assert_eq!(eq.categoria, Some(crate::core::nr13::Category::IV));

    let all = f.db.get_all_equipment(&EquipmentFilter::default()).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].equipment.tag, "VP-001");
    assert_eq!(all[0].empresa, "Acme Ltda");
}

#[test]
fn test_equipment_validation() {
    let f = fixture();

    let mut bad = vessel(f.client.id, "VP-002");
    bad.pressao_trabalho = Some(2.0);
    assert!(matches!(
        f.db.create_equipment(&bad),
        Err(StoreError::Validation(_))
    ));

    // owner must be a client
    assert!(f.db.create_equipment(&vessel(f.engineer.id, "VP-003")).is_err());
    assert!(matches!(
        f.db.create_equipment(&vessel(9999, "VP-004")),
        Err(StoreError::NotFound { .. })
    ));

    f.db.create_equipment(&vessel(f.client.id, "VP-005")).unwrap();
    assert!(matches!(
        f.db.create_equipment(&vessel(f.client.id, "vp-005")),
        Err(StoreError::Conflict(_))
    ));
}

#[test]
fn test_equipment_with_inspections_cannot_be_deleted() {
    let f = fixture();
    let eq = f.db.create_equipment(&vessel(f.client.id, "VP-001")).unwrap();
    schedule(&f, eq.id, date(2025, 3, 1));

    assert!(matches!(
        f.db.delete_equipment(eq.id),
        Err(StoreError::Conflict(_))
    ));
    assert!(f.db.get_equipment(eq.id).is_ok());

    let spare = f.db.create_equipment(&vessel(f.client.id, "VP-002")).unwrap();
    f.db.delete_equipment(spare.id).unwrap();
    assert!(f.db.get_equipment(spare.id).is_err());
}

#[test]
fn test_next_inspection_defaults_from_category() {
    let f = fixture();
    let eq = f.db.create_equipment(&vessel(f.client.id, "VP-001")).unwrap();
    let insp = schedule(&f, eq.id, date(2025, 3, 1));
    // category IV: external interval of 4 years
    assert_eq!(insp.proxima_inspecao, Some(date(2029, 3, 1)));
}

#[test]
fn test_complete_inspection_updates_equipment() {
    let mut f = fixture();
    let eq = f.db.create_equipment(&vessel(f.client.id, "VP-001")).unwrap();
    assert_eq!(eq.data_ultima_manutencao, None);

    let insp = schedule(&f, eq.id, date(2025, 3, 1));
    let done = f
        .db
        .complete_inspection(insp.id, InspectionResult::Aprovado, Some("ok".into()), None)
        .unwrap();
    assert_eq!(done.status, InspectionStatus::Concluida);
    assert_eq!(done.resultado, Some(InspectionResult::Aprovado));

    let eq = f.db.get_equipment(eq.id).unwrap();
    assert_eq!(eq.data_ultima_manutencao, Some(date(2025, 3, 1)));

    // concluded inspections are final
    assert!(f
        .db
        .complete_inspection(insp.id, InspectionResult::Reprovado, None, None)
        .is_err());
    assert!(f.db.cancel_inspection(insp.id).is_err());
}

#[test]
fn test_maintenance_filter() {
    let f = fixture();
    let today = date(2025, 6, 1);

    let mut overdue = vessel(f.client.id, "A-OVERDUE");
    overdue.data_ultima_manutencao = Some(today - Duration::days(400));
    f.db.create_equipment(&overdue).unwrap();

    let mut soon = vessel(f.client.id, "B-SOON");
    soon.data_ultima_manutencao = Some(today - Duration::days(350));
    f.db.create_equipment(&soon).unwrap();

    f.db.create_equipment(&vessel(f.client.id, "C-NEVER")).unwrap();

    let only = |status| {
        f.db.get_all_equipment(&EquipmentFilter {
            maintenance: Some(MaintenanceQuery {
                status,
                today,
                due_soon_days: 30,
            }),
            ..Default::default()
        })
        .unwrap()
        .into_iter()
        .map(|s| s.equipment.tag)
        .collect::<Vec<_>>()
    };
    assert_eq!(only(MaintenanceStatus::Overdue), vec!["A-OVERDUE"]);
    assert_eq!(only(MaintenanceStatus::DueSoon), vec!["B-SOON"]);
    assert_eq!(only(MaintenanceStatus::Unscheduled), vec!["C-NEVER"]);

    let due = f.db.due_equipment(today, 30, None).unwrap();
    let tags: Vec<_> = due.iter().map(|(s, _)| s.equipment.tag.as_str()).collect();
    assert_eq!(tags, vec!["A-OVERDUE", "B-SOON"]);
}

#[test]
fn test_upcoming_inspections() {
    let f = fixture();
    let today = Local::now().date_naive();
    let eq = f.db.create_equipment(&vessel(f.client.id, "VP-001")).unwrap();
    schedule(&f, eq.id, today + Duration::days(10));

    let upcoming = f.db.upcoming_inspections(today, 30, None).unwrap();
    assert_eq!(upcoming.len(), 1);
    assert!(upcoming[0].scheduled);

    assert!(f.db.upcoming_inspections(today, 5, None).unwrap().is_empty());
}

#[test]
fn test_reports_block_inspection_delete() {
    let mut f = fixture();
    let eq = f.db.create_equipment(&vessel(f.client.id, "VP-001")).unwrap();
    let insp = schedule(&f, eq.id, date(2025, 3, 1));
    f.db.complete_inspection(insp.id, InspectionResult::Aprovado, None, None)
        .unwrap();

    let report = f
        .db
        .insert_report(
            insp.id,
            date(2025, 3, 2),
            std::path::Path::new("reports/relatorio_1_20250302120000.pdf"),
            &Some("  ".into()),
        )
        .unwrap();
    assert_eq!(report.observacoes, None);

    let listed = f
        .db
        .list_reports(&ReportFilter {
            empresa_id: Some(f.client.id),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(listed.len(), 1);

    assert!(f.db.delete_inspection(insp.id).is_err());
    f.db.delete_report_row(report.id).unwrap();
    f.db.delete_inspection(insp.id).unwrap();
}

#[test]
fn test_import_csv_is_atomic() {
    let mut f = fixture();
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "tag,tipo,empresa_id,pmta,volume,classe_fluido,frequencia_manutencao").unwrap();
    writeln!(file, "VP-010,vaso_pressao,{},1.0,2.0,C,180", f.client.id).unwrap();
    writeln!(file, "CA-001,caldeira,{},,,,365", f.client.id).unwrap();
    file.flush().unwrap();

    let stats = f.db.import_equipment_csv(file.path()).unwrap();
    assert_eq!(stats.rows_read, 2);
    assert_eq!(stats.created.len(), 2);

    let mut bad = NamedTempFile::new().unwrap();
    writeln!(bad, "tag,tipo,empresa_id,frequencia_manutencao").unwrap();
    writeln!(bad, "VP-020,vaso_pressao,{},180", f.client.id).unwrap();
    writeln!(bad, "VP-021,vaso_pressao,{},-5", f.client.id).unwrap();
    bad.flush().unwrap();

    let err = f.db.import_equipment_csv(bad.path()).unwrap_err();
    assert!(err.to_string().contains("line 3"));
    let tags: Vec<_> = f
        .db
        .get_all_equipment(&EquipmentFilter::default())
        .unwrap()
        .into_iter()
        .map(|s| s.equipment.tag)
        .collect();
    assert!(!tags.contains(&"VP-020".to_string()));
}

#[test]
fn test_engineer_workload() {
    let f = fixture();
    let eq = f.db.create_equipment(&vessel(f.client.id, "VP-001")).unwrap();
    schedule(&f, eq.id, date(2030, 1, 10));
    schedule(&f, eq.id, date(2030, 1, 5));

    let summary = f.db.engineer_workload(f.engineer.id).unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.abertas, 2);
    assert_eq!(summary.proxima_agendada, Some(date(2030, 1, 5)));

    assert!(f.db.delete_user(f.engineer.id).is_err());
}

#[test]
fn test_query_raw_rejects_writes() {
    let f = fixture();
    let rows = f.db.query_raw("SELECT email FROM usuarios ORDER BY id").unwrap();
    assert_eq!(rows[0][0], "admin@example.com");
    assert!(matches!(
        f.db.query_raw("DELETE FROM usuarios"),
        Err(StoreError::Permission(_))
    ));
}

#[test]
fn test_update_equipment_validates_like_create() {
    let f = fixture();
    let eq = f.db.create_equipment(&vessel(f.client.id, "VP-001")).unwrap();
    f.db.create_equipment(&vessel(f.client.id, "VP-002")).unwrap();

    let taken = EquipmentPatch {
        tag: Some("vp-002".into()),
        ..Default::default()
    };
    assert!(matches!(
        f.db.update_equipment(eq.id, &taken),
        Err(StoreError::Conflict(_))
    ));

    let over_pmta = EquipmentPatch {
        pressao_trabalho: Some(1.5),
        ..Default::default()
    };
    assert!(matches!(
        f.db.update_equipment(eq.id, &over_pmta),
        Err(StoreError::Validation(_))
    ));

    let lower_pmta = EquipmentPatch {
        pmta: Some(0.5),
        ..Default::default()
    };
    assert!(matches!(
        f.db.update_equipment(eq.id, &lower_pmta),
        Err(StoreError::Validation(_))
    ));

    let huge_frequency = EquipmentPatch {
        frequencia_manutencao: Some(1_000_000_000_000_000),
        ..Default::default()
    };
    assert!(matches!(
        f.db.update_equipment(eq.id, &huge_frequency),
        Err(StoreError::Validation(_))
    ));

    let unchanged = f.db.get_equipment(eq.id).unwrap();
    assert_eq!(unchanged.tag, "VP-001");
    assert_eq!(unchanged.pressao_trabalho, Some(0.8));

    let renamed = f
        .db
        .update_equipment(
            eq.id,
            &EquipmentPatch {
                tag: Some("VP-001A".into()),
                localizacao: Some("Casa de caldeiras".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(renamed.tag, "VP-001A");
    assert_eq!(renamed.localizacao.as_deref(), Some("Casa de caldeiras"));
}

#[test]
fn test_huge_frequency_is_rejected_on_create() {
    let f = fixture();
    let mut eq = vessel(f.client.id, "VP-001");
    eq.frequencia_manutencao = Some(1_000_000_000_000_000);
    assert!(matches!(
        f.db.create_equipment(&eq),
        Err(StoreError::Validation(_))
    ));
    assert!(f
        .db
        .get_all_equipment(&EquipmentFilter::default())
        .unwrap()
        .is_empty());
}

#[test]
fn test_upcoming_inspections_with_huge_window() {
    let f = fixture();
    let today = Local::now().date_naive();
    let eq = f.db.create_equipment(&vessel(f.client.id, "VP-001")).unwrap();
    schedule(&f, eq.id, today + Duration::days(400));

    let upcoming = f.db.upcoming_inspections(today, 100_000_000, None).unwrap();
    assert_eq!(upcoming.len(), 1);
}

#[test]
fn test_update_equipment_keeps_category_without_inputs() {
    let f = fixture();
    let eq = f
        .db
        .create_equipment(&NewEquipment {
            tag: "CA-01".into(),
            tipo: EquipmentType::Caldeira,
            empresa_id: f.client.id,
            categoria: Some(crate::core::nr13::Category::II),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(eq.categoria, Some(crate::core::nr13::Category::II));

    let updated = f
        .db
        .update_equipment(
            eq.id,
            &EquipmentPatch {
                volume: Some(5.0),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.categoria, Some(crate::core::nr13::Category::II));
}

#[test]
fn test_update_equipment_recomputes_category() {
    use crate::core::nr13::{Category, FluidClass};

    let f = fixture();
    let mut new = vessel(f.client.id, "VP-001");
    new.pmta = None;
    new.pressao_trabalho = None;
    let eq = f.db.create_equipment(&new).unwrap();
    assert_eq!(eq.categoria, Some(Category::classify(FluidClass::C, 1.2, 2.0)));

    let by_design_pressure = f
        .db
        .update_equipment(
            eq.id,
            &EquipmentPatch {
                pressao_projeto: Some(8.0),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(
        by_design_pressure.categoria,
        Some(Category::classify(FluidClass::C, 8.0, 2.0))
    );

    let by_class = f
        .db
        .update_equipment(
            eq.id,
            &EquipmentPatch {
                classe_fluido: Some(FluidClass::A),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(
        by_class.categoria,
        Some(Category::classify(FluidClass::A, 8.0, 2.0))
    );

    let explicit = f
        .db
        .update_equipment(
            eq.id,
            &EquipmentPatch {
                categoria: Some(Category::V),
                volume: Some(3.0),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(explicit.categoria, Some(Category::V));
}

#[test]
fn test_update_inspection_rules() {
    let mut f = fixture();
    let eq = f.db.create_equipment(&vessel(f.client.id, "VP-001")).unwrap();
    let insp = schedule(&f, eq.id, date(2025, 3, 1));

    let not_after = InspectionPatch {
        proxima_inspecao: Some(date(2025, 3, 1)),
        ..Default::default()
    };
    assert!(matches!(
        f.db.update_inspection(insp.id, &not_after),
        Err(StoreError::Validation(_))
    ));

    let conclude = InspectionPatch {
        status: Some(InspectionStatus::Concluida),
        ..Default::default()
    };
    assert!(matches!(
        f.db.update_inspection(insp.id, &conclude),
        Err(StoreError::Validation(_))
    ));

    let moved = f
        .db
        .update_inspection(
            insp.id,
            &InspectionPatch {
                data_inspecao: Some(date(2025, 3, 10)),
                status: Some(InspectionStatus::EmAndamento),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(moved.data_inspecao, date(2025, 3, 10));
    assert_eq!(moved.status, InspectionStatus::EmAndamento);

    f.db.complete_inspection(insp.id, InspectionResult::Aprovado, None, None)
        .unwrap();
    let late_edit = InspectionPatch {
        recomendacoes: Some("Pintura".into()),
        ..Default::default()
    };
    assert!(matches!(
        f.db.update_inspection(insp.id, &late_edit),
        Err(StoreError::Conflict(_))
    ));

    let other = schedule(&f, eq.id, date(2025, 4, 1));
    f.db.cancel_inspection(other.id).unwrap();
    assert!(matches!(
        f.db.update_inspection(other.id, &late_edit),
        Err(StoreError::Conflict(_))
    ));
}

#[test]
fn test_update_user_and_password() {
    let f = fixture();

    let renamed = f
        .db
        .update_user(
            f.client.id,
            &UserPatch {
                nome: Some("  Acme Matriz ".into()),
                email: Some("Financeiro@Acme.com".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(renamed.nome, "Acme Matriz");
    assert_eq!(renamed.email, "financeiro@acme.com");

    let taken = UserPatch {
        email: Some("admin@example.com".into()),
        ..Default::default()
    };
    assert!(matches!(
        f.db.update_user(f.client.id, &taken),
        Err(StoreError::Conflict(_))
    ));

    let bad_email = UserPatch {
        email: Some("sem-arroba".into()),
        ..Default::default()
    };
    assert!(matches!(
        f.db.update_user(f.client.id, &bad_email),
        Err(StoreError::Validation(_))
    ));

    let no_crea = UserPatch {
        tipo_acesso: Some(Role::Engenheiro),
        ..Default::default()
    };
    assert!(matches!(
        f.db.update_user(f.client.id, &no_crea),
        Err(StoreError::Validation(_))
    ));

    assert!(matches!(
        f.db.change_password(f.engineer.id, "curta"),
        Err(StoreError::Validation(_))
    ));
    assert!(matches!(
        f.db.change_password(9999, "outrasenha"),
        Err(StoreError::NotFound { .. })
    ));
    f.db.change_password(f.engineer.id, "outrasenha").unwrap();
    assert!(f.db.authenticate("beatriz@insp.com", "segredo123").is_err());
    assert_eq!(
        f.db.authenticate("beatriz@insp.com", "outrasenha").unwrap().id,
        f.engineer.id
    );
}

#[test]
fn test_client_owning_equipment_cannot_be_deleted() {
    let f = fixture();
    f.db.create_equipment(&vessel(f.client.id, "VP-001")).unwrap();

    assert!(matches!(
        f.db.delete_user(f.client.id),
        Err(StoreError::Conflict(_))
    ));
    assert!(f.db.get_user(f.client.id).is_ok());

    let spare = f
        .db
        .create_user(&new_user("Vazia", "vazia@example.com", Role::Cliente))
        .unwrap();
    f.db.delete_user(spare.id).unwrap();
    assert!(matches!(
        f.db.get_user(spare.id),
        Err(StoreError::NotFound { .. })
    ));
}
