//! Integration tests for the nr13 CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const ADMIN_EMAIL: &str = "admin@example.com";
const PASSWORD: &str = "segredo123";

/// Helper to get an nr13 command isolated from the caller's environment
fn nr13(tmp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("nr13").unwrap();
    cmd.current_dir(tmp.path())
        .env_remove("NR13_WORKSPACE")
        .env_remove("NR13_PASSWORD")
        .env_remove("NR13_DUE_SOON_DAYS")
        .env_remove("NR13_REPORTS_DIR")
        .env_remove("DB_NAME")
        .env_remove("SMTP_HOST");
    cmd
}

/// Helper to create a workspace with an administrator
fn setup_workspace() -> TempDir {
    let tmp = TempDir::new().unwrap();
    nr13(&tmp)
        .args([
            "init",
            "--admin-email",
            ADMIN_EMAIL,
            "--admin-password",
            PASSWORD,
        ])
        .assert()
        .success();
    tmp
}

fn login(tmp: &TempDir, email: &str) {
    nr13(tmp)
        .args(["login", "--email", email, "--password", PASSWORD])
        .assert()
        .success();
}

/// Workspace with admin (id 1), client (id 2), engineer (id 3) and
/// equipment VP-001 (id 1); the admin is logged in
fn setup_populated() -> TempDir {
    let tmp = setup_workspace();
    login(&tmp, ADMIN_EMAIL);

    nr13(&tmp)
        .args([
            "user",
            "new",
            "--name",
            "Maria Souza",
            "--email",
            "cliente@acme.com",
            "--role",
            "cliente",
            "--company",
            "Acme Industria",
            "--password",
            PASSWORD,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("id 2"));

    nr13(&tmp)
        .args([
            "user",
            "new",
            "--name",
            "Joao Lima",
            "--email",
            "eng@example.com",
            "--role",
            "engenheiro",
            "--crea",
            "SP-123456",
            "--password",
            PASSWORD,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("id 3"));

    nr13(&tmp)
        .args([
            "equip",
            "new",
            "--tag",
            "VP-001",
            "--company",
            "2",
            "--fluid-class",
            "A",
            "--pmta",
            "2.0",
            "--volume",
            "1.0",
            "--frequency",
            "180",
            "--last-maintenance",
            "2020-01-15",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("VP-001"));

    tmp
}

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    let tmp = TempDir::new().unwrap();
    nr13(&tmp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("NR-13"))
        .stdout(predicate::str::contains("equip"))
        .stdout(predicate::str::contains("insp"));
}

#[test]
fn test_version_displays() {
    let tmp = TempDir::new().unwrap();
    nr13(&tmp)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("nr13"));
}

#[test]
fn test_category_calculator_needs_no_workspace() {
    let tmp = TempDir::new().unwrap();
    nr13(&tmp)
        .args([
            "equip", "category", "--class", "A", "--pressure", "2.0", "--volume", "1.0", "-f",
            "json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"category\": \"III\""))
        .stdout(predicate::str::contains("\"potential_group\": 4"));
}

#[test]
fn test_completions_bash() {
    let tmp = TempDir::new().unwrap();
    nr13(&tmp)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nr13"));
}

// ============================================================================
// Workspace and Session Tests
// ============================================================================

#[test]
fn test_init_creates_workspace_and_database() {
    let tmp = setup_workspace();
    assert!(tmp.path().join(".nr13").is_dir());
    assert!(tmp.path().join(".nr13/nr13.db").is_file());
}

#[test]
fn test_init_twice_is_harmless() {
    let tmp = setup_workspace();
    nr13(&tmp)
        .args(["init", "--admin-email", ADMIN_EMAIL])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_commands_require_login() {
    let tmp = setup_workspace();
    nr13(&tmp)
        .args(["equip", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not logged in"));
}

#[test]
fn test_wrong_password_is_refused() {
    let tmp = setup_workspace();
    nr13(&tmp)
        .args(["login", "--email", ADMIN_EMAIL, "--password", "wrong-one"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("authentication failed"));
}

#[test]
fn test_login_whoami_logout() {
    let tmp = setup_workspace();
    login(&tmp, ADMIN_EMAIL);

    nr13(&tmp)
        .args(["whoami", "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(ADMIN_EMAIL))
        .stdout(predicate::str::contains("\"tipo_acesso\": \"admin\""));

    nr13(&tmp)
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged out"));
    assert!(!tmp.path().join(".nr13/session.yaml").exists());

    nr13(&tmp).arg("whoami").assert().failure();
}

#[test]
fn test_db_status_lists_tables() {
    let tmp = setup_workspace();
    nr13(&tmp)
        .args(["db", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("usuarios"))
        .stdout(predicate::str::contains("equipamentos"));
}

#[test]
fn test_configured_default_format() {
    let tmp = setup_workspace();
    fs::write(tmp.path().join(".nr13/config.yaml"), "default_format: json\n").unwrap();

    let output = nr13(&tmp).args(["db", "status"]).output().unwrap();
    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(stats["rows"]["usuarios"].is_number());

    // an explicit --format wins over the configured one
    nr13(&tmp)
        .args(["db", "status", "--format", "tsv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Schema version"));
}

// ============================================================================
// Permission Tests
// ============================================================================

#[test]
fn test_client_cannot_register_equipment() {
    let tmp = setup_populated();
    login(&tmp, "cliente@acme.com");

    nr13(&tmp)
        .args(["equip", "new", "--tag", "VP-999", "--company", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("permission denied"));
}

#[test]
fn test_client_sees_own_equipment() {
    let tmp = setup_populated();
    login(&tmp, "cliente@acme.com");

    nr13(&tmp)
        .args(["equip", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("VP-001"));

    nr13(&tmp)
        .args(["user", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("permission denied"));
}

#[test]
fn test_client_cannot_run_raw_queries() {
    let tmp = setup_populated();
    login(&tmp, "cliente@acme.com");

    nr13(&tmp)
        .args(["db", "query", "SELECT * FROM usuarios"])
        .assert()
        .failure();
}

#[test]
fn test_raw_query_rejects_writes() {
    let tmp = setup_populated();
    nr13(&tmp)
        .args(["db", "query", "DELETE FROM usuarios"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("read-only"));

    nr13(&tmp)
        .args(["db", "query", "SELECT tag FROM equipamentos", "-f", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tag"))
        .stdout(predicate::str::contains("VP-001"));
}

// ============================================================================
// Equipment Tests
// ============================================================================

#[test]
fn test_equipment_category_is_computed() {
    let tmp = setup_populated();
    nr13(&tmp)
        .args(["equip", "show", "1", "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"categoria\": \"III\""));
}

#[test]
fn test_overdue_equipment_is_due() {
    let tmp = setup_populated();
    nr13(&tmp)
        .args(["equip", "due"])
        .assert()
        .success()
        .stdout(predicate::str::contains("VP-001"));
}

#[test]
fn test_equipment_for_unknown_company_is_refused() {
    let tmp = setup_populated();
    // user 3 is an engineer, not a client company
    nr13(&tmp)
        .args(["equip", "new", "--tag", "VP-002", "--company", "3"])
        .assert()
        .failure();
}

#[test]
fn test_equipment_import_csv() {
    let tmp = setup_populated();
    let csv_path = tmp.path().join("equip.csv");
    fs::write(
        &csv_path,
        "tag,empresa_id,tipo,pmta,volume,classe_fluido\nVP-010,2,vaso_pressao,1.0,1.0,B\nCA-011,2,caldeira,,,\n",
    )
    .unwrap();

    nr13(&tmp)
        .args(["equip", "import", csv_path.to_str().unwrap()])
        .assert()
        .success();

    nr13(&tmp)
        .args(["equip", "list", "--count"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3"));
}

// ============================================================================
// Inspection Workflow Tests
// ============================================================================

#[test]
fn test_inspection_report_workflow() {
    let tmp = setup_populated();

    nr13(&tmp)
        .args(["insp", "new", "--equipment", "1", "--engineer", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#1"));

    // a scheduled inspection cannot be reported yet
    nr13(&tmp)
        .args(["report", "generate", "1"])
        .assert()
        .failure();

    login(&tmp, "eng@example.com");
    nr13(&tmp)
        .args([
            "insp",
            "complete",
            "1",
            "--result",
            "aprovado",
            "--recommendations",
            "Substituir manometro",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Concluded inspection"));

    nr13(&tmp)
        .args(["report", "generate", "1", "--obs", "Sem pendencias"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated report"));

    let pdfs: Vec<_> = fs::read_dir(tmp.path().join("reports"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "pdf"))
        .collect();
    assert_eq!(pdfs.len(), 1);
    let bytes = fs::read(pdfs[0].path()).unwrap();
    assert!(bytes.starts_with(b"%PDF"));

    // completion moved the equipment's last maintenance to today
    nr13(&tmp)
        .args(["equip", "due"])
        .assert()
        .success()
        .stdout(predicate::str::contains("VP-001").not());

    login(&tmp, "cliente@acme.com");
    nr13(&tmp)
        .args(["report", "list", "--count"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1"));
}

#[test]
fn test_engineer_cannot_complete_foreign_inspection() {
    let tmp = setup_populated();
    nr13(&tmp)
        .args([
            "user",
            "new",
            "--name",
            "Ana Reis",
            "--email",
            "eng2@example.com",
            "--role",
            "engenheiro",
            "--crea",
            "RJ-654321",
            "--password",
            PASSWORD,
        ])
        .assert()
        .success();
    nr13(&tmp)
        .args(["insp", "new", "--equipment", "1", "--engineer", "3"])
        .assert()
        .success();

    login(&tmp, "eng2@example.com");
    nr13(&tmp)
        .args(["insp", "complete", "1", "--result", "aprovado"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("another engineer"));
}

#[test]
fn test_equipment_with_inspections_cannot_be_deleted() {
    let tmp = setup_populated();
    nr13(&tmp)
        .args(["insp", "new", "--equipment", "1", "--engineer", "3"])
        .assert()
        .success();

    nr13(&tmp)
        .args(["equip", "delete", "1", "--yes"])
        .assert()
        .failure();
}

// ============================================================================
// Dashboard and Reminder Tests
// ============================================================================

#[test]
fn test_status_json_reports_critical_when_overdue() {
    let tmp = setup_populated();
    nr13(&tmp)
        .args(["status", "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"health\": \"critical\""))
        .stdout(predicate::str::contains("\"overdue\": 1"));
}

#[test]
fn test_remind_dry_run_prints_message() {
    let tmp = setup_populated();
    nr13(&tmp)
        .args(["remind", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cliente@acme.com"))
        .stdout(predicate::str::contains("VP-001"));
}

#[test]
fn test_remind_dry_run_json_is_clean() {
    let tmp = setup_populated();
    let output = nr13(&tmp)
        .args(["remind", "--dry-run", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["sent"].as_array().unwrap().len(), 1);
    assert!(outcome["failed"].as_array().unwrap().is_empty());
}

#[test]
fn test_remind_days_out_of_range() {
    let tmp = setup_populated();
    nr13(&tmp)
        .args(["remind", "--dry-run", "--days", "100000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("days must be between"));
    nr13(&tmp)
        .args(["insp", "upcoming", "--days", "100000000"])
        .assert()
        .failure();
}

#[test]
fn test_remind_without_smtp_requires_dry_run() {
    let tmp = setup_populated();
    nr13(&tmp)
        .arg("remind")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No SMTP server configured"));
}
