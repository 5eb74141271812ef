//! User accounts, authentication and engineer queries

use chrono::{NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use tracing::{info, warn};

use super::{clean, Database};
use crate::core::auth::{hash_password, needs_rehash, validate_password, verify_password};
use crate::core::error::{StoreError, StoreResult};
use crate::entities::user::{NewUser, Role, User, UserFilter, UserPatch};

const USER_COLUMNS: &str =
    "id, nome, email, senha_hash, tipo_acesso, empresa, crea, ativo, criado_em";

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        nome: row.get(1)?,
        email: row.get(2)?,
        senha_hash: row.get(3)?,
        tipo_acesso: row.get(4)?,
        empresa: row.get(5)?,
        crea: row.get(6)?,
        ativo: row.get(7)?,
        criado_em: row.get(8)?,
    })
}

/// Engineer with inspection counts
#[derive(Debug, Clone, Serialize)]
pub struct EngineerSummary {
    pub id: i64,
    pub nome: String,
    pub email: String,
    pub crea: Option<String>,
    pub ativo: bool,
    pub total: usize,
    pub abertas: usize,
    pub concluidas: usize,
    pub proxima_agendada: Option<NaiveDate>,
}

/// Basic shape check: `local@domain.tld`
fn validate_email(email: &str) -> StoreResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && domain.contains('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StoreError::validation(format!("invalid e-mail address: {}", email)))
    }
}

fn validate_role_fields(role: Role, empresa: &Option<String>, crea: &Option<String>) -> StoreResult<()> {
    match role {
        Role::Cliente if empresa.is_none() => Err(StoreError::validation(
            "client users must have a company name (empresa)",
        )),
        Role::Engenheiro if crea.is_none() => Err(StoreError::validation(
            "engineers must have a CREA registration number",
        )),
        _ => Ok(()),
    }
}

impl Database {
    /// Create a user account
    pub fn create_user(&self, new: &NewUser) -> StoreResult<User> {
        let nome = new.nome.trim();
        let email = new.email.trim().to_lowercase();
        let empresa = clean(&new.empresa);
        let crea = clean(&new.crea);

        if nome.is_empty() {
            return Err(StoreError::validation("name must not be empty"));
        }
        validate_email(&email)?;
        validate_password(&new.password)?;
        validate_role_fields(new.tipo_acesso, &empresa, &crea)?;

        if self.find_user_by_email(&email)?.is_some() {
            return Err(StoreError::conflict(format!(
                "a user with e-mail {} already exists",
                email
            )));
        }

        self.conn.execute(
            "INSERT INTO usuarios (nome, email, senha_hash, tipo_acesso, empresa, crea, ativo, criado_em)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
            params![
                nome,
                email,
                hash_password(&new.password),
                new.tipo_acesso,
                empresa,
                crea,
                Utc::now()
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(user_id = id, role = %new.tipo_acesso, "user created");
        self.get_user(id)
    }

    /// Check credentials and return the matching active user
    ///
    /// Unknown e-mail and wrong password produce the same error.
    pub fn authenticate(&self, email: &str, password: &str) -> StoreResult<User> {
        let invalid = || StoreError::Authentication("invalid e-mail or password".to_string());

        let user = self
            .find_user_by_email(email.trim())?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.senha_hash) {
            warn!(user_id = user.id, "failed login attempt");
            return Err(invalid());
        }
        if !user.ativo {
            return Err(StoreError::Authentication("account is inactive".to_string()));
        }

        if needs_rehash(&user.senha_hash) {
            self.conn.execute(
                "UPDATE usuarios SET senha_hash = ?1 WHERE id = ?2",
                params![hash_password(password), user.id],
            )?;
            info!(user_id = user.id, "upgraded legacy password hash");
            return self.get_user(user.id);
        }

        Ok(user)
    }

    pub fn get_user(&self, id: i64) -> StoreResult<User> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM usuarios WHERE id = ?1", USER_COLUMNS),
                params![id],
                user_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("user", id))
    }

    pub fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {} FROM usuarios WHERE email = ?1", USER_COLUMNS),
                params![email.trim().to_lowercase()],
                user_from_row,
            )
            .optional()?)
    }

    /// List users ordered by name
    pub fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let mut sql = format!("SELECT {} FROM usuarios WHERE 1=1", USER_COLUMNS);
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![];

        if let Some(role) = filter.role {
            sql.push_str(" AND tipo_acesso = ?");
            params_vec.push(Box::new(role));
        }

        if !filter.include_inactive {
            sql.push_str(" AND ativo = 1");
        }

        if let Some(ref search) = filter.search {
            sql.push_str(" AND (nome LIKE ? OR email LIKE ? OR empresa LIKE ?)");
            let pattern = format!("%{}%", search);
            params_vec.push(Box::new(pattern.clone()));
            params_vec.push(Box::new(pattern.clone()));
            params_vec.push(Box::new(pattern));
        }

        sql.push_str(" ORDER BY nome COLLATE NOCASE ASC");

        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_refs.as_slice(), user_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Update name, e-mail, role, company or CREA
    pub fn update_user(&self, id: i64, patch: &UserPatch) -> StoreResult<User> {
        let current = self.get_user(id)?;

        let nome = patch
            .nome
            .as_deref()
            .map(str::trim)
            .unwrap_or(&current.nome)
            .to_string();
        let email = patch
            .email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .unwrap_or_else(|| current.email.clone());
        let role = patch.tipo_acesso.unwrap_or(current.tipo_acesso);
        let empresa = if patch.empresa.is_some() {
            clean(&patch.empresa)
        } else {
            current.empresa.clone()
        };
        let crea = if patch.crea.is_some() {
            clean(&patch.crea)
        } else {
            current.crea.clone()
        };

        if nome.is_empty() {
            return Err(StoreError::validation("name must not be empty"));
        }
        validate_email(&email)?;
        validate_role_fields(role, &empresa, &crea)?;

        if email != current.email {
            if let Some(other) = self.find_user_by_email(&email)? {
                if other.id != id {
                    return Err(StoreError::conflict(format!(
                        "a user with e-mail {} already exists",
                        email
                    )));
                }
            }
        }

        if role != current.tipo_acesso {
            self.ensure_role_change_allowed(&current, role)?;
        }

        self.conn.execute(
            "UPDATE usuarios SET nome = ?1, email = ?2, tipo_acesso = ?3, empresa = ?4, crea = ?5 WHERE id = ?6",
            params![nome, email, role, empresa, crea, id],
        )?;
        info!(user_id = id, "user updated");
        self.get_user(id)
    }

    fn ensure_role_change_allowed(&self, current: &User, new_role: Role) -> StoreResult<()> {
        if current.is_admin() && current.ativo && self.count_active_admins()? <= 1 {
            return Err(StoreError::conflict(
                "cannot change the role of the last active administrator",
            ));
        }
        if current.tipo_acesso == Role::Cliente && self.count_company_equipment(current.id)? > 0 {
            return Err(StoreError::conflict(format!(
                "user #{} owns equipment and must remain a client",
                current.id
            )));
        }
        if current.tipo_acesso == Role::Engenheiro
            && new_role != Role::Engenheiro
            && self.count_engineer_inspections(current.id)? > 0
        {
            return Err(StoreError::conflict(format!(
                "user #{} is the engineer of existing inspections",
                current.id
            )));
        }
        Ok(())
    }

    /// Activate or deactivate an account
    pub fn set_user_active(&self, id: i64, active: bool) -> StoreResult<User> {
        let user = self.get_user(id)?;
        if !active && user.is_admin() && user.ativo && self.count_active_admins()? <= 1 {
            return Err(StoreError::conflict(
                "cannot deactivate the last active administrator",
            ));
        }
        self.conn.execute(
            "UPDATE usuarios SET ativo = ?1 WHERE id = ?2",
            params![active, id],
        )?;
        info!(user_id = id, active, "user activation changed");
        self.get_user(id)
    }

    pub fn change_password(&self, id: i64, new_password: &str) -> StoreResult<()> {
        validate_password(new_password)?;
        let changed = self.conn.execute(
            "UPDATE usuarios SET senha_hash = ?1 WHERE id = ?2",
            params![hash_password(new_password), id],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("user", id));
        }
        info!(user_id = id, "password changed");
        Ok(())
    }

    /// Delete a user that nothing references
    pub fn delete_user(&self, id: i64) -> StoreResult<()> {
        let user = self.get_user(id)?;

        if user.is_admin() && user.ativo && self.count_active_admins()? <= 1 {
            return Err(StoreError::conflict("cannot delete the last active administrator"));
        }

        let equipment = self.count_company_equipment(id)?;
        if equipment > 0 {
            warn!(user_id = id, equipment, "refused to delete user owning equipment");
            return Err(StoreError::conflict(format!(
                "user #{} owns {} equipment record(s); deactivate the account instead",
                id, equipment
            )));
        }

        let inspections = self.count_engineer_inspections(id)?;
        if inspections > 0 {
            warn!(user_id = id, inspections, "refused to delete engineer with inspections");
            return Err(StoreError::conflict(format!(
                "user #{} is the engineer of {} inspection(s); deactivate the account instead",
                id, inspections
            )));
        }

        self.conn
            .execute("DELETE FROM usuarios WHERE id = ?1", params![id])?;
        info!(user_id = id, "user deleted");
        Ok(())
    }

    pub(crate) fn count_active_admins(&self) -> StoreResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM usuarios WHERE tipo_acesso = 'admin' AND ativo = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn count_company_equipment(&self, empresa_id: i64) -> StoreResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM equipamentos WHERE empresa_id = ?1",
            params![empresa_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn count_engineer_inspections(&self, engenheiro_id: i64) -> StoreResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM inspecoes WHERE engenheiro_id = ?1",
            params![engenheiro_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Number of users per role (active only)
    pub fn count_users_by_role(&self) -> StoreResult<Vec<(Role, usize)>> {
        let mut stmt = self.conn.prepare(
            "SELECT tipo_acesso, COUNT(*) FROM usuarios WHERE ativo = 1 GROUP BY tipo_acesso ORDER BY tipo_acesso",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, Role>(0)?, row.get::<_, i64>(1)? as usize))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Engineers with their inspection counts
    pub fn list_engineers(&self, include_inactive: bool) -> StoreResult<Vec<EngineerSummary>> {
        let mut sql = String::from(ENGINEER_SUMMARY_SQL);
        if !include_inactive {
            sql.push_str(" AND u.ativo = 1");
        }
        sql.push_str(" GROUP BY u.id ORDER BY u.nome COLLATE NOCASE ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], engineer_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Inspection counts and next scheduled inspection for one engineer
    pub fn engineer_workload(&self, id: i64) -> StoreResult<EngineerSummary> {
        let user = self.get_user(id)?;
        if user.tipo_acesso != Role::Engenheiro {
            return Err(StoreError::validation(format!("user #{} is not an engineer", id)));
        }
        let sql = format!("{} AND u.id = ?1 GROUP BY u.id", ENGINEER_SUMMARY_SQL);
        Ok(self.conn.query_row(&sql, params![id], engineer_from_row)?)
    }
}

const ENGINEER_SUMMARY_SQL: &str = r#"SELECT u.id, u.nome, u.email, u.crea, u.ativo,
        COUNT(i.id),
        COALESCE(SUM(CASE WHEN i.status IN ('agendada', 'em_andamento') THEN 1 ELSE 0 END), 0),
        COALESCE(SUM(CASE WHEN i.status = 'concluida' THEN 1 ELSE 0 END), 0),
        MIN(CASE WHEN i.status = 'agendada' THEN i.data_inspecao END)
   FROM usuarios u
   LEFT JOIN inspecoes i ON i.engenheiro_id = u.id
  WHERE u.tipo_acesso = 'engenheiro'"#;

fn engineer_from_row(row: &Row) -> rusqlite::Result<EngineerSummary> {
    Ok(EngineerSummary {
        id: row.get(0)?,
        nome: row.get(1)?,
        email: row.get(2)?,
        crea: row.get(3)?,
        ativo: row.get(4)?,
        total: row.get::<_, i64>(5)? as usize,
        abertas: row.get::<_, i64>(6)? as usize,
        concluidas: row.get::<_, i64>(7)? as usize,
        proxima_agendada: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ana@example.com").is_ok());
        assert!(validate_email("ana@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ana example@x.com").is_err());
        assert!(validate_email("ana@.com").is_err());
    }

    #[test]
    fn test_validate_role_fields() {
        assert!(validate_role_fields(Role::Cliente, &None, &None).is_err());
        assert!(validate_role_fields(Role::Cliente, &Some("ACME".into()), &None).is_ok());
        assert!(validate_role_fields(Role::Engenheiro, &None, &None).is_err());
        assert!(validate_role_fields(Role::Admin, &None, &None).is_ok());
    }
}
