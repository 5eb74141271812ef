//! User entity - administrators, client companies and engineers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access level of a user (`tipo_acesso`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access to every record
    Admin,
    /// Client company; owns equipment
    Cliente,
    /// Inspection engineer (requires a CREA number)
    Engenheiro,
}

impl Default for Role {
    fn default() -> Self {
        Role::Cliente
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Cliente => write!(f, "cliente"),
            Role::Engenheiro => write!(f, "engenheiro"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" | "administrador" => Ok(Role::Admin),
            "cliente" | "client" => Ok(Role::Cliente),
            "engenheiro" | "engineer" => Ok(Role::Engenheiro),
            _ => Err(format!(
                "Invalid access type: {}. Use admin, cliente, or engenheiro",
                s
            )),
        }
    }
}

/// A row of `usuarios`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub nome: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub senha_hash: String,
    pub tipo_acesso: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empresa: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crea: Option<String>,
    pub ativo: bool,
    pub criado_em: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.tipo_acesso == Role::Admin
    }

    /// Name shown for the company a client represents
    pub fn company_name(&self) -> &str {
        self.empresa.as_deref().unwrap_or(&self.nome)
    }
}

/// Input for creating a user; the password is still in plain text here
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub nome: String,
    pub email: String,
    pub password: String,
    pub tipo_acesso: Role,
    pub empresa: Option<String>,
    pub crea: Option<String>,
}

/// Partial update of a user; `None` leaves the column unchanged
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub nome: Option<String>,
    pub email: Option<String>,
    pub tipo_acesso: Option<Role>,
    pub empresa: Option<String>,
    pub crea: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.nome.is_none()
            && self.email.is_none()
            && self.tipo_acesso.is_none()
            && self.empresa.is_none()
            && self.crea.is_none()
    }
}

/// Filter for listing users
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub include_inactive: bool,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip_and_aliases() {
        for role in [Role::Admin, Role::Cliente, Role::Engenheiro] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert_eq!("Engineer".parse::<Role>().unwrap(), Role::Engenheiro);
        assert!("guest".parse::<Role>().is_err());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: 1,
            nome: "Ana".into(),
            email: "ana@example.com".into(),
            senha_hash: "secret".into(),
            tipo_acesso: Role::Admin,
            empresa: None,
            crea: None,
            ativo: true,
            criado_em: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"tipo_acesso\":\"admin\""));
    }
}
