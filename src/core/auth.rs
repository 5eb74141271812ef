//! Password hashing, role permissions and the login session file

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::core::error::{StoreError, StoreResult};
use crate::entities::user::{Role, User};

const HASH_SCHEME: &str = "sha256";
const HASH_ROUNDS: u32 = 10_000;
const SALT_LEN: usize = 16;

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 6;

/// Hash a password as `sha256$<rounds>$<salt-hex>$<hash-hex>`
pub fn hash_password(plain: &str) -> String {
    let salt: [u8; SALT_LEN] = rand::random();
    let salt_hex = to_hex(&salt);
    let digest = stretch(plain, &salt_hex, HASH_ROUNDS);
    format!("{}${}${}${}", HASH_SCHEME, HASH_ROUNDS, salt_hex, digest)
}

/// Check a password against a stored hash
///
/// Bare 64-character SHA-256 hex digests written by older installations are
/// accepted as well.
pub fn verify_password(plain: &str, stored: &str) -> bool {
    let parts: Vec<&str> = stored.split('$').collect();
    match parts.as_slice() {
        [scheme, rounds, salt, digest] if *scheme == HASH_SCHEME => {
            let Ok(rounds) = rounds.parse::<u32>() else {
                return false;
            };
            constant_time_eq(stretch(plain, salt, rounds).as_bytes(), digest.as_bytes())
        }
        [legacy] if legacy.len() == 64 => {
            let mut hasher = Sha256::new();
            hasher.update(plain.as_bytes());
            let digest = format!("{:x}", hasher.finalize());
            constant_time_eq(digest.as_bytes(), legacy.to_ascii_lowercase().as_bytes())
        }
        _ => false,
    }
}

/// Whether a stored hash predates the salted format
pub fn needs_rehash(stored: &str) -> bool {
    !stored.starts_with(HASH_SCHEME) || !stored.contains('$')
}

fn stretch(plain: &str, salt_hex: &str, rounds: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(plain.as_bytes());
    let mut digest = hasher.finalize();
    for _ in 1..rounds.max(1) {
        let mut hasher = Sha256::new();
        hasher.update(digest);
        hasher.update(plain.as_bytes());
        digest = hasher.finalize();
    }
    format!("{:x}", digest)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Reject passwords that are too short
pub fn validate_password(plain: &str) -> StoreResult<()> {
    if plain.chars().count() < MIN_PASSWORD_LEN {
        return Err(StoreError::validation(format!(
            "password must have at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Things a logged-in user may try to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ManageUsers,
    ManageEquipment,
    ViewAllEquipment,
    ManageInspections,
    GenerateReports,
    SendReminders,
    RawQuery,
}

impl Role {
    /// Static permission table; record-level ownership is checked separately
    pub fn can(&self, action: Action) -> bool {
        match self {
            Role::Admin => true,
            Role::Engenheiro => matches!(
                action,
                Action::ViewAllEquipment | Action::ManageInspections | Action::GenerateReports
            ),
            Role::Cliente => false,
        }
    }
}

impl User {
    /// Fail with a permission error unless the user's role allows `action`
    pub fn require(&self, action: Action) -> StoreResult<()> {
        if self.tipo_acesso.can(action) {
            Ok(())
        } else {
            Err(StoreError::Permission(format!(
                "{} users cannot perform {:?}",
                self.tipo_acesso, action
            )))
        }
    }

    /// Company scope for read queries: clients only see their own records
    pub fn company_scope(&self) -> Option<i64> {
        match self.tipo_acesso {
            Role::Cliente => Some(self.id),
            _ => None,
        }
    }
}

/// Persisted login session (`.nr13/session.yaml`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub user_id: i64,
    pub email: String,
    pub logged_in_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            logged_in_at: Utc::now(),
        }
    }

    pub fn path(nr13_dir: &Path) -> PathBuf {
        nr13_dir.join("session.yaml")
    }

    /// Load the session, `Ok(None)` when nobody is logged in
    pub fn load(nr13_dir: &Path) -> StoreResult<Option<Self>> {
        let path = Self::path(nr13_dir);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        serde_yml::from_str(&contents)
            .map(Some)
            .map_err(|e| StoreError::validation(format!("corrupt session file: {}", e)))
    }

    pub fn save(&self, nr13_dir: &Path) -> StoreResult<()> {
        let contents = serde_yml::to_string(self)
            .map_err(|e| StoreError::validation(format!("cannot encode session: {}", e)))?;
        std::fs::write(Self::path(nr13_dir), contents)?;
        Ok(())
    }

    /// Remove the session file; returns whether one existed
    pub fn clear(nr13_dir: &Path) -> StoreResult<bool> {
        let path = Self::path(nr13_dir);
        if path.exists() {
            std::fs::remove_file(path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("segredo123");
        assert!(hash.starts_with("sha256$10000$"));
        assert!(verify_password("segredo123", &hash));
        assert!(!verify_password("segredo124", &hash));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        assert_ne!(hash_password("abcdef"), hash_password("abcdef"));
    }

    #[test]
    fn test_verify_legacy_sha256() {
        // sha256("admin123")
        let legacy = "240be518fabd2724ddb6f04eeb1da5967448d7e831c08c8fa822809f74c720a9";
        assert!(verify_password("admin123", legacy));
        assert!(!verify_password("admin124", legacy));
        assert!(needs_rehash(legacy));
        assert!(!needs_rehash(&hash_password("admin123")));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "md5$1$aa$bb"));
        assert!(!verify_password("x", "sha256$many$aa$bb"));
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn test_role_permissions() {
        assert!(Role::Admin.can(Action::ManageUsers));
        assert!(Role::Engenheiro.can(Action::ManageInspections));
        assert!(!Role::Engenheiro.can(Action::ManageEquipment));
        assert!(!Role::Cliente.can(Action::ViewAllEquipment));
    }

    #[test]
    fn test_session_roundtrip() {
        let tmp = tempdir().unwrap();
        assert!(Session::load(tmp.path()).unwrap().is_none());

        let session = Session {
            user_id: 3,
            email: "eng@example.com".into(),
            logged_in_at: Utc::now(),
        };
        session.save(tmp.path()).unwrap();
        assert_eq!(Session::load(tmp.path()).unwrap(), Some(session));

        assert!(Session::clear(tmp.path()).unwrap());
        assert!(!Session::clear(tmp.path()).unwrap());
    }
}
