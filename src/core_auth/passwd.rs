use super::{AuthError, Authenticator};
use async_trait::async_trait;
use bcrypt::{hash, verify, DEFAULT_COST};
use log::{debug, info};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PasswdEntry {
    username: String,
    hashed_password: String,
}

impl PasswdEntry {
    /// Parses a `username:bcrypt-hash` line.
    pub fn from_line(line: &str) -> Option<Self> {
        let (username, hashed_password) = line.split_once(':')?;
        if username.is_empty() || hashed_password.is_empty() || hashed_password.contains(':') {
            return None;
        }
        Some(PasswdEntry {
            username: username.to_string(),
            hashed_password: hashed_password.to_string(),
        })
    }

    pub fn get_hashed_password(&self) -> &str {
        &self.hashed_password
    }

    pub fn get_username(&self) -> &str {
        &self.username
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    Ok(hash(password, DEFAULT_COST)?)
}

pub fn verify_password(password: &str, hashed_password: &str) -> bool {
    verify(password, hashed_password).unwrap_or(false)
}

/// Authenticator backed by a bcrypt passwd file.
///
/// Blank lines and lines starting with `#` are skipped.
#[derive(Debug, Clone, Default)]
pub struct PasswdAuth {
    entries: HashMap<String, PasswdEntry>,
}

impl PasswdAuth {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| AuthError::PasswdRead {
            path: path.display().to_string(),
            source,
        })?;
        let auth = Self::parse(&content)?;
        info!("Loaded {} accounts from {}", auth.entries.len(), path.display());
        Ok(auth)
    }

    pub fn parse(content: &str) -> Result<Self, AuthError> {
        let mut entries = HashMap::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let entry = PasswdEntry::from_line(line).ok_or(AuthError::MalformedEntry(index + 1))?;
            entries.insert(entry.get_username().to_string(), entry);
        }
        Ok(Self { entries })
    }
}

#[async_trait]
impl Authenticator for PasswdAuth {
    async fn check_password(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        let Some(entry) = self.entries.get(username) else {
            debug!("Unknown user {}", username);
            return Ok(false);
        };
        let hashed = entry.get_hashed_password().to_string();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || verify_password(&password, &hashed))
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_line() {
        let entry = PasswdEntry::from_line("alice:$2b$04$abc").unwrap();
        assert_eq!(entry.get_username(), "alice");
        assert_eq!(entry.get_hashed_password(), "$2b$04$abc");
        assert!(PasswdEntry::from_line("nocolon").is_none());
        assert!(PasswdEntry::from_line(":hash").is_none());
    }

    #[test]
    fn test_parse_reports_line() {
        let err = PasswdAuth::parse("# comment\n\nbroken\n").unwrap_err();
        assert!(matches!(err, AuthError::MalformedEntry(3)));
    }

    #[tokio::test]
    async fn test_check_password() {
        let hashed = bcrypt::hash("secret", 4).unwrap();
        let auth = PasswdAuth::parse(&format!("alice:{}\n", hashed)).unwrap();
        assert!(auth.check_password("alice", "secret").await.unwrap());
        assert!(!auth.check_password("alice", "wrong").await.unwrap());
        assert!(!auth.check_password("bob", "secret").await.unwrap());
    }
}
