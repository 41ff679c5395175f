use super::AuthError;
use async_trait::async_trait;

/// Checks the credentials presented with USER then PASS.
///
/// Called once per USER/PASS pair. Returning `Ok(false)` rejects the login; an
/// `Err` means the check itself could not be carried out. Lockout after repeated
/// failures, if any, is the implementation's business.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn check_password(&self, username: &str, password: &str) -> Result<bool, AuthError>;
}

/// A single fixed account.
#[derive(Debug, Clone)]
pub struct SimpleAuth {
    pub name: String,
    pub password: String,
}

impl SimpleAuth {
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl Authenticator for SimpleAuth {
    async fn check_password(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        Ok(username == self.name && password == self.password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simple_auth() {
        let auth = SimpleAuth::new("admin", "admin");
        assert!(auth.check_password("admin", "admin").await.unwrap());
        assert!(!auth.check_password("admin", "").await.unwrap());
        assert!(!auth.check_password("root", "admin").await.unwrap());
    }
}
