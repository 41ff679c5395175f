// Error handling for the authentication module
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Failed to read passwd file {path}: {source}")]
    PasswdRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed passwd entry at line {0}")]
    MalformedEntry(usize),

    #[error("Password hash error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Authentication backend unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    pub fn to_ftp_response(&self) -> (u16, &'static str) {
        match self {
            AuthError::Unavailable(_) => (451, "Requested action aborted. Local error in processing."),
            _ => (530, "Login incorrect."),
        }
    }
}
