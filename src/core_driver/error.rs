// Error handling for the storage driver module
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotDirectory(String),

    #[error("Is a directory: {0}")]
    IsDirectory(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Directory not empty: {0}")]
    NotEmpty(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// Maps a `std::io::Error` raised while touching `path` onto the driver taxonomy.
    pub fn from_io(err: std::io::Error, path: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => DriverError::NotFound(path.to_string()),
            std::io::ErrorKind::PermissionDenied => DriverError::PermissionDenied(path.to_string()),
            std::io::ErrorKind::AlreadyExists => DriverError::AlreadyExists(path.to_string()),
            _ => DriverError::Io(err),
        }
    }

    /// Reply code and text sent to the client when a command fails with this error.
    pub fn to_ftp_response(&self) -> (u16, &'static str) {
        match self {
            DriverError::NotFound(_) => (550, "No such file or directory."),
            DriverError::NotDirectory(_) => (550, "Not a directory."),
            DriverError::IsDirectory(_) => (550, "Is a directory."),
            DriverError::AlreadyExists(_) => (550, "File or directory already exists."),
            DriverError::NotEmpty(_) => (550, "Directory not empty."),
            DriverError::PermissionDenied(_) => (550, "Permission denied."),
            DriverError::InvalidPath(_) => (553, "Requested action not taken. File name not allowed."),
            DriverError::Backend(_) | DriverError::Io(_) => {
                (451, "Requested action aborted. Local error in processing.")
            }
        }
    }
}
