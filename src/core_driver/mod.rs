//! Storage driver contract.
//!
//! The protocol core never touches storage directly. Every file or directory
//! command is translated into a call on a [`Driver`], and the server obtains one
//! driver per session from a [`DriverFactory`]. Paths handed to a driver are always
//! absolute, normalised virtual paths (`/`, `/dir/file.txt`) with no `.` or `..`
//! components.

pub mod error;
pub mod filesystem;
pub mod memory;

pub use error::DriverError;
pub use filesystem::{FsDriver, FsDriverFactory};
pub use memory::{MemDriver, MemDriverFactory};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::Deserialize;
use tokio::io::AsyncRead;

pub const DEFAULT_OWNER: &str = "ftp";
pub const DEFAULT_GROUP: &str = "ftp";
pub const DEFAULT_FILE_MODE: u32 = 0o644;
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Byte stream returned by [`Driver::get_file`].
pub type FileStream = Box<dyn AsyncRead + Send + Unpin>;

/// Lazy, finite, non-restartable sequence of directory entries.
pub type DirStream = BoxStream<'static, Result<FileInfo, DriverError>>;

/// Backend-agnostic metadata for a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Base name only, never the full path.
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
    pub modified: DateTime<Utc>,
    pub owner: String,
    pub group: String,
    /// Permission bits (`0o755` style). Sentinel defaults when the backend has none.
    pub mode: u32,
}

impl FileInfo {
    pub fn file(name: impl Into<String>, size: u64, modified: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            size,
            is_dir: false,
            modified,
            owner: DEFAULT_OWNER.to_string(),
            group: DEFAULT_GROUP.to_string(),
            mode: DEFAULT_FILE_MODE,
        }
    }

    pub fn dir(name: impl Into<String>, modified: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            is_dir: true,
            modified,
            owner: DEFAULT_OWNER.to_string(),
            group: DEFAULT_GROUP.to_string(),
            mode: DEFAULT_DIR_MODE,
        }
    }

    pub fn with_owner(mut self, owner: &str, group: &str) -> Self {
        self.owner = owner.to_string();
        self.group = group.to_string();
        self
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }
}

/// What `RMD` does with a directory that still has children.
///
/// Fixed per backend. Removing `/` never deletes the root itself: under
/// `Recursive` it empties the root, under `EmptyOnly` it succeeds only when the
/// root is already empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemoveDirPolicy {
    Recursive,
    #[default]
    EmptyOnly,
}

#[async_trait]
pub trait Driver: Send + Sync {
    fn remove_dir_policy(&self) -> RemoveDirPolicy;

    /// Fails with `NotFound` or `NotDirectory` when `path` cannot become the working directory.
    async fn change_dir(&self, path: &str) -> Result<(), DriverError>;

    async fn stat(&self, path: &str) -> Result<FileInfo, DriverError>;

    /// Streams the entries of a directory. Large directories are never buffered
    /// by the caller; entries are pulled one at a time.
    async fn list_dir(&self, path: &str) -> Result<DirStream, DriverError>;

    async fn delete_dir(&self, path: &str) -> Result<(), DriverError>;

    async fn delete_file(&self, path: &str) -> Result<(), DriverError>;

    /// Fails with `AlreadyExists` when `to` is present; drivers never overwrite on rename.
    async fn rename(&self, from: &str, to: &str) -> Result<(), DriverError>;

    async fn make_dir(&self, path: &str) -> Result<(), DriverError>;

    /// Opens `path` for reading starting at byte `offset`.
    async fn get_file(&self, path: &str, offset: u64) -> Result<FileStream, DriverError>;

    /// Consumes `reader` to its end and commits the bytes to `path`, returning the
    /// number of bytes written. What remains on failure is documented per driver.
    async fn put_file(
        &self,
        path: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        append: bool,
    ) -> Result<u64, DriverError>;
}

/// Yields one fresh [`Driver`] per session.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn new_driver(&self) -> Result<Box<dyn Driver>, DriverError>;
}

/// Splits an absolute virtual path into its parent and base name.
///
/// `"/a/b.txt"` gives `("/a", "b.txt")`, `"/b.txt"` gives `("/", "b.txt")` and the
/// root gives `("/", "")`.
pub fn split_path(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => ("/", &trimmed[1..]),
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => ("/", trimmed),
    }
}
