//! Local-filesystem storage backend.
//!
//! Virtual paths are mapped below a root directory. Reads canonicalise the
//! target and must stay inside the root. Writes follow a symlink only when it
//! resolves inside the root, while delete and rename act on the link itself.
//! `put_file` writes straight into the destination file: if the stream fails
//! midway the bytes received so far stay on disk.

use super::{
    split_path, DirStream, Driver, DriverError, DriverFactory, FileInfo, FileStream,
    RemoveDirPolicy, DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, DEFAULT_GROUP, DEFAULT_OWNER,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use log::{debug, warn};
use std::fs::Metadata;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncRead, AsyncSeekExt, AsyncWriteExt};

#[derive(Debug, Clone)]
pub struct FsDriverFactory {
    root: PathBuf,
    policy: RemoveDirPolicy,
    owner: String,
    group: String,
}

impl FsDriverFactory {
    /// Creates the root directory if needed and canonicalises it.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, DriverError> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(DriverError::Io)?;
        let root = root.canonicalize().map_err(DriverError::Io)?;
        debug!("Filesystem driver root: {:?}", root);
        Ok(Self {
            root,
            policy: RemoveDirPolicy::default(),
            owner: DEFAULT_OWNER.to_string(),
            group: DEFAULT_GROUP.to_string(),
        })
    }

    pub fn with_remove_dir_policy(mut self, policy: RemoveDirPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_owner(mut self, owner: &str, group: &str) -> Self {
        self.owner = owner.to_string();
        self.group = group.to_string();
        self
    }
}

#[async_trait]
impl DriverFactory for FsDriverFactory {
    async fn new_driver(&self) -> Result<Box<dyn Driver>, DriverError> {
        Ok(Box::new(FsDriver {
            root: self.root.clone(),
            policy: self.policy,
            owner: self.owner.clone(),
            group: self.group.clone(),
        }))
    }
}

#[derive(Debug)]
pub struct FsDriver {
    root: PathBuf,
    policy: RemoveDirPolicy,
    owner: String,
    group: String,
}

impl FsDriver {
    /// Maps a virtual path onto the local filesystem without touching the disk.
    fn local_path(&self, path: &str) -> Result<PathBuf, DriverError> {
        if !path.starts_with('/') || path.split('/').any(|c| c == "." || c == "..") {
            return Err(DriverError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(path.trim_start_matches('/')))
    }

    /// Resolves a path that must already exist and stay within the root.
    async fn existing_path(&self, path: &str) -> Result<PathBuf, DriverError> {
        let local = self.local_path(path)?;
        let resolved = fs::canonicalize(&local)
            .await
            .map_err(|e| DriverError::from_io(e, path))?;
        if !resolved.starts_with(&self.root) {
            warn!("Path is outside of the allowed area: {:?}", resolved);
            return Err(DriverError::PermissionDenied(path.to_string()));
        }
        Ok(resolved)
    }

    /// Resolves a path that may not exist yet; its parent must exist inside the root.
    async fn new_path(&self, path: &str) -> Result<PathBuf, DriverError> {
        let (parent, name) = split_path(path);
        if name.is_empty() {
            return Err(DriverError::InvalidPath(path.to_string()));
        }
        let parent_dir = self.existing_path(parent).await?;
        let meta = fs::metadata(&parent_dir)
            .await
            .map_err(|e| DriverError::from_io(e, parent))?;
        if !meta.is_dir() {
            return Err(DriverError::NotDirectory(parent.to_string()));
        }
        Ok(parent_dir.join(name))
    }

    /// Like [`FsDriver::new_path`] but the entry must exist. A symlink is returned
    /// as the link, not its target.
    async fn entry_path(&self, path: &str) -> Result<(PathBuf, Metadata), DriverError> {
        let local = self.new_path(path).await?;
        let meta = fs::symlink_metadata(&local)
            .await
            .map_err(|e| DriverError::from_io(e, path))?;
        Ok((local, meta))
    }

    /// Resolves the file an upload writes to. A symlink is followed only when
    /// its target stays inside the root.
    async fn write_target(&self, path: &str) -> Result<PathBuf, DriverError> {
        let target = self.new_path(path).await?;
        match fs::symlink_metadata(&target).await {
            Ok(meta) if meta.file_type().is_symlink() => {
                let resolved = fs::canonicalize(&target)
                    .await
                    .map_err(|_| DriverError::PermissionDenied(path.to_string()))?;
                if !resolved.starts_with(&self.root) {
                    warn!("Refusing to write through symlink {:?} to {:?}", target, resolved);
                    return Err(DriverError::PermissionDenied(path.to_string()));
                }
                Ok(resolved)
            }
            _ => Ok(target),
        }
    }

    fn info(&self, name: &str, meta: &Metadata) -> FileInfo {
        file_info(name, meta, &self.owner, &self.group)
    }
}

fn file_info(name: &str, meta: &Metadata, owner: &str, group: &str) -> FileInfo {
    let modified: DateTime<Utc> = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    let info = if meta.is_dir() {
        FileInfo::dir(name, modified).with_mode(mode_bits(meta, DEFAULT_DIR_MODE))
    } else {
        FileInfo::file(name, meta.len(), modified).with_mode(mode_bits(meta, DEFAULT_FILE_MODE))
    };
    info.with_owner(owner, group)
}

#[cfg(unix)]
fn mode_bits(meta: &Metadata, _default: u32) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn mode_bits(_meta: &Metadata, default: u32) -> u32 {
    default
}

#[async_trait]
impl Driver for FsDriver {
    fn remove_dir_policy(&self) -> RemoveDirPolicy {
        self.policy
    }

    async fn change_dir(&self, path: &str) -> Result<(), DriverError> {
        let local = self.existing_path(path).await?;
        let meta = fs::metadata(&local)
            .await
            .map_err(|e| DriverError::from_io(e, path))?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(DriverError::NotDirectory(path.to_string()))
        }
    }

    async fn stat(&self, path: &str) -> Result<FileInfo, DriverError> {
        let local = self.existing_path(path).await?;
        let meta = fs::metadata(&local)
            .await
            .map_err(|e| DriverError::from_io(e, path))?;
        let (_, name) = split_path(path);
        Ok(self.info(if name.is_empty() { "/" } else { name }, &meta))
    }

    async fn list_dir(&self, path: &str) -> Result<DirStream, DriverError> {
        let local = self.existing_path(path).await?;
        let meta = fs::metadata(&local)
            .await
            .map_err(|e| DriverError::from_io(e, path))?;
        if !meta.is_dir() {
            return Err(DriverError::NotDirectory(path.to_string()));
        }
        let entries = fs::read_dir(&local)
            .await
            .map_err(|e| DriverError::from_io(e, path))?;

        let owner = (self.owner.clone(), self.group.clone());
        let entries = stream::unfold((entries, owner), |(mut entries, owner)| async move {
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => return None,
                    Err(e) => return Some((Err(DriverError::Io(e)), (entries, owner))),
                };
                let name = entry.file_name().to_string_lossy().to_string();
                match entry.metadata().await {
                    Ok(meta) => {
                        let info = file_info(&name, &meta, &owner.0, &owner.1);
                        return Some((Ok(info), (entries, owner)));
                    }
                    // vanished between readdir and stat
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => return Some((Err(DriverError::Io(e)), (entries, owner))),
                }
            }
        });
        Ok(entries.boxed())
    }

    async fn delete_dir(&self, path: &str) -> Result<(), DriverError> {
        let local = self.existing_path(path).await?;
        let meta = fs::metadata(&local)
            .await
            .map_err(|e| DriverError::from_io(e, path))?;
        if !meta.is_dir() {
            return Err(DriverError::NotDirectory(path.to_string()));
        }

        let mut children = fs::read_dir(&local).await.map_err(DriverError::Io)?;
        let is_root = local == self.root;
        match self.policy {
            RemoveDirPolicy::EmptyOnly => {
                if children.next_entry().await.map_err(DriverError::Io)?.is_some() {
                    return Err(DriverError::NotEmpty(path.to_string()));
                }
                if !is_root {
                    fs::remove_dir(&local).await.map_err(|e| DriverError::from_io(e, path))?;
                }
            }
            RemoveDirPolicy::Recursive if is_root => {
                while let Some(child) = children.next_entry().await.map_err(DriverError::Io)? {
                    let child_path = child.path();
                    let result = if child.file_type().await.map_err(DriverError::Io)?.is_dir() {
                        fs::remove_dir_all(&child_path).await
                    } else {
                        fs::remove_file(&child_path).await
                    };
                    result.map_err(|e| DriverError::from_io(e, path))?;
                }
            }
            RemoveDirPolicy::Recursive => {
                fs::remove_dir_all(&local)
                    .await
                    .map_err(|e| DriverError::from_io(e, path))?;
            }
        }
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<(), DriverError> {
        if split_path(path).1.is_empty() {
            return Err(DriverError::IsDirectory(path.to_string()));
        }
        let (local, meta) = self.entry_path(path).await?;
        if meta.is_dir() {
            return Err(DriverError::IsDirectory(path.to_string()));
        }
        fs::remove_file(&local)
            .await
            .map_err(|e| DriverError::from_io(e, path))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), DriverError> {
        let (source, _) = self.entry_path(from).await?;
        let target = self.new_path(to).await?;
        if fs::symlink_metadata(&target).await.is_ok() {
            return Err(DriverError::AlreadyExists(to.to_string()));
        }
        if target.starts_with(&source) {
            return Err(DriverError::InvalidPath(to.to_string()));
        }
        fs::rename(&source, &target)
            .await
            .map_err(|e| DriverError::from_io(e, from))
    }

    async fn make_dir(&self, path: &str) -> Result<(), DriverError> {
        let target = self.new_path(path).await?;
        fs::create_dir(&target)
            .await
            .map_err(|e| DriverError::from_io(e, path))
    }

    async fn get_file(&self, path: &str, offset: u64) -> Result<FileStream, DriverError> {
        let local = self.existing_path(path).await?;
        let meta = fs::metadata(&local)
            .await
            .map_err(|e| DriverError::from_io(e, path))?;
        if meta.is_dir() {
            return Err(DriverError::IsDirectory(path.to_string()));
        }
        let mut file = fs::File::open(&local)
            .await
            .map_err(|e| DriverError::from_io(e, path))?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await.map_err(DriverError::Io)?;
        }
        Ok(Box::new(file))
    }

    async fn put_file(
        &self,
        path: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        append: bool,
    ) -> Result<u64, DriverError> {
        let target = self.write_target(path).await?;
        if let Ok(meta) = fs::metadata(&target).await {
            if meta.is_dir() {
                return Err(DriverError::IsDirectory(path.to_string()));
            }
        }

        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let mut file = options
            .open(&target)
            .await
            .map_err(|e| DriverError::from_io(e, path))?;

        let written = tokio::io::copy(reader, &mut file).await.map_err(DriverError::Io)?;
        file.flush().await.map_err(DriverError::Io)?;
        Ok(written)
    }
}
