//! In-memory storage backend.
//!
//! Every driver produced by one [`MemDriverFactory`] shares the same tree, so
//! concurrent sessions see each other's files. Uploads are buffered and committed
//! only once the whole stream has been read: a failed `put_file` leaves the
//! previous content untouched.

use super::{
    split_path, DirStream, Driver, DriverError, DriverFactory, FileInfo, FileStream,
    RemoveDirPolicy, DEFAULT_GROUP, DEFAULT_OWNER,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Debug, Clone)]
enum MemNode {
    Dir { modified: DateTime<Utc> },
    File { data: Vec<u8>, modified: DateTime<Utc> },
}

/// Flat map of absolute path to node. `/` is always present.
#[derive(Debug)]
struct MemStore {
    nodes: RwLock<BTreeMap<String, MemNode>>,
}

impl MemStore {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), MemNode::Dir { modified: Utc::now() });
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, MemNode>>, DriverError> {
        self.nodes
            .read()
            .map_err(|_| DriverError::Backend("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, MemNode>>, DriverError> {
        self.nodes
            .write()
            .map_err(|_| DriverError::Backend("memory store lock poisoned".to_string()))
    }
}

fn child_prefix(dir: &str) -> String {
    if dir == "/" {
        "/".to_string()
    } else {
        format!("{}/", dir)
    }
}

fn is_direct_child(prefix: &str, key: &str) -> bool {
    key.len() > prefix.len() && key.starts_with(prefix) && !key[prefix.len()..].contains('/')
}

fn descendants(nodes: &BTreeMap<String, MemNode>, dir: &str) -> Vec<String> {
    let prefix = child_prefix(dir);
    nodes
        .keys()
        .filter(|key| key.len() > prefix.len() && key.starts_with(&prefix))
        .cloned()
        .collect()
}

fn check_absolute(path: &str) -> Result<(), DriverError> {
    if !path.starts_with('/') || path.split('/').any(|c| c == "." || c == "..") {
        return Err(DriverError::InvalidPath(path.to_string()));
    }
    Ok(())
}

fn require_parent_dir(nodes: &BTreeMap<String, MemNode>, path: &str) -> Result<(), DriverError> {
    let (parent, _) = split_path(path);
    match nodes.get(parent) {
        Some(MemNode::Dir { .. }) => Ok(()),
        Some(MemNode::File { .. }) => Err(DriverError::NotDirectory(parent.to_string())),
        None => Err(DriverError::NotFound(parent.to_string())),
    }
}

/// Factory handing out drivers over one shared in-memory tree.
#[derive(Debug, Clone)]
pub struct MemDriverFactory {
    store: Arc<MemStore>,
    policy: RemoveDirPolicy,
    owner: String,
    group: String,
}

impl MemDriverFactory {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemStore::new()),
            policy: RemoveDirPolicy::default(),
            owner: DEFAULT_OWNER.to_string(),
            group: DEFAULT_GROUP.to_string(),
        }
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

    pub fn driver(&self) -> MemDriver {
        MemDriver {
            store: Arc::clone(&self.store),
            policy: self.policy,
            owner: self.owner.clone(),
            group: self.group.clone(),
        }
    }
}

impl Default for MemDriverFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DriverFactory for MemDriverFactory {
    async fn new_driver(&self) -> Result<Box<dyn Driver>, DriverError> {
        Ok(Box::new(self.driver()))
    }
}

#[derive(Debug)]
pub struct MemDriver {
    store: Arc<MemStore>,
    policy: RemoveDirPolicy,
    owner: String,
    group: String,
}

impl MemDriver {
    fn info(&self, path: &str, node: &MemNode) -> FileInfo {
        let (_, name) = split_path(path);
        let name = if name.is_empty() { "/" } else { name };
        let info = match node {
            MemNode::Dir { modified } => FileInfo::dir(name, *modified),
            MemNode::File { data, modified } => FileInfo::file(name, data.len() as u64, *modified),
        };
        info.with_owner(&self.owner, &self.group)
    }
}

#[async_trait]
impl Driver for MemDriver {
    fn remove_dir_policy(&self) -> RemoveDirPolicy {
        self.policy
    }

    async fn change_dir(&self, path: &str) -> Result<(), DriverError> {
        check_absolute(path)?;
        match self.store.read()?.get(path) {
            Some(MemNode::Dir { .. }) => Ok(()),
            Some(MemNode::File { .. }) => Err(DriverError::NotDirectory(path.to_string())),
            None => Err(DriverError::NotFound(path.to_string())),
        }
    }

    async fn stat(&self, path: &str) -> Result<FileInfo, DriverError> {
        check_absolute(path)?;
        let nodes = self.store.read()?;
        let node = nodes
            .get(path)
            .ok_or_else(|| DriverError::NotFound(path.to_string()))?;
        Ok(self.info(path, node))
    }

    async fn list_dir(&self, path: &str) -> Result<DirStream, DriverError> {
        check_absolute(path)?;
        let nodes = self.store.read()?;
        match nodes.get(path) {
            Some(MemNode::Dir { .. }) => {}
            Some(MemNode::File { .. }) => return Err(DriverError::NotDirectory(path.to_string())),
            None => return Err(DriverError::NotFound(path.to_string())),
        }

        let prefix = child_prefix(path);
        let entries: Vec<Result<FileInfo, DriverError>> = nodes
            .iter()
            .filter(|(key, _)| is_direct_child(&prefix, key))
            .map(|(key, node)| Ok(self.info(key, node)))
            .collect();

        Ok(stream::iter(entries).boxed())
    }

    async fn delete_dir(&self, path: &str) -> Result<(), DriverError> {
        check_absolute(path)?;
        let mut nodes = self.store.write()?;
        match nodes.get(path) {
            Some(MemNode::Dir { .. }) => {}
            Some(MemNode::File { .. }) => return Err(DriverError::NotDirectory(path.to_string())),
            None => return Err(DriverError::NotFound(path.to_string())),
        }

        let children = descendants(&nodes, path);
        if !children.is_empty() && self.policy == RemoveDirPolicy::EmptyOnly {
            return Err(DriverError::NotEmpty(path.to_string()));
        }
        for child in children {
            nodes.remove(&child);
        }
        if path != "/" {
            nodes.remove(path);
        }
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<(), DriverError> {
        check_absolute(path)?;
        let mut nodes = self.store.write()?;
        match nodes.get(path) {
            Some(MemNode::File { .. }) => {
                nodes.remove(path);
                Ok(())
            }
            Some(MemNode::Dir { .. }) => Err(DriverError::IsDirectory(path.to_string())),
            None => Err(DriverError::NotFound(path.to_string())),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), DriverError> {
        check_absolute(from)?;
        check_absolute(to)?;
        if from == "/" || to == "/" || to.starts_with(&child_prefix(from)) {
            return Err(DriverError::InvalidPath(to.to_string()));
        }

        let mut nodes = self.store.write()?;
        if !nodes.contains_key(from) {
            return Err(DriverError::NotFound(from.to_string()));
        }
        if nodes.contains_key(to) {
            return Err(DriverError::AlreadyExists(to.to_string()));
        }
        require_parent_dir(&nodes, to)?;

        let moved = descendants(&nodes, from);
        if let Some(node) = nodes.remove(from) {
            nodes.insert(to.to_string(), node);
        }
        for old_key in moved {
            if let Some(node) = nodes.remove(&old_key) {
                let new_key = format!("{}{}", to, &old_key[from.len()..]);
                nodes.insert(new_key, node);
            }
        }
        Ok(())
    }

    async fn make_dir(&self, path: &str) -> Result<(), DriverError> {
        check_absolute(path)?;
        let mut nodes = self.store.write()?;
        if nodes.contains_key(path) {
            return Err(DriverError::AlreadyExists(path.to_string()));
        }
        require_parent_dir(&nodes, path)?;
        nodes.insert(path.to_string(), MemNode::Dir { modified: Utc::now() });
        Ok(())
    }

    async fn get_file(&self, path: &str, offset: u64) -> Result<FileStream, DriverError> {
        check_absolute(path)?;
        let nodes = self.store.read()?;
        match nodes.get(path) {
            Some(MemNode::File { data, .. }) => {
                let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
                Ok(Box::new(Cursor::new(data[start..].to_vec())))
            }
            Some(MemNode::Dir { .. }) => Err(DriverError::IsDirectory(path.to_string())),
            None => Err(DriverError::NotFound(path.to_string())),
        }
    }

    async fn put_file(
        &self,
        path: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        append: bool,
    ) -> Result<u64, DriverError> {
        check_absolute(path)?;
        {
            let nodes = self.store.read()?;
            if let Some(MemNode::Dir { .. }) = nodes.get(path) {
                return Err(DriverError::IsDirectory(path.to_string()));
            }
            require_parent_dir(&nodes, path)?;
        }

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        let written = buffer.len() as u64;

        let mut nodes = self.store.write()?;
        require_parent_dir(&nodes, path)?;
        let data = match nodes.remove(path) {
            Some(MemNode::File { mut data, .. }) if append => {
                data.extend_from_slice(&buffer);
                data
            }
            Some(dir @ MemNode::Dir { .. }) => {
                nodes.insert(path.to_string(), dir);
                return Err(DriverError::IsDirectory(path.to_string()));
            }
            _ => buffer,
        };
        nodes.insert(
            path.to_string(),
            MemNode::File {
                data,
                modified: Utc::now(),
            },
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    async fn put(driver: &MemDriver, path: &str, content: &[u8]) {
        let mut reader = content;
        driver.put_file(path, &mut reader, false).await.unwrap();
    }

    async fn read_all(driver: &MemDriver, path: &str, offset: u64) -> Vec<u8> {
        let mut stream = driver.get_file(path, offset).await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        buf
    }

    async fn names(driver: &MemDriver, path: &str) -> Vec<String> {
        let entries: Vec<FileInfo> = driver.list_dir(path).await.unwrap().try_collect().await.unwrap();
        entries.into_iter().map(|e| e.name).collect()
    }

    #[tokio::test]
    async fn test_put_get_and_resume() {
        let driver = MemDriverFactory::new().driver();
        put(&driver, "/a.txt", b"hello world").await;

        assert_eq!(read_all(&driver, "/a.txt", 0).await, b"hello world");
        assert_eq!(read_all(&driver, "/a.txt", 6).await, b"world");
        assert!(read_all(&driver, "/a.txt", 100).await.is_empty());

        let info = driver.stat("/a.txt").await.unwrap();
        assert_eq!(info.name, "a.txt");
        assert_eq!(info.size, 11);
    }

    #[tokio::test]
    async fn test_append() {
        let driver = MemDriverFactory::new().driver();
        put(&driver, "/log", b"one").await;
        let mut more: &[u8] = b"two";
        driver.put_file("/log", &mut more, true).await.unwrap();
        assert_eq!(read_all(&driver, "/log", 0).await, b"onetwo");
    }

    #[tokio::test]
    async fn test_list_only_direct_children() {
        let driver = MemDriverFactory::new().driver();
        driver.make_dir("/sub").await.unwrap();
        put(&driver, "/sub/inner.txt", b"x").await;
        put(&driver, "/top.txt", b"x").await;

        assert_eq!(names(&driver, "/").await, vec!["sub", "top.txt"]);
        assert_eq!(names(&driver, "/sub").await, vec!["inner.txt"]);
        assert!(matches!(
            driver.list_dir("/missing").await,
            Err(DriverError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_dir_policies() {
        let strict = MemDriverFactory::new().driver();
        strict.make_dir("/d").await.unwrap();
        put(&strict, "/d/f", b"x").await;
        assert!(matches!(strict.delete_dir("/d").await, Err(DriverError::NotEmpty(_))));

        let recursive = MemDriverFactory::new()
            .with_remove_dir_policy(RemoveDirPolicy::Recursive)
            .driver();
        recursive.make_dir("/d").await.unwrap();
        put(&recursive, "/d/f", b"x").await;
        put(&recursive, "/keep.txt", b"x").await;
        recursive.delete_dir("/d").await.unwrap();
        assert_eq!(names(&recursive, "/").await, vec!["keep.txt"]);

        recursive.delete_dir("/").await.unwrap();
        assert!(names(&recursive, "/").await.is_empty());
        recursive.change_dir("/").await.unwrap();
    }

    #[tokio::test]
    async fn test_rename_moves_subtree() {
        let driver = MemDriverFactory::new().driver();
        driver.make_dir("/old").await.unwrap();
        put(&driver, "/old/f.txt", b"abc").await;

        driver.rename("/old", "/new").await.unwrap();
        assert_eq!(read_all(&driver, "/new/f.txt", 0).await, b"abc");
        assert!(matches!(driver.stat("/old").await, Err(DriverError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rename_errors() {
        let driver = MemDriverFactory::new().driver();
        put(&driver, "/a", b"1").await;
        put(&driver, "/b", b"2").await;

        assert!(matches!(driver.rename("/missing", "/c").await, Err(DriverError::NotFound(_))));
        assert!(matches!(driver.rename("/a", "/b").await, Err(DriverError::AlreadyExists(_))));
        assert_eq!(read_all(&driver, "/b", 0).await, b"2");
    }

    #[tokio::test]
    async fn test_delete_missing_leaves_siblings() {
        let driver = MemDriverFactory::new().driver();
        put(&driver, "/sibling", b"x").await;
        assert!(matches!(driver.delete_file("/nope").await, Err(DriverError::NotFound(_))));
        assert_eq!(names(&driver, "/").await, vec!["sibling"]);
    }

    #[tokio::test]
    async fn test_put_requires_parent() {
        let driver = MemDriverFactory::new().driver();
        let mut reader: &[u8] = b"x";
        assert!(matches!(
            driver.put_file("/no/such/file", &mut reader, false).await,
            Err(DriverError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_drivers_share_store() {
        let factory = MemDriverFactory::new().with_owner("root", "root");
        let first = factory.new_driver().await.unwrap();
        let second = factory.new_driver().await.unwrap();
        let mut reader: &[u8] = b"shared";
        first.put_file("/s.txt", &mut reader, false).await.unwrap();

        let info = second.stat("/s.txt").await.unwrap();
        assert_eq!(info.size, 6);
        assert_eq!(info.owner, "root");
    }
}
