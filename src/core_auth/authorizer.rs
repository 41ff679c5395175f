use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;

/// Mutating operations subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Store,
    Append,
    DeleteFile,
    RemoveDir,
    MakeDir,
    Rename,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Store => "store",
            Operation::Append => "append",
            Operation::DeleteFile => "delete",
            Operation::RemoveDir => "rmdir",
            Operation::MakeDir => "mkdir",
            Operation::Rename => "rename",
        };
        f.write_str(name)
    }
}

/// Grants or denies a mutating operation to an authenticated user.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn allowed(&self, username: &str, operation: Operation) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn allowed(&self, _username: &str, _operation: Operation) -> bool {
        true
    }
}

/// Denies every mutating operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnly;

#[async_trait]
impl Authorizer for ReadOnly {
    async fn allowed(&self, _username: &str, _operation: Operation) -> bool {
        false
    }
}

/// Allows everything except for the listed read-only users.
#[derive(Debug, Clone, Default)]
pub struct UserPermissions {
    read_only_users: HashSet<String>,
}

impl UserPermissions {
    pub fn new<I, S>(read_only_users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            read_only_users: read_only_users.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Authorizer for UserPermissions {
    async fn allowed(&self, username: &str, _operation: Operation) -> bool {
        !self.read_only_users.contains(username)
    }
}
