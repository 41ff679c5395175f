//! Credential and permission contracts.
//!
//! An [`Authenticator`] checks a USER/PASS pair. An [`Authorizer`] decides whether
//! an authenticated user may run a mutating operation; read-only commands are never
//! sent to it.

pub mod authenticator;
pub mod authorizer;
pub mod error;
pub mod passwd;

pub use authenticator::{Authenticator, SimpleAuth};
pub use authorizer::{AllowAll, Authorizer, Operation, ReadOnly, UserPermissions};
pub use error::AuthError;
pub use passwd::{PasswdAuth, PasswdEntry};
