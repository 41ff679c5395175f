//! An embeddable FTP server engine.
//!
//! The crate speaks the RFC 959 control and data protocol and delegates every
//! storage operation to a pluggable [`core_driver::Driver`], every login to an
//! [`core_auth::Authenticator`] and every mutating command to an
//! [`core_auth::Authorizer`].
//!
//! ```no_run
//! use ftp_engine::core_auth::SimpleAuth;
//! use ftp_engine::core_driver::MemDriverFactory;
//! use ftp_engine::server::{Server, ServerOpts};
//! use std::sync::Arc;
//!
//! # async fn start() -> std::io::Result<()> {
//! let opts = ServerOpts::new(
//!     Arc::new(MemDriverFactory::new()),
//!     Arc::new(SimpleAuth::new("admin", "admin")),
//! )
//! .with_listen_addr("127.0.0.1:2121".parse().unwrap());
//! let server = Server::bind(opts).await?;
//! server.run().await
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod core_auth;
pub mod core_cli;
pub mod core_driver;
pub mod core_error;
pub mod core_ftpcommand;
pub mod core_network;
pub mod server;
pub mod session;

pub use server::{Server, ServerOpts, ShutdownHandle};
pub use session::SessionConfig;
