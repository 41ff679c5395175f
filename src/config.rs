//! TOML configuration for the `ftp-engine` binary.
//!
//! Library users build [`ServerOpts`] directly; this module only turns a config
//! file into one.

use crate::constants::{
    DEFAULT_DATA_TIMEOUT_SECS, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_LISTEN_PORT,
    DEFAULT_SERVER_NAME, MAX_COMMAND_LENGTH,
};
use crate::core_auth::{
    AllowAll, AuthError, Authenticator, Authorizer, PasswdAuth, ReadOnly, SimpleAuth,
    UserPermissions,
};
use crate::core_driver::{
    DriverError, DriverFactory, FsDriverFactory, MemDriverFactory, RemoveDirPolicy,
    DEFAULT_GROUP, DEFAULT_OWNER,
};
use crate::core_network::transfer::DEFAULT_BUFFER_SIZE;
use crate::core_network::DataChannelConfig;
use crate::server::ServerOpts;
use crate::session::SessionConfig;
use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Storage(#[from] DriverError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub name: String,
    pub listen_address: IpAddr,
    pub listen_port: u16,
    /// Public address advertised in PASV replies (NAT setups).
    pub pasv_address: Option<Ipv4Addr>,
    /// Inclusive `[first, last]` passive port range.
    pub pasv_port_range: Option<[u16; 2]>,
    pub idle_timeout_secs: u64,
    pub data_timeout_secs: u64,
    pub max_command_length: usize,
    pub transfer_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_SERVER_NAME.to_string(),
            listen_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            listen_port: DEFAULT_LISTEN_PORT,
            pasv_address: None,
            pasv_port_range: None,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            data_timeout_secs: DEFAULT_DATA_TIMEOUT_SECS,
            max_command_length: MAX_COMMAND_LENGTH,
            transfer_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Filesystem,
    Memory,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub driver: StorageKind,
    /// Root directory served by the filesystem driver.
    pub root: PathBuf,
    pub remove_dir_policy: RemoveDirPolicy,
    pub owner: String,
    pub group: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            driver: StorageKind::Filesystem,
            root: PathBuf::from("/var/ftp"),
            remove_dir_policy: RemoveDirPolicy::default(),
            owner: DEFAULT_OWNER.to_string(),
            group: DEFAULT_GROUP.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AuthConfig {
    /// One fixed account.
    Simple { username: String, password: String },
    /// `user:bcrypt-hash` lines, see `ftp-engine --hash-password`.
    Passwd { file: PathBuf },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PermissionsConfig {
    /// Refuse every mutating command for every user.
    pub read_only: bool,
    /// Users refused mutating commands; everyone else may write.
    pub read_only_users: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub permissions: PermissionsConfig,
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&config_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(config_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(config_str)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let server = &self.server;
        if server.listen_port == 0 {
            return Err(ConfigError::Invalid("server.listen_port must not be 0".into()));
        }
        if let Some([first, last]) = server.pasv_port_range {
            if first == 0 || first > last {
                return Err(ConfigError::Invalid(format!(
                    "server.pasv_port_range [{}, {}] is not an ordered, non-zero range",
                    first, last
                )));
            }
        }
        if server.idle_timeout_secs == 0 || server.data_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least one second".into()));
        }
        if server.max_command_length < 16 {
            return Err(ConfigError::Invalid("server.max_command_length is too small".into()));
        }
        if server.transfer_buffer_size == 0 {
            return Err(ConfigError::Invalid("server.transfer_buffer_size must not be 0".into()));
        }
        if self.storage.driver == StorageKind::Filesystem
            && self.storage.root.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid("storage.root must not be empty".into()));
        }
        if let AuthConfig::Simple { username, .. } = &self.auth {
            if username.is_empty() {
                return Err(ConfigError::Invalid("auth.username must not be empty".into()));
            }
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        let server = &self.server;
        SessionConfig {
            server_name: server.name.clone(),
            idle_timeout: Duration::from_secs(server.idle_timeout_secs),
            max_command_length: server.max_command_length,
            transfer_buffer_size: server.transfer_buffer_size,
            data_channel: DataChannelConfig {
                pasv_address: server.pasv_address,
                pasv_ports: server.pasv_port_range.map(|[first, last]| first..=last),
                timeout: Duration::from_secs(server.data_timeout_secs),
            },
        }
    }

    /// Builds the driver factory, authenticator and authorizer described by the file.
    pub fn into_server_opts(self) -> Result<ServerOpts, ConfigError> {
        self.validate()?;
        let session = self.session_config();
        let listen_addr = SocketAddr::new(self.server.listen_address, self.server.listen_port);

        let storage = &self.storage;
        let factory: Arc<dyn DriverFactory> = match storage.driver {
            StorageKind::Filesystem => Arc::new(
                FsDriverFactory::new(&storage.root)?
                    .with_remove_dir_policy(storage.remove_dir_policy)
                    .with_owner(&storage.owner, &storage.group),
            ),
            StorageKind::Memory => Arc::new(
                MemDriverFactory::new()
                    .with_remove_dir_policy(storage.remove_dir_policy)
                    .with_owner(&storage.owner, &storage.group),
            ),
        };

        let authenticator: Arc<dyn Authenticator> = match self.auth {
            AuthConfig::Simple { username, password } => Arc::new(SimpleAuth::new(username, password)),
            AuthConfig::Passwd { file } => Arc::new(PasswdAuth::load(file)?),
        };

        let permissions = self.permissions;
        let authorizer: Arc<dyn Authorizer> = if permissions.read_only {
            Arc::new(ReadOnly)
        } else if !permissions.read_only_users.is_empty() {
            Arc::new(UserPermissions::new(permissions.read_only_users))
        } else {
            Arc::new(AllowAll)
        };

        Ok(ServerOpts::new(factory, authenticator)
            .with_listen_addr(listen_addr)
            .with_authorizer(authorizer)
            .with_session_config(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL: &str = r#"
[server]
name = "test-ftp"
listen_address = "127.0.0.1"
listen_port = 2221
pasv_address = "203.0.113.7"
pasv_port_range = [50000, 50010]
idle_timeout_secs = 60

[storage]
driver = "memory"
remove_dir_policy = "recursive"
owner = "alice"
group = "staff"

[auth]
method = "simple"
username = "admin"
password = "admin"

[permissions]
read_only_users = ["guest"]
"#;

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml(FULL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.server.name, "test-ftp");
        assert_eq!(config.server.listen_port, 2221);
        assert_eq!(config.server.pasv_address, Some(Ipv4Addr::new(203, 0, 113, 7)));
        assert_eq!(config.storage.driver, StorageKind::Memory);
        assert_eq!(config.storage.remove_dir_policy, RemoveDirPolicy::Recursive);
        assert_eq!(config.permissions.read_only_users, vec!["guest".to_string()]);

        let session = config.session_config();
        assert_eq!(session.idle_timeout, Duration::from_secs(60));
        assert_eq!(session.data_channel.pasv_ports, Some(50000..=50010));
        assert_eq!(session.max_command_length, MAX_COMMAND_LENGTH);
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("[auth]\nmethod = \"simple\"\nusername = \"u\"\npassword = \"p\"\n").unwrap();
        assert_eq!(config.server.listen_port, DEFAULT_LISTEN_PORT);
        assert_eq!(config.storage.driver, StorageKind::Filesystem);
        assert_eq!(config.storage.remove_dir_policy, RemoveDirPolicy::EmptyOnly);
        assert!(!config.permissions.read_only);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_auth_is_required() {
        assert!(matches!(
            Config::from_toml("[server]\nlisten_port = 21\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = Config::from_toml(FULL).unwrap();
        config.server.listen_port = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::from_toml(FULL).unwrap();
        config.server.pasv_port_range = Some([50010, 50000]);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::from_toml(FULL).unwrap();
        config.storage.driver = StorageKind::Filesystem;
        config.storage.root = PathBuf::new();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let text = format!("{}\n[extra]\nkey = 1\n", FULL);
        assert!(Config::from_toml(&text).is_err());
    }

    #[test]
    fn test_load_from_file_and_build() {
        let root = tempfile::tempdir().unwrap();
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "[server]\nlisten_address = \"127.0.0.1\"\nlisten_port = 2121\n\n[storage]\nroot = {:?}\n\n[auth]\nmethod = \"simple\"\nusername = \"admin\"\npassword = \"admin\"\n",
            root.path().display().to_string()
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        let opts = config.into_server_opts().unwrap();
        assert_eq!(opts.listen_addr, "127.0.0.1:2121".parse().unwrap());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::load_from_file("/nonexistent/ftp-engine.toml"),
            Err(ConfigError::Read { .. })
        ));
    }
}
