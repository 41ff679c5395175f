
pub const DEFAULT_LISTEN_PORT: u16 = 2121;
pub const DEFAULT_SERVER_NAME: &str = "ftp-engine";
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_DATA_TIMEOUT_SECS: u64 = 30;
pub const MAX_COMMAND_LENGTH: usize = 4096;
pub const SYSTEM_TYPE: &str = "UNIX Type: L8";
pub const FEATURES: &[&str] = &["SIZE", "REST STREAM"];
