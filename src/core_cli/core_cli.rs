use clap::Parser;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "ftp-engine", about = "An embeddable FTP server engine.")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "/etc/ftp-engine.toml")]
    pub config: String,

    /// Listen port, overriding the configuration file
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Enable verbose mode
    #[arg(short, long)]
    pub verbose: bool,

    /// Print a bcrypt hash for a passwd file entry and exit
    #[arg(long, value_name = "PASSWORD")]
    pub hash_password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["ftp-engine"]);
        assert_eq!(cli.config, "/etc/ftp-engine.toml");
        assert_eq!(cli.port, None);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from(["ftp-engine", "-c", "ftp.toml", "--port", "2200", "-v"]);
        assert_eq!(cli.config, "ftp.toml");
        assert_eq!(cli.port, Some(2200));
        assert!(cli.verbose);
    }
}
