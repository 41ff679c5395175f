use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use ftp_engine::config::Config;
use ftp_engine::core_auth::passwd::hash_password;
use ftp_engine::core_cli::Cli;
use ftp_engine::server::Server;
use log::{error, info};
use std::io::Write;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    // Initialize the logger with a custom format
    let default_level = if args.verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(
                buf,
                "[{}] [{}] {}",
                timestamp,
                record.level(),
                record.args()
            )
        })
        .init();

    if let Some(password) = args.hash_password.as_deref() {
        println!("{}", hash_password(password).context("Failed to hash password")?);
        return Ok(());
    }

    // Load configuration from the TOML file
    let mut config = Config::load_from_file(&args.config)
        .with_context(|| format!("Failed to load configuration file: {}", args.config))?;

    // Override the listen port from CLI if provided
    if let Some(port) = args.port {
        config.server.listen_port = port;
    }

    let opts = config
        .into_server_opts()
        .context("Failed to prepare server from configuration")?;
    let server = Server::bind(opts)
        .await
        .context("Failed to bind control listener")?;
    info!("{} accepting connections on {}", env!("CARGO_PKG_NAME"), server.local_addr()?);

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => shutdown.shutdown(),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    server.run().await.context("Server stopped with an error")?;
    Ok(())
}
