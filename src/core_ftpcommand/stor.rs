use crate::core_driver::{split_path, DriverError};
use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::{CommandOutcome, Transfer};
use crate::core_ftpcommand::reply::Reply;
use crate::core_ftpcommand::utils::resolve_path;
use crate::session::Session;
use log::info;
use rand::distributions::Alphanumeric;
use rand::Rng;

const UNIQUE_NAME_ATTEMPTS: usize = 16;

/// Handles the STOR (Store File) FTP command.
///
/// Only the target path is checked here; the bytes are pulled from the data
/// connection by the driver once the session has opened it.
pub async fn handle_stor_command(
    session: &mut Session,
    arg: &str,
) -> Result<CommandOutcome, FtpError> {
    prepare_upload(session, arg, false).await
}

/// Handles the APPE FTP command (STOR that appends to an existing file).
pub async fn handle_appe_command(
    session: &mut Session,
    arg: &str,
) -> Result<CommandOutcome, FtpError> {
    prepare_upload(session, arg, true).await
}

/// Handles the STOU FTP command.
///
/// Stores under a freshly generated name in the working directory and reports
/// that name in the 150 reply.
pub async fn handle_stou_command(
    session: &mut Session,
    _arg: &str,
) -> Result<CommandOutcome, FtpError> {
    for _ in 0..UNIQUE_NAME_ATTEMPTS {
        let name: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();
        let path = resolve_path(&session.current_dir, &name)?;
        match session.driver.stat(&path).await {
            Err(DriverError::NotFound(_)) => {
                info!("[session {}] STOU stores as {}", session.id, path);
                return Ok(CommandOutcome::transfer(
                    Reply::new(150, format!("FILE: {}", name)),
                    Transfer::Store {
                        path,
                        append: false,
                    },
                ));
            }
            Ok(_) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(DriverError::AlreadyExists(session.current_dir.clone()).into())
}

async fn prepare_upload(
    session: &mut Session,
    arg: &str,
    append: bool,
) -> Result<CommandOutcome, FtpError> {
    if arg.is_empty() {
        return Err(FtpError::Syntax("a file name is required".to_string()));
    }

    let path = resolve_path(&session.current_dir, arg)?;
    if split_path(&path).1.is_empty() {
        return Err(DriverError::IsDirectory(path).into());
    }

    info!("[session {}] Receiving {} (append: {})", session.id, path, append);
    Ok(CommandOutcome::transfer(
        Reply::new(150, "Ok to send data."),
        Transfer::Store { path, append },
    ))
}
