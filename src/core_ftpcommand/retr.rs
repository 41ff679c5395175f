use crate::core_driver::DriverError;
use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::{CommandOutcome, Transfer};
use crate::core_ftpcommand::reply::Reply;
use crate::core_ftpcommand::utils::resolve_path;
use crate::session::Session;
use log::info;
use std::mem;

/// Handles the RETR (Retrieve) FTP command.
///
/// Opens the file through the driver, starting at any offset staged by REST,
/// and hands the stream to the session for sending. The offset is consumed
/// whether or not the file opens.
///
/// # Arguments
///
/// * `session` - The session issuing the command.
/// * `arg` - The name of the file to retrieve.
///
/// # Returns
///
/// A 150 outcome carrying the file stream, or the error to report.
pub async fn handle_retr_command(
    session: &mut Session,
    arg: &str,
) -> Result<CommandOutcome, FtpError> {
    let offset = mem::take(&mut session.restart_offset);
    if arg.is_empty() {
        return Err(FtpError::Syntax("RETR requires a file name".to_string()));
    }

    let path = resolve_path(&session.current_dir, arg)?;
    let info = session.driver.stat(&path).await?;
    if info.is_dir {
        return Err(DriverError::IsDirectory(path).into());
    }
    let file = session.driver.get_file(&path, offset).await?;

    info!(
        "[session {}] Sending {} ({} bytes, offset {})",
        session.id, path, info.size, offset
    );
    Ok(CommandOutcome::transfer(
        Reply::new(
            150,
            format!("Opening data connection for {} ({} bytes).", info.name, info.size),
        ),
        Transfer::Retrieve { path, file },
    ))
}
