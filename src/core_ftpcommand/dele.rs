use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::reply::Reply;
use crate::core_ftpcommand::utils::resolve_path;
use crate::session::Session;
use log::info;

/// Handles the DELE FTP command.
///
/// Deletes exactly one file. A missing file is a 550 and nothing else in the
/// directory is touched.
pub async fn handle_dele_command(
    session: &mut Session,
    arg: &str,
) -> Result<CommandOutcome, FtpError> {
    if arg.is_empty() {
        return Err(FtpError::Syntax("DELE requires a file name".to_string()));
    }

    let path = resolve_path(&session.current_dir, arg)?;
    session.driver.delete_file(&path).await?;

    info!("[session {}] Deleted {}", session.id, path);
    Ok(CommandOutcome::reply(Reply::new(250, "File deleted.")))
}
