use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::reply::Reply;
use crate::core_ftpcommand::utils::resolve_path;
use crate::session::Session;
use log::info;

/// Handles the RMD FTP command.
///
/// Whether a non-empty directory is removed depends on the driver's
/// `RemoveDirPolicy`. `RMD /` never removes the root itself.
pub async fn handle_rmd_command(
    session: &mut Session,
    arg: &str,
) -> Result<CommandOutcome, FtpError> {
    if arg.is_empty() {
        return Err(FtpError::Syntax("RMD requires a directory".to_string()));
    }

    let path = resolve_path(&session.current_dir, arg)?;
    session.driver.delete_dir(&path).await?;

    info!(
        "[session {}] Removed directory {} ({:?})",
        session.id,
        path,
        session.driver.remove_dir_policy()
    );
    Ok(CommandOutcome::reply(Reply::new(250, "Directory removed.")))
}
