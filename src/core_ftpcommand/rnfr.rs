use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::reply::Reply;
use crate::core_ftpcommand::utils::resolve_path;
use crate::session::Session;

/// Handles the RNFR FTP command.
///
/// The source must exist; it is staged until the very next command, which has
/// to be RNTO.
pub async fn handle_rnfr_command(
    session: &mut Session,
    arg: &str,
) -> Result<CommandOutcome, FtpError> {
    if arg.is_empty() {
        return Err(FtpError::Syntax("RNFR requires a path".to_string()));
    }

    let path = resolve_path(&session.current_dir, arg)?;
    session.driver.stat(&path).await?;
    session.rename_from = Some(path);

    Ok(CommandOutcome::reply(Reply::new(
        350,
        "Requested file action pending further information.",
    )))
}
