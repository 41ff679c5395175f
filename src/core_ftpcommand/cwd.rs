use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::reply::Reply;
use crate::core_ftpcommand::utils::resolve_path;
use crate::session::Session;
use log::debug;

pub async fn handle_cwd_command(
    session: &mut Session,
    arg: &str,
) -> Result<CommandOutcome, FtpError> {
    if arg.is_empty() {
        return Err(FtpError::Syntax("CWD requires a directory".to_string()));
    }
    change_directory(session, arg).await
}

/// Validates the target with the driver before moving the working directory.
pub(crate) async fn change_directory(
    session: &mut Session,
    arg: &str,
) -> Result<CommandOutcome, FtpError> {
    let new_dir = resolve_path(&session.current_dir, arg)?;
    session.driver.change_dir(&new_dir).await?;

    debug!("[session {}] Directory changed to {}", session.id, new_dir);
    session.current_dir = new_dir;
    Ok(CommandOutcome::reply(Reply::new(
        250,
        "Directory successfully changed.",
    )))
}
