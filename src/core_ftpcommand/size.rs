use crate::core_driver::DriverError;
use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::reply::Reply;
use crate::core_ftpcommand::utils::resolve_path;
use crate::session::Session;

/// Handles the SIZE FTP command. Directories have no size and get a 550.
pub async fn handle_size_command(
    session: &mut Session,
    arg: &str,
) -> Result<CommandOutcome, FtpError> {
    if arg.is_empty() {
        return Err(FtpError::Syntax("SIZE requires a file name".to_string()));
    }

    let path = resolve_path(&session.current_dir, arg)?;
    let info = session.driver.stat(&path).await?;
    if info.is_dir {
        return Err(DriverError::IsDirectory(path).into());
    }
    Ok(CommandOutcome::reply(Reply::new(213, info.size.to_string())))
}
