use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::reply::Reply;
use crate::core_ftpcommand::utils::{quote_path, resolve_path};
use crate::session::Session;
use log::info;

pub async fn handle_mkd_command(
    session: &mut Session,
    arg: &str,
) -> Result<CommandOutcome, FtpError> {
    if arg.is_empty() {
        return Err(FtpError::Syntax("MKD requires a directory".to_string()));
    }

    let path = resolve_path(&session.current_dir, arg)?;
    session.driver.make_dir(&path).await?;

    info!("[session {}] Created directory {}", session.id, path);
    Ok(CommandOutcome::reply(Reply::new(
        257,
        format!("{} directory created.", quote_path(&path)),
    )))
}
