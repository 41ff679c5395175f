use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::reply::Reply;
use crate::core_ftpcommand::utils::resolve_path;
use crate::session::Session;
use log::info;

pub async fn handle_rnto_command(
    session: &mut Session,
    arg: &str,
) -> Result<CommandOutcome, FtpError> {
    let Some(from) = session.rename_from.take() else {
        return Err(FtpError::BadSequence("Bad sequence of commands, use RNFR first."));
    };
    if arg.is_empty() {
        return Err(FtpError::Syntax("RNTO requires a path".to_string()));
    }

    let to = resolve_path(&session.current_dir, arg)?;
    session.driver.rename(&from, &to).await?;

    info!("[session {}] Renamed {} to {}", session.id, from, to);
    Ok(CommandOutcome::reply(Reply::new(
        250,
        "Requested file action okay, completed.",
    )))
}
