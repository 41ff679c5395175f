use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::reply::Reply;
use crate::session::Session;

/// Handles the REST FTP command. The offset applies to the next RETR only and
/// is dropped by any other command.
pub async fn handle_rest_command(
    session: &mut Session,
    arg: &str,
) -> Result<CommandOutcome, FtpError> {
    let offset = arg
        .trim()
        .parse::<u64>()
        .map_err(|_| FtpError::Syntax(format!("invalid restart offset {:?}", arg)))?;
    session.restart_offset = offset;
    Ok(CommandOutcome::reply(Reply::new(
        350,
        format!("Restarting at {}. Send RETR to resume.", offset),
    )))
}
