use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::reply::Reply;
use crate::session::Session;
use log::info;

/// Handles the QUIT FTP command.
///
/// Sends 221 and asks the session loop to close the control connection.
pub async fn handle_quit_command(
    session: &mut Session,
    _arg: &str,
) -> Result<CommandOutcome, FtpError> {
    info!("[session {}] Received QUIT command. Closing connection.", session.id);
    session.data_channel.discard();
    Ok(CommandOutcome::close(Reply::new(
        221,
        "Service closing control connection.",
    )))
}
