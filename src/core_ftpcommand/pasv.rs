use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::reply::Reply;
use crate::core_network::pasv::format_pasv_reply;
use crate::session::Session;

/// Handles the PASV FTP command.
///
/// Opens a fresh listener owned by this session (dropping any stale pending
/// connection) and advertises it in the 227 reply.
pub async fn handle_pasv_command(
    session: &mut Session,
    _arg: &str,
) -> Result<CommandOutcome, FtpError> {
    let local_ip = session.local_addr.ip();
    let advertised = session.data_channel.open_passive(local_ip).await?;
    Ok(CommandOutcome::reply(Reply::new(
        227,
        format_pasv_reply(advertised),
    )))
}
