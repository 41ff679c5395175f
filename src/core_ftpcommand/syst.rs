use crate::constants::SYSTEM_TYPE;
use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::reply::Reply;
use crate::session::Session;

pub async fn handle_syst_command(
    _session: &mut Session,
    _arg: &str,
) -> Result<CommandOutcome, FtpError> {
    Ok(CommandOutcome::reply(Reply::new(215, SYSTEM_TYPE)))
}
