use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::reply::Reply;
use crate::core_network::port::{parse_port_argument, validate_active_target};
use crate::session::Session;

pub async fn handle_port_command(
    session: &mut Session,
    arg: &str,
) -> Result<CommandOutcome, FtpError> {
    let target = parse_port_argument(arg)?;
    validate_active_target(target, session.peer_addr.ip())?;
    session.data_channel.set_active(target);
    Ok(CommandOutcome::reply(Reply::new(
        200,
        "PORT command successful.",
    )))
}
