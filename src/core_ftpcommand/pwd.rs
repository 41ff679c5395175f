use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::reply::Reply;
use crate::core_ftpcommand::utils::quote_path;
use crate::session::Session;

pub async fn handle_pwd_command(
    session: &mut Session,
    _arg: &str,
) -> Result<CommandOutcome, FtpError> {
    Ok(CommandOutcome::reply(Reply::new(
        257,
        format!("{} is the current directory.", quote_path(&session.current_dir)),
    )))
}
