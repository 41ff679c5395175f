use crate::core_error::FtpError;
use crate::core_ftpcommand::cwd::change_directory;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::session::Session;

/// CDUP is CWD `..`; at `/` it is refused like any other climb above the root.
pub async fn handle_cdup_command(
    session: &mut Session,
    _arg: &str,
) -> Result<CommandOutcome, FtpError> {
    change_directory(session, "..").await
}
