use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::reply::Reply;
use crate::session::{AuthState, Session};
use log::info;

/// Handles the USER FTP command.
///
/// Stages the username and asks for the password. A session that is already
/// logged in stays bound to its user; a second USER is a sequence error.
///
/// # Arguments
///
/// * `session` - The session issuing the command.
/// * `username` - The username provided by the client.
///
/// # Returns
///
/// The 331 outcome, or the error to report.
pub async fn handle_user_command(
    session: &mut Session,
    username: &str,
) -> Result<CommandOutcome, FtpError> {
    if session.is_authenticated() {
        return Err(FtpError::BadSequence("Already logged in."));
    }

    let username = username.trim();
    if username.is_empty() {
        return Err(FtpError::Syntax("USER requires a user name".to_string()));
    }

    info!("[session {}] USER {}", session.id, username);
    session.state = AuthState::Authenticating {
        username: username.to_string(),
    };

    Ok(CommandOutcome::reply(Reply::new(
        331,
        "User name okay, need password.",
    )))
}
