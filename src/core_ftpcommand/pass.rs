use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::reply::Reply;
use crate::session::{AuthState, Session};
use log::{error, info, warn};
use std::mem;

/// Handles the PASS FTP command.
///
/// Checks the staged USER name and this password with the authenticator. Either
/// way the staged name is consumed: a failed attempt returns the session to the
/// unauthenticated state so the client can start over with USER.
pub async fn handle_pass_command(
    session: &mut Session,
    password: &str,
) -> Result<CommandOutcome, FtpError> {
    let username = match mem::replace(&mut session.state, AuthState::Unauthenticated) {
        AuthState::Authenticating { username } => username,
        state @ AuthState::Authenticated { .. } => {
            session.state = state;
            return Err(FtpError::BadSequence("Already logged in."));
        }
        AuthState::Unauthenticated => return Err(FtpError::BadSequence("Login with USER first.")),
    };

    match session.authenticator.check_password(&username, password).await {
        Ok(true) => {
            info!("[session {}] User {} logged in", session.id, username);
            session.state = AuthState::Authenticated { username };
            Ok(CommandOutcome::reply(Reply::new(
                230,
                "User logged in, proceed.",
            )))
        }
        Ok(false) => {
            warn!("[session {}] Login incorrect for {}", session.id, username);
            Err(FtpError::AuthenticationFailed(username))
        }
        Err(e) => {
            error!("[session {}] Authenticator failed for {}: {}", session.id, username, e);
            Err(e.into())
        }
    }
}
