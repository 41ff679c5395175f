// Error handling for command execution
use crate::core_auth::AuthError;
use crate::core_driver::DriverError;
use crate::core_ftpcommand::reply::Reply;
use crate::core_network::DataChannelError;
use thiserror::Error;

/// Everything a command can fail with. Each variant becomes exactly one reply
/// line; none of them closes the control connection.
#[derive(Error, Debug)]
pub enum FtpError {
    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Login incorrect for user {0}")]
    AuthenticationFailed(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Bad sequence of commands: {0}")]
    BadSequence(&'static str),

    #[error("Syntax error in arguments: {0}")]
    Syntax(String),

    #[error("Parameter not implemented: {0}")]
    ParameterNotImplemented(String),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    DataChannel(#[from] DataChannelError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl FtpError {
    pub fn to_ftp_response(&self) -> Reply {
        match self {
            FtpError::NotLoggedIn => Reply::new(530, "Not logged in."),
            FtpError::AuthenticationFailed(_) => Reply::new(530, "Login incorrect."),
            FtpError::PermissionDenied(_) => Reply::new(550, "Permission denied."),
            FtpError::BadSequence(message) => Reply::new(503, *message),
            FtpError::Syntax(_) => Reply::new(501, "Syntax error in parameters or arguments."),
            FtpError::ParameterNotImplemented(_) => {
                Reply::new(504, "Command not implemented for that parameter.")
            }
            FtpError::Driver(err) => {
                let (code, message) = err.to_ftp_response();
                Reply::new(code, message)
            }
            FtpError::DataChannel(err) => {
                let (code, message) = err.to_ftp_response();
                Reply::new(code, message)
            }
            FtpError::Auth(err) => {
                let (code, message) = err.to_ftp_response();
                Reply::new(code, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_codes() {
        assert_eq!(FtpError::NotLoggedIn.to_ftp_response().code, 530);
        assert_eq!(
            FtpError::from(DriverError::NotFound("/x".into())).to_ftp_response().code,
            550
        );
        assert_eq!(
            FtpError::from(DataChannelError::NotNegotiated).to_ftp_response().code,
            425
        );
        assert_eq!(
            FtpError::from(DataChannelError::Aborted).to_ftp_response().code,
            426
        );
        assert_eq!(FtpError::BadSequence("RNFR first.").to_ftp_response().code, 503);
    }
}
