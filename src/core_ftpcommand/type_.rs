use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::reply::Reply;
use crate::session::{Session, TransferType};

/// Handles the TYPE FTP command.
///
/// Accepts ASCII (`A`, optionally `A N`), image (`I`) and local byte size 8
/// (`L 8`). Bytes are moved unchanged in every type. EBCDIC and other byte
/// sizes are refused with 504.
///
/// # Arguments
///
/// * `session` - The session whose transfer type is changed.
/// * `arg` - The argument specifying the transfer type.
pub async fn handle_type_command(
    session: &mut Session,
    arg: &str,
) -> Result<CommandOutcome, FtpError> {
    let parts: Vec<String> = arg
        .split_whitespace()
        .map(|s| s.to_ascii_uppercase())
        .collect();
    let parts: Vec<&str> = parts.iter().map(String::as_str).collect();

    let (transfer_type, label) = match parts.as_slice() {
        ["A"] | ["A", "N"] => (TransferType::Ascii, "A"),
        ["I"] => (TransferType::Binary, "I"),
        ["L", "8"] => (TransferType::Binary, "L 8"),
        [] => return Err(FtpError::Syntax("TYPE requires an argument".to_string())),
        _ => return Err(FtpError::ParameterNotImplemented(arg.to_string())),
    };

    session.transfer_type = transfer_type;
    Ok(CommandOutcome::reply(Reply::new(
        200,
        format!("Type set to {}", label),
    )))
}
