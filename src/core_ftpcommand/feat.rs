use crate::constants::FEATURES;
use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::reply::Reply;
use crate::session::Session;

/// Handles the FEAT FTP command with the multi-line 211 feature list.
pub async fn handle_feat_command(
    _session: &mut Session,
    _arg: &str,
) -> Result<CommandOutcome, FtpError> {
    let mut lines = vec!["Features:".to_string()];
    lines.extend(FEATURES.iter().map(|feature| feature.to_string()));
    lines.push("End".to_string());
    Ok(CommandOutcome::reply(Reply::multiline(211, lines)))
}
