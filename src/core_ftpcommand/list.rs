use crate::core_driver::DirStream;
use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::{CommandOutcome, Transfer};
use crate::core_ftpcommand::reply::Reply;
use crate::core_ftpcommand::utils::{resolve_path, strip_list_options};
use crate::session::Session;
use futures::stream::{self, StreamExt};
use log::debug;

/// Handles the LIST FTP command: `ls -l` style lines over the data connection.
pub async fn handle_list_command(
    session: &mut Session,
    arg: &str,
) -> Result<CommandOutcome, FtpError> {
    prepare_listing(session, arg, false).await
}

/// Handles the NLST FTP command: bare names, one per line.
pub async fn handle_nlst_command(
    session: &mut Session,
    arg: &str,
) -> Result<CommandOutcome, FtpError> {
    prepare_listing(session, arg, true).await
}

// The directory is opened before the 150 so a missing path is a plain 550.
// Naming a file lists just that file.
async fn prepare_listing(
    session: &mut Session,
    arg: &str,
    names_only: bool,
) -> Result<CommandOutcome, FtpError> {
    let path = resolve_path(&session.current_dir, strip_list_options(arg))?;
    let info = session.driver.stat(&path).await?;
    let entries: DirStream = if info.is_dir {
        session.driver.list_dir(&path).await?
    } else {
        stream::once(async move { Ok(info) }).boxed()
    };

    debug!("[session {}] Listing {}", session.id, path);
    Ok(CommandOutcome::transfer(
        Reply::new(150, "Opening ASCII mode data connection for file list."),
        Transfer::Listing {
            path,
            entries,
            names_only,
        },
    ))
}
