use crate::core_driver::{DirStream, FileStream};
use crate::core_error::FtpError;
use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_ftpcommand::reply::Reply;
use crate::core_ftpcommand::{
    cdup, cwd, dele, feat, list, mkd, noop, pass, pasv, port, pwd, quit, rest, retr, rmd, rnfr,
    rnto, size, stor, syst, type_, user,
};
use crate::session::Session;

/// Data movement a command asks the session to perform after its preliminary reply.
pub enum Transfer {
    Listing {
        path: String,
        entries: DirStream,
        names_only: bool,
    },
    Retrieve {
        path: String,
        file: FileStream,
    },
    Store {
        path: String,
        append: bool,
    },
}

pub struct CommandOutcome {
    /// Final reply, or the 150 preliminary reply when `transfer` is set.
    pub reply: Reply,
    pub transfer: Option<Transfer>,
    pub close: bool,
}

impl CommandOutcome {
    pub fn reply(reply: Reply) -> Self {
        Self {
            reply,
            transfer: None,
            close: false,
        }
    }

    pub fn transfer(reply: Reply, transfer: Transfer) -> Self {
        Self {
            reply,
            transfer: Some(transfer),
            close: false,
        }
    }

    pub fn close(reply: Reply) -> Self {
        Self {
            reply,
            transfer: None,
            close: true,
        }
    }
}

pub async fn dispatch_command(
    command: FtpCommand,
    session: &mut Session,
    arg: &str,
) -> Result<CommandOutcome, FtpError> {
    match command {
        FtpCommand::USER => user::handle_user_command(session, arg).await,
        FtpCommand::PASS => pass::handle_pass_command(session, arg).await,
        FtpCommand::QUIT => quit::handle_quit_command(session, arg).await,
        FtpCommand::PWD => pwd::handle_pwd_command(session, arg).await,
        FtpCommand::CWD => cwd::handle_cwd_command(session, arg).await,
        FtpCommand::CDUP => cdup::handle_cdup_command(session, arg).await,
        FtpCommand::TYPE => type_::handle_type_command(session, arg).await,
        FtpCommand::PASV => pasv::handle_pasv_command(session, arg).await,
        FtpCommand::PORT => port::handle_port_command(session, arg).await,
        FtpCommand::LIST => list::handle_list_command(session, arg).await,
        FtpCommand::NLST => list::handle_nlst_command(session, arg).await,
        FtpCommand::RETR => retr::handle_retr_command(session, arg).await,
        FtpCommand::STOR => stor::handle_stor_command(session, arg).await,
        FtpCommand::STOU => stor::handle_stou_command(session, arg).await,
        FtpCommand::APPE => stor::handle_appe_command(session, arg).await,
        FtpCommand::DELE => dele::handle_dele_command(session, arg).await,
        FtpCommand::RMD => rmd::handle_rmd_command(session, arg).await,
        FtpCommand::MKD => mkd::handle_mkd_command(session, arg).await,
        FtpCommand::RNFR => rnfr::handle_rnfr_command(session, arg).await,
        FtpCommand::RNTO => rnto::handle_rnto_command(session, arg).await,
        FtpCommand::NOOP => noop::handle_noop_command(session, arg).await,
        FtpCommand::SYST => syst::handle_syst_command(session, arg).await,
        FtpCommand::FEAT => feat::handle_feat_command(session, arg).await,
        FtpCommand::SIZE => size::handle_size_command(session, arg).await,
        FtpCommand::REST => rest::handle_rest_command(session, arg).await,
    }
}
