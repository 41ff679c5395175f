use crate::core_auth::Operation;

#[derive(Eq, Hash, PartialEq, Debug, Clone, Copy)]
pub enum FtpCommand {
    USER,
    PASS,
    QUIT,
    PWD,
    CWD,
    CDUP,
    TYPE,
    PASV,
    PORT,
    LIST,
    NLST,
    RETR,
    STOR,
    STOU,
    APPE,
    DELE,
    RMD,
    MKD,
    RNFR,
    RNTO,
    NOOP,
    SYST,
    FEAT,
    SIZE,
    REST,
}

impl FtpCommand {
    pub fn from_str(cmd: &str) -> Option<FtpCommand> {
        match cmd.to_ascii_uppercase().as_str() {
            "USER" => Some(FtpCommand::USER),
            "PASS" => Some(FtpCommand::PASS),
            "QUIT" => Some(FtpCommand::QUIT),
            "PWD" | "XPWD" => Some(FtpCommand::PWD),
            "CWD" | "XCWD" => Some(FtpCommand::CWD),
            "CDUP" | "XCUP" => Some(FtpCommand::CDUP),
            "TYPE" => Some(FtpCommand::TYPE),
            "PASV" => Some(FtpCommand::PASV),
            "PORT" => Some(FtpCommand::PORT),
            "LIST" => Some(FtpCommand::LIST),
            "NLST" => Some(FtpCommand::NLST),
            "RETR" => Some(FtpCommand::RETR),
            "STOR" => Some(FtpCommand::STOR),
            "STOU" => Some(FtpCommand::STOU),
            "APPE" => Some(FtpCommand::APPE),
            "DELE" => Some(FtpCommand::DELE),
            "RMD" | "XRMD" => Some(FtpCommand::RMD),
            "MKD" | "XMKD" => Some(FtpCommand::MKD),
            "RNFR" => Some(FtpCommand::RNFR),
            "RNTO" => Some(FtpCommand::RNTO),
            "NOOP" => Some(FtpCommand::NOOP),
            "SYST" => Some(FtpCommand::SYST),
            "FEAT" => Some(FtpCommand::FEAT),
            "SIZE" => Some(FtpCommand::SIZE),
            "REST" => Some(FtpCommand::REST),
            _ => None,
        }
    }

    /// Commands accepted before login.
    pub fn requires_auth(&self) -> bool {
        !matches!(
            self,
            FtpCommand::USER
                | FtpCommand::PASS
                | FtpCommand::QUIT
                | FtpCommand::NOOP
                | FtpCommand::SYST
                | FtpCommand::FEAT
        )
    }

    /// Commands that consume the pending PASV/PORT connection.
    pub fn requires_data_connection(&self) -> bool {
        matches!(
            self,
            FtpCommand::LIST
                | FtpCommand::NLST
                | FtpCommand::RETR
                | FtpCommand::STOR
                | FtpCommand::STOU
                | FtpCommand::APPE
        )
    }

    /// The mutation checked against the authorizer, if any.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            FtpCommand::STOR | FtpCommand::STOU => Some(Operation::Store),
            FtpCommand::APPE => Some(Operation::Append),
            FtpCommand::DELE => Some(Operation::DeleteFile),
            FtpCommand::RMD => Some(Operation::RemoveDir),
            FtpCommand::MKD => Some(Operation::MakeDir),
            FtpCommand::RNFR | FtpCommand::RNTO => Some(Operation::Rename),
            _ => None,
        }
    }
}

/// Splits a control line into its verb and the raw argument. Spaces inside the
/// argument are kept so file names like `my file.txt` survive.
pub fn parse_command_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start();
    if line.is_empty() {
        return None;
    }
    match line.split_once(' ') {
        Some((verb, arg)) => Some((verb, arg.trim_end())),
        None => Some((line.trim_end(), "")),
    }
}
