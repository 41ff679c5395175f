//! Per-connection session state and the control-connection loop.
//!
//! A session reads one command line at a time, runs it to completion (including
//! any data transfer) and writes exactly one final reply before reading the next
//! line. Nothing here is shared with other sessions except the storage behind
//! the driver.

use crate::constants::{DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_SERVER_NAME, MAX_COMMAND_LENGTH};
use crate::core_auth::{Authenticator, Authorizer};
use crate::core_driver::{DirStream, Driver};
use crate::core_error::FtpError;
use crate::core_ftpcommand::ftpcommand::{parse_command_line, FtpCommand};
use crate::core_ftpcommand::handlers::{dispatch_command, CommandOutcome, Transfer};
use crate::core_ftpcommand::reply::Reply;
use crate::core_ftpcommand::utils::format_list_line;
use crate::core_network::transfer::{send_stream, AbortableReader, DEFAULT_BUFFER_SIZE};
use crate::core_network::{DataChannel, DataChannelConfig, DataChannelError, PendingDataConnection};
use chrono::Utc;
use futures::StreamExt;
use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
    BufWriter,
};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Announced in the 220 greeting.
    pub server_name: String,
    pub idle_timeout: Duration,
    /// Longest accepted command line, CRLF included.
    pub max_command_length: usize,
    pub transfer_buffer_size: usize,
    pub data_channel: DataChannelConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_name: DEFAULT_SERVER_NAME.to_string(),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            max_command_length: MAX_COMMAND_LENGTH,
            transfer_buffer_size: DEFAULT_BUFFER_SIZE,
            data_channel: DataChannelConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    /// USER accepted, waiting for PASS.
    Authenticating { username: String },
    Authenticated { username: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Ascii,
    Binary,
}

pub struct Session {
    pub id: u64,
    pub peer_addr: SocketAddr,
    pub local_addr: SocketAddr,
    pub state: AuthState,
    pub current_dir: String,
    pub transfer_type: TransferType,
    pub rename_from: Option<String>,
    pub restart_offset: u64,
    pub data_channel: DataChannel,
    pub driver: Box<dyn Driver>,
    pub authenticator: Arc<dyn Authenticator>,
    pub authorizer: Arc<dyn Authorizer>,
    pub config: Arc<SessionConfig>,
    abort: CancellationToken,
}

/// Outcome of reading one control line.
#[derive(Debug, PartialEq, Eq)]
pub enum LineRead {
    Line(String),
    TooLong,
    Closed,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        peer_addr: SocketAddr,
        local_addr: SocketAddr,
        driver: Box<dyn Driver>,
        authenticator: Arc<dyn Authenticator>,
        authorizer: Arc<dyn Authorizer>,
        config: Arc<SessionConfig>,
        abort: CancellationToken,
    ) -> Self {
        Self {
            id,
            peer_addr,
            local_addr,
            state: AuthState::Unauthenticated,
            current_dir: String::from("/"),
            transfer_type: TransferType::Ascii,
            rename_from: None,
            restart_offset: 0,
            data_channel: DataChannel::new(config.data_channel.clone()),
            driver,
            authenticator,
            authorizer,
            config,
            abort,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match &self.state {
            AuthState::Authenticated { username } => Some(username),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthState::Authenticated { .. })
    }

    /// Drives the control connection until QUIT, client hangup, idle timeout or
    /// server shutdown. Only control-socket I/O errors are returned.
    pub async fn serve<S>(mut self, stream: S) -> io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let (read_half, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);

        let greeting = Reply::new(220, format!("{} ready.", self.config.server_name));
        write_reply(&mut writer, &greeting).await?;

        loop {
            let read = tokio::select! {
                biased;
                _ = self.abort.cancelled() => {
                    info!("[session {}] Closing for server shutdown", self.id);
                    let _ = write_reply(&mut writer, &Reply::new(421, "Server shutting down.")).await;
                    break;
                }
                read = timeout(
                    self.config.idle_timeout,
                    read_command_line(&mut reader, self.config.max_command_length),
                ) => read,
            };

            let line = match read {
                Err(_) => {
                    info!("[session {}] Idle timeout", self.id);
                    let _ = write_reply(
                        &mut writer,
                        &Reply::new(421, "Timeout, closing control connection."),
                    )
                    .await;
                    break;
                }
                Ok(Err(e)) => {
                    error!("[session {}] Control connection error: {}", self.id, e);
                    return Err(e);
                }
                Ok(Ok(LineRead::Closed)) => {
                    info!("[session {}] Client closed the control connection", self.id);
                    break;
                }
                Ok(Ok(LineRead::TooLong)) => {
                    warn!("[session {}] Command line too long", self.id);
                    write_reply(&mut writer, &Reply::new(500, "Command line too long.")).await?;
                    continue;
                }
                Ok(Ok(LineRead::Line(line))) => line,
            };

            if self.handle_line(&line, &mut reader, &mut writer).await? {
                break;
            }
        }

        self.data_channel.discard();
        Ok(())
    }

    /// Runs one command line. Returns true when the session must close.
    async fn handle_line<R, W>(&mut self, line: &str, reader: &mut R, writer: &mut W) -> io::Result<bool>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let Some((verb, arg)) = parse_command_line(line) else {
            write_reply(writer, &Reply::new(500, "Syntax error, command unrecognized.")).await?;
            return Ok(false);
        };

        if verb.eq_ignore_ascii_case("PASS") {
            debug!("[session {}] <- PASS ****", self.id);
        } else {
            debug!("[session {}] <- {}", self.id, line);
        }

        let Some(command) = FtpCommand::from_str(verb) else {
            self.rename_from = None;
            self.restart_offset = 0;
            warn!("[session {}] Unknown command {}", self.id, verb);
            write_reply(writer, &Reply::new(502, "Command not implemented.")).await?;
            return Ok(false);
        };

        let (outcome, pending) = match self.execute(command, arg).await {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!("[session {}] {:?} failed: {}", self.id, command, e);
                write_reply(writer, &e.to_ftp_response()).await?;
                return Ok(false);
            }
        };

        write_reply(writer, &outcome.reply).await?;

        if let (Some(transfer), Some(pending)) = (outcome.transfer, pending) {
            let reply = tokio::select! {
                reply = self.run_transfer(pending, transfer) => reply,
                _ = wait_for_hangup(reader) => {
                    info!("[session {}] Client hung up during transfer, aborting", self.id);
                    return Ok(true);
                }
            };
            write_reply(writer, &reply).await?;
        }

        Ok(outcome.close)
    }

    /// Applies the pre-dispatch checks, then hands the command to its handler.
    async fn execute(
        &mut self,
        command: FtpCommand,
        arg: &str,
    ) -> Result<(CommandOutcome, Option<PendingDataConnection>), FtpError> {
        if command != FtpCommand::RNTO {
            self.rename_from = None;
        }
        if command != FtpCommand::RETR && command != FtpCommand::REST {
            self.restart_offset = 0;
        }

        if command.requires_auth() && !self.is_authenticated() {
            return Err(FtpError::NotLoggedIn);
        }

        let pending = if command.requires_data_connection() {
            Some(
                self.data_channel
                    .take()
                    .ok_or(DataChannelError::NotNegotiated)?,
            )
        } else {
            None
        };

        if let Some(operation) = command.operation() {
            let username = self.username().unwrap_or_default().to_string();
            if !self.authorizer.allowed(&username, operation).await {
                return Err(FtpError::PermissionDenied(format!(
                    "{} denied {} on {}",
                    username, operation, arg
                )));
            }
        }

        let outcome = dispatch_command(command, self, arg).await?;
        Ok((outcome, pending))
    }

    /// Opens the data connection, moves the bytes and returns the final reply.
    async fn run_transfer(&self, pending: PendingDataConnection, transfer: Transfer) -> Reply {
        debug!("[session {}] Opening {:?} data connection", self.id, pending.mode());
        let mut stream = match pending
            .connect(self.peer_addr.ip(), self.data_channel.timeout())
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                warn!("[session {}] Data connection failed: {}", self.id, e);
                return FtpError::from(e).to_ftp_response();
            }
        };

        let (what, result) = match transfer {
            Transfer::Listing { path, entries, names_only } => {
                (path, self.send_listing(entries, names_only, &mut stream).await)
            }
            Transfer::Retrieve { path, mut file } => {
                let sent = send_stream(
                    &mut file,
                    &mut stream,
                    &self.abort,
                    self.config.transfer_buffer_size,
                )
                .await
                .map_err(FtpError::from);
                (path, sent)
            }
            Transfer::Store { path, append } => {
                let received = self.receive_file(&path, append, &mut stream).await;
                (path, received)
            }
        };
        let _ = stream.shutdown().await;

        match result {
            Ok(bytes) => {
                info!("[session {}] Transferred {} bytes for {}", self.id, bytes, what);
                Reply::new(226, "Transfer complete.")
            }
            Err(e) => {
                warn!("[session {}] Transfer of {} failed: {}", self.id, what, e);
                e.to_ftp_response()
            }
        }
    }

    async fn send_listing(
        &self,
        mut entries: DirStream,
        names_only: bool,
        sink: &mut TcpStream,
    ) -> Result<u64, FtpError> {
        let now = Utc::now();
        let mut writer = BufWriter::new(sink);
        let mut total = 0u64;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.abort.cancelled() => return Err(DataChannelError::Aborted.into()),
                next = entries.next() => next,
            };
            let Some(entry) = next else {
                break;
            };
            let info = entry
                .map_err(|e| DataChannelError::Storage(io::Error::new(io::ErrorKind::Other, e)))?;
            let line = if names_only {
                format!("{}\r\n", info.name)
            } else {
                format_list_line(&info, now)
            };
            writer
                .write_all(line.as_bytes())
                .await
                .map_err(DataChannelError::Connection)?;
            total += line.len() as u64;
        }
        writer.flush().await.map_err(DataChannelError::Connection)?;
        Ok(total)
    }

    async fn receive_file(
        &self,
        path: &str,
        append: bool,
        source: &mut TcpStream,
    ) -> Result<u64, FtpError> {
        let mut reader = AbortableReader::new(source, self.abort.clone());
        let written = tokio::select! {
            biased;
            _ = self.abort.cancelled() => return Err(DataChannelError::Aborted.into()),
            written = self.driver.put_file(path, &mut reader, append) => written,
        };
        debug!(
            "[session {}] Received {} bytes on the data connection for {}",
            self.id,
            reader.received(),
            path
        );
        Ok(written?)
    }
}

/// Reads one CRLF (or LF) terminated line of at most `max` bytes. A longer line
/// is consumed up to its terminator and reported as `TooLong`.
pub async fn read_command_line<R>(reader: &mut R, max: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let limit = max.max(2) as u64;
    let mut buf = Vec::new();
    let read = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if read == 0 {
        return Ok(LineRead::Closed);
    }

    if buf.ends_with(b"\n") || (read as u64) < limit {
        while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
            buf.pop();
        }
        return Ok(LineRead::Line(String::from_utf8_lossy(&buf).into_owned()));
    }

    loop {
        buf.clear();
        let read = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
        if read == 0 {
            return Ok(LineRead::Closed);
        }
        if buf.ends_with(b"\n") {
            return Ok(LineRead::TooLong);
        }
    }
}

// Resolves only when the client closes the control connection. Pipelined
// input is left in the buffer for the command loop.
async fn wait_for_hangup<R: AsyncBufRead + Unpin>(reader: &mut R) {
    let has_input = matches!(reader.fill_buf().await, Ok(buf) if !buf.is_empty());
    if has_input {
        std::future::pending::<()>().await;
    }
}

async fn write_reply<W: AsyncWrite + Unpin>(writer: &mut W, reply: &Reply) -> io::Result<()> {
    debug!("-> {}", reply);
    writer.write_all(reply.to_wire().as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_auth::{AllowAll, AuthError, ReadOnly, SimpleAuth};
    use crate::core_driver::MemDriverFactory;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
    use tokio::task::JoinHandle;

    struct Client {
        reader: BufReader<ReadHalf<DuplexStream>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl Client {
        async fn reply(&mut self) -> String {
            let mut line = String::new();
            self.reader.read_line(&mut line).await.unwrap();
            line.trim_end().to_string()
        }

        async fn send(&mut self, line: &str) -> String {
            self.writer
                .write_all(format!("{}\r\n", line).as_bytes())
                .await
                .unwrap();
            self.reply().await
        }
    }

    fn start_session(
        authorizer: Arc<dyn Authorizer>,
        config: SessionConfig,
    ) -> (Client, JoinHandle<io::Result<()>>, CancellationToken) {
        start_session_with(Arc::new(SimpleAuth::new("admin", "admin")), authorizer, config)
    }

    fn start_session_with(
        authenticator: Arc<dyn Authenticator>,
        authorizer: Arc<dyn Authorizer>,
        config: SessionConfig,
    ) -> (Client, JoinHandle<io::Result<()>>, CancellationToken) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let token = CancellationToken::new();
        let session = Session::new(
            1,
            "127.0.0.1:50000".parse().unwrap(),
            "127.0.0.1:21".parse().unwrap(),
            Box::new(MemDriverFactory::new().driver()),
            authenticator,
            authorizer,
            Arc::new(config),
            token.clone(),
        );
        let handle = tokio::spawn(session.serve(server));
        let (reader, writer) = tokio::io::split(client);
        (
            Client {
                reader: BufReader::new(reader),
                writer,
            },
            handle,
            token,
        )
    }

    async fn logged_in(authorizer: Arc<dyn Authorizer>) -> (Client, JoinHandle<io::Result<()>>) {
        let (mut client, handle, _) = start_session(authorizer, SessionConfig::default());
        assert!(client.reply().await.starts_with("220 "));
        assert!(client.send("USER admin").await.starts_with("331 "));
        assert!(client.send("PASS admin").await.starts_with("230 "));
        (client, handle)
    }

    #[tokio::test]
    async fn test_read_command_line() {
        let mut input: &[u8] = b"USER admin\r\nPWD\nNOOP";
        assert_eq!(
            read_command_line(&mut input, 64).await.unwrap(),
            LineRead::Line("USER admin".into())
        );
        assert_eq!(
            read_command_line(&mut input, 64).await.unwrap(),
            LineRead::Line("PWD".into())
        );
        assert_eq!(
            read_command_line(&mut input, 64).await.unwrap(),
            LineRead::Line("NOOP".into())
        );
        assert_eq!(read_command_line(&mut input, 64).await.unwrap(), LineRead::Closed);
    }

    #[tokio::test]
    async fn test_read_command_line_too_long() {
        let long = format!("STOR {}\r\nNOOP\r\n", "x".repeat(100));
        let mut input: &[u8] = long.as_bytes();
        assert_eq!(read_command_line(&mut input, 32).await.unwrap(), LineRead::TooLong);
        assert_eq!(
            read_command_line(&mut input, 32).await.unwrap(),
            LineRead::Line("NOOP".into())
        );
    }

    #[tokio::test]
    async fn test_login_flow() {
        let (mut client, _, _) = start_session(Arc::new(AllowAll), SessionConfig::default());
        assert_eq!(client.reply().await, "220 ftp-engine ready.");
        assert!(client.send("PASS admin").await.starts_with("503 "));
        assert!(client.send("USER admin").await.starts_with("331 "));
        assert!(client.send("PASS wrong").await.starts_with("530 "));
        assert!(client.send("PWD").await.starts_with("530 "));
        assert!(client.send("USER admin").await.starts_with("331 "));
        assert!(client.send("PASS admin").await.starts_with("230 "));
        assert!(client.send("USER other").await.starts_with("503 "));
        assert_eq!(client.send("PWD").await, "257 \"/\" is the current directory.");
    }

    struct BrokenAuth;

    #[async_trait::async_trait]
    impl Authenticator for BrokenAuth {
        async fn check_password(&self, _username: &str, _password: &str) -> Result<bool, AuthError> {
            Err(AuthError::Unavailable("backend offline".into()))
        }
    }

    #[tokio::test]
    async fn test_authenticator_failure_keeps_session() {
        let (mut client, handle, _) =
            start_session_with(Arc::new(BrokenAuth), Arc::new(AllowAll), SessionConfig::default());
        client.reply().await;
        assert!(client.send("USER admin").await.starts_with("331 "));
        assert!(client.send("PASS admin").await.starts_with("451 "));
        assert_eq!(client.send("NOOP").await, "200 NOOP ok.");
        assert!(client.send("PWD").await.starts_with("530 "));
        assert!(!handle.is_finished());
    }

    #[tokio::test]
    async fn test_commands_before_login() {
        let (mut client, _, _) = start_session(Arc::new(AllowAll), SessionConfig::default());
        client.reply().await;
        assert!(client.send("MKD /x").await.starts_with("530 "));
        assert!(client.send("PASV").await.starts_with("530 "));
        assert_eq!(client.send("NOOP").await, "200 NOOP ok.");
        assert_eq!(client.send("SYST").await, "215 UNIX Type: L8");
    }

    #[tokio::test]
    async fn test_unknown_and_empty_commands() {
        let (mut client, _) = logged_in(Arc::new(AllowAll)).await;
        assert!(client.send("SITE CHMOD 777 x").await.starts_with("502 "));
        assert!(client.send("").await.starts_with("500 "));
        assert!(client.send("NOOP").await.starts_with("200 "));
    }

    #[tokio::test]
    async fn test_oversized_line_keeps_session() {
        let config = SessionConfig {
            max_command_length: 64,
            ..SessionConfig::default()
        };
        let (mut client, _, _) = start_session(Arc::new(AllowAll), config);
        client.reply().await;
        let long = format!("USER {}", "a".repeat(200));
        assert!(client.send(&long).await.starts_with("500 "));
        assert!(client.send("NOOP").await.starts_with("200 "));
    }

    #[tokio::test]
    async fn test_directory_commands() {
        let (mut client, _) = logged_in(Arc::new(AllowAll)).await;
        assert_eq!(client.send("MKD docs").await, "257 \"/docs\" directory created.");
        assert!(client.send("CWD docs").await.starts_with("250 "));
        assert_eq!(client.send("PWD").await, "257 \"/docs\" is the current directory.");
        assert!(client.send("CDUP").await.starts_with("250 "));
        assert!(client.send("CDUP").await.starts_with("550 "));
        assert!(client.send("CWD /missing").await.starts_with("550 "));
        assert!(client.send("RMD docs").await.starts_with("250 "));
    }

    #[tokio::test]
    async fn test_rename_sequence() {
        let (mut client, _) = logged_in(Arc::new(AllowAll)).await;
        assert!(client.send("RNTO b").await.starts_with("503 "));
        assert!(client.send("RNFR missing").await.starts_with("550 "));
        client.send("MKD a").await;
        assert!(client.send("RNFR a").await.starts_with("350 "));
        client.send("NOOP").await;
        // staging was cleared by NOOP
        assert!(client.send("RNTO b").await.starts_with("503 "));
        assert!(client.send("RNFR a").await.starts_with("350 "));
        assert!(client.send("RNTO b").await.starts_with("250 "));
        assert!(client.send("CWD b").await.starts_with("250 "));
    }

    #[tokio::test]
    async fn test_read_only_authorizer() {
        let (mut client, _) = logged_in(Arc::new(ReadOnly)).await;
        assert!(client.send("MKD x").await.starts_with("550 "));
        assert!(client.send("CWD x").await.starts_with("550 "));
        assert!(client.send("PWD").await.starts_with("257 "));
    }

    #[tokio::test]
    async fn test_data_command_without_pasv() {
        let (mut client, _) = logged_in(Arc::new(AllowAll)).await;
        assert!(client.send("LIST").await.starts_with("425 "));
        assert!(client.send("RETR x").await.starts_with("425 "));
    }

    #[tokio::test]
    async fn test_type_and_rest() {
        let (mut client, _) = logged_in(Arc::new(AllowAll)).await;
        assert!(client.send("TYPE I").await.starts_with("200 "));
        assert!(client.send("TYPE A").await.starts_with("200 "));
        assert!(client.send("TYPE L 8").await.starts_with("200 "));
        assert!(client.send("TYPE E").await.starts_with("504 "));
        assert!(client.send("TYPE").await.starts_with("501 "));
        assert!(client.send("REST 10").await.starts_with("350 "));
        assert!(client.send("REST abc").await.starts_with("501 "));
    }

    #[tokio::test]
    async fn test_quit_ends_session() {
        let (mut client, handle) = logged_in(Arc::new(AllowAll)).await;
        assert!(client.send("QUIT").await.starts_with("221 "));
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_sends_421() {
        let (mut client, handle, token) = start_session(Arc::new(AllowAll), SessionConfig::default());
        client.reply().await;
        token.cancel();
        assert!(client.reply().await.starts_with("421 "));
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_idle_timeout() {
        let config = SessionConfig {
            idle_timeout: Duration::from_millis(50),
            ..SessionConfig::default()
        };
        let (mut client, handle, _) = start_session(Arc::new(AllowAll), config);
        client.reply().await;
        assert!(client.reply().await.starts_with("421 "));
        assert!(handle.await.unwrap().is_ok());
    }
}
