// Shared helpers for the end-to-end protocol tests.
#![allow(dead_code)]

use async_trait::async_trait;
use ftp_engine::core_auth::SimpleAuth;
use ftp_engine::core_driver::{
    DirStream, Driver, DriverError, DriverFactory, FileInfo, FileStream, MemDriver,
    MemDriverFactory, RemoveDirPolicy,
};
use ftp_engine::server::{Server, ServerOpts, ShutdownHandle};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub const USER: &str = "admin";
pub const PASSWORD: &str = "admin";
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: ShutdownHandle,
    pub handle: JoinHandle<io::Result<()>>,
}

pub async fn start_server(opts: ServerOpts) -> TestServer {
    let opts = opts.with_listen_addr("127.0.0.1:0".parse().unwrap());
    let server = Server::bind(opts).await.expect("bind test server");
    let addr = server.local_addr().unwrap();
    let shutdown = server.shutdown_handle();
    let handle = tokio::spawn(server.run());
    TestServer {
        addr,
        shutdown,
        handle,
    }
}

pub fn memory_opts(policy: RemoveDirPolicy) -> ServerOpts {
    ServerOpts::new(
        Arc::new(MemDriverFactory::new().with_remove_dir_policy(policy)),
        Arc::new(SimpleAuth::new(USER, PASSWORD)),
    )
}

/// Counts every call that reaches storage.
#[derive(Clone, Default)]
pub struct CountingFactory {
    inner: MemDriverFactory,
    pub calls: Arc<AtomicUsize>,
}

impl CountingFactory {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DriverFactory for CountingFactory {
    async fn new_driver(&self) -> Result<Box<dyn Driver>, DriverError> {
        Ok(Box::new(CountingDriver {
            inner: self.inner.driver(),
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct CountingDriver {
    inner: MemDriver,
    calls: Arc<AtomicUsize>,
}

impl CountingDriver {
    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Driver for CountingDriver {
    fn remove_dir_policy(&self) -> RemoveDirPolicy {
        self.inner.remove_dir_policy()
    }

    async fn change_dir(&self, path: &str) -> Result<(), DriverError> {
        self.hit();
        self.inner.change_dir(path).await
    }

    async fn stat(&self, path: &str) -> Result<FileInfo, DriverError> {
        self.hit();
        self.inner.stat(path).await
    }

    async fn list_dir(&self, path: &str) -> Result<DirStream, DriverError> {
        self.hit();
        self.inner.list_dir(path).await
    }

    async fn delete_dir(&self, path: &str) -> Result<(), DriverError> {
        self.hit();
        self.inner.delete_dir(path).await
    }

    async fn delete_file(&self, path: &str) -> Result<(), DriverError> {
        self.hit();
        self.inner.delete_file(path).await
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), DriverError> {
        self.hit();
        self.inner.rename(from, to).await
    }

    async fn make_dir(&self, path: &str) -> Result<(), DriverError> {
        self.hit();
        self.inner.make_dir(path).await
    }

    async fn get_file(&self, path: &str, offset: u64) -> Result<FileStream, DriverError> {
        self.hit();
        self.inner.get_file(path, offset).await
    }

    async fn put_file(
        &self,
        path: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        append: bool,
    ) -> Result<u64, DriverError> {
        self.hit();
        self.inner.put_file(path, reader, append).await
    }
}

/// Minimal FTP client speaking the control protocol over a raw socket.
pub struct FtpClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    /// Every line of the reply, without CRLF.
    pub lines: Vec<String>,
}

impl Response {
    pub fn text(&self) -> &str {
        self.lines.last().map(String::as_str).unwrap_or("")
    }
}

impl FtpClient {
    pub async fn connect(addr: SocketAddr) -> FtpClient {
        let stream = TcpStream::connect(addr).await.expect("connect control");
        let (read_half, writer) = stream.into_split();
        let mut client = FtpClient {
            reader: BufReader::new(read_half),
            writer,
        };
        let greeting = client.read_reply().await;
        assert_eq!(greeting.code, 220, "unexpected greeting {:?}", greeting);
        client
    }

    pub async fn login(addr: SocketAddr) -> FtpClient {
        let mut client = FtpClient::connect(addr).await;
        assert_eq!(client.cmd(&format!("USER {}", USER)).await.code, 331);
        assert_eq!(client.cmd(&format!("PASS {}", PASSWORD)).await.code, 230);
        client
    }

    async fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        let read = timeout(REPLY_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("reply timed out")
            .expect("read reply");
        if read == 0 {
            return None;
        }
        Some(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Reads one (possibly multi-line) reply.
    pub async fn read_reply(&mut self) -> Response {
        let first = self.read_line().await.expect("connection closed");
        let code: u16 = first[..3].parse().expect("reply code");
        let mut lines = vec![first[4..].to_string()];
        if first.as_bytes()[3] == b'-' {
            let end = format!("{} ", code);
            loop {
                let line = self.read_line().await.expect("connection closed");
                if let Some(rest) = line.strip_prefix(&end) {
                    lines.push(rest.to_string());
                    break;
                }
                lines.push(line.trim_start().to_string());
            }
        }
        Response { code, lines }
    }

    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .expect("send command");
    }

    pub async fn cmd(&mut self, line: &str) -> Response {
        self.send(line).await;
        self.read_reply().await
    }

    /// True once the server has closed the control connection.
    pub async fn is_closed(&mut self) -> bool {
        self.read_line().await.is_none()
    }

    pub async fn pasv(&mut self) -> SocketAddr {
        let reply = self.cmd("PASV").await;
        assert_eq!(reply.code, 227, "PASV failed: {:?}", reply);
        parse_pasv(reply.text())
    }

    /// Runs a download-style command (RETR, LIST, NLST) over a fresh PASV
    /// connection. Returns the first reply when it is not 150.
    pub async fn download(&mut self, command: &str) -> (Response, Vec<u8>) {
        let data_addr = self.pasv().await;
        let mut data = TcpStream::connect(data_addr).await.expect("connect data");
        let start = self.cmd(command).await;
        if start.code != 150 {
            return (start, Vec::new());
        }
        let mut bytes = Vec::new();
        timeout(REPLY_TIMEOUT, data.read_to_end(&mut bytes))
            .await
            .expect("data timed out")
            .expect("read data");
        (self.read_reply().await, bytes)
    }

    /// Runs an upload-style command (STOR, APPE, STOU) over a fresh PASV
    /// connection. Returns the 150 reply and the final reply.
    pub async fn upload(&mut self, command: &str, contents: &[u8]) -> (Response, Response) {
        let data_addr = self.pasv().await;
        let mut data = TcpStream::connect(data_addr).await.expect("connect data");
        let start = self.cmd(command).await;
        if start.code != 150 {
            return (start.clone(), start);
        }
        data.write_all(contents).await.expect("write data");
        data.shutdown().await.expect("close data");
        drop(data);
        (start, self.read_reply().await)
    }

    pub async fn list(&mut self, command: &str) -> Vec<String> {
        let (reply, bytes) = self.download(command).await;
        assert_eq!(reply.code, 226, "{} failed: {:?}", command, reply);
        String::from_utf8(bytes)
            .expect("listing is utf-8")
            .split("\r\n")
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Parses `Entering Passive Mode (h1,h2,h3,h4,p1,p2).`
pub fn parse_pasv(text: &str) -> SocketAddr {
    let start = text.find('(').expect("opening paren") + 1;
    let end = text.find(')').expect("closing paren");
    let nums: Vec<u16> = text[start..end]
        .split(',')
        .map(|n| n.trim().parse().expect("pasv number"))
        .collect();
    assert_eq!(nums.len(), 6);
    let ip = Ipv4Addr::new(nums[0] as u8, nums[1] as u8, nums[2] as u8, nums[3] as u8);
    SocketAddr::V4(SocketAddrV4::new(ip, nums[4] * 256 + nums[5]))
}

/// Size column of an `ls -l` style line.
pub fn listed_size(line: &str) -> u64 {
    line.split_whitespace()
        .nth(4)
        .expect("size column")
        .parse()
        .expect("numeric size")
}

pub fn listed_name(line: &str) -> &str {
    line.split_whitespace().last().expect("name column")
}
