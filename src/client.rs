//! Client library for connecting to a columnkv server
//!
//! Provides a simple interface for interacting with the key-value store

use crate::error::{ColumnKvError, Result};
use crate::protocol::{Command, Reply, EXIT_LINE};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;

/// Byte stream a client can talk over, plain TCP or TLS
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// Client for connecting to a columnkv server
pub struct Client {
    stream: BufReader<Box<dyn Transport>>,
    auth_token: Option<String>,
}

impl Client {
    /// Connect over plain TCP
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::from_transport(Box::new(stream)))
    }

    /// Connect over TLS, verifying the server certificate for `domain`
    pub async fn connect_tls(addr: &str, domain: &str, connector: &TlsConnector) -> Result<Self> {
        let server_name = ServerName::try_from(domain.to_string())
            .map_err(|e| ColumnKvError::Tls(format!("invalid server name {:?}: {}", domain, e)))?;
        let stream = TcpStream::connect(addr).await?;
        let tls_stream = connector.connect(server_name, stream).await?;
        Ok(Self::from_transport(Box::new(tls_stream)))
    }

    fn from_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            stream: BufReader::new(transport),
            auth_token: None,
        }
    }

    /// Send `token` with every `set` and `lookup`
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Send one raw line and return the raw reply line, without its newline
    pub async fn send_line(&mut self, line: &str) -> Result<String> {
        self.stream.write_all(line.trim_end_matches(['\r', '\n']).as_bytes()).await?;
        self.stream.write_all(b"\n").await?;
        self.stream.flush().await?;

        let mut reply = String::new();
        if self.stream.read_line(&mut reply).await? == 0 {
            return Err(ColumnKvError::Client(
                "server closed the connection".to_string(),
            ));
        }
        Ok(reply.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn send_command(&mut self, command: &Command) -> Result<Reply> {
        let line = command.to_line(self.auth_token.as_deref());
        let reply = self.send_line(&line).await?;
        Ok(Reply::parse(&reply))
    }

    /// Set a key-value pair
    pub async fn set(&mut self, key: &str, value: &str) -> Result<()> {
        check_argument("key", key)?;
        check_argument("value", value)?;
        let command = Command::Set {
            key: key.to_string(),
            value: value.to_string(),
        };

        match self.send_command(&command).await? {
            Reply::Ok => Ok(()),
            Reply::Error(e) => Err(ColumnKvError::Server(e)),
            other => Err(ColumnKvError::Protocol(format!(
                "unexpected reply to SET: {:?}",
                other
            ))),
        }
    }

    /// Look up a value by key
    pub async fn lookup(&mut self, key: &str) -> Result<Option<String>> {
        check_argument("key", key)?;
        let command = Command::Lookup {
            key: key.to_string(),
        };

        match self.send_command(&command).await? {
            Reply::Value(value) => Ok(Some(value)),
            // a stored value of "OK" reads back as the status line
            Reply::Ok => Ok(Some("OK".to_string())),
            Reply::NotFound => Ok(None),
            Reply::Error(e) => Err(ColumnKvError::Server(e)),
        }
    }

    /// Tell the server the session is over and close the connection
    pub async fn close(mut self) -> Result<()> {
        self.stream.write_all(format!("{}\n", EXIT_LINE).as_bytes()).await?;
        self.stream.flush().await?;
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Keys and values go on the wire as single tokens, so they must be
/// non-empty and free of whitespace.
fn check_argument(kind: &str, arg: &str) -> Result<()> {
    if arg.is_empty() {
        return Err(ColumnKvError::Client(format!("{} must not be empty", kind)));
    }
    if arg.chars().any(char::is_whitespace) {
        return Err(ColumnKvError::Client(format!(
            "{} {:?} contains whitespace",
            kind, arg
        )));
    }
    Ok(())
}
