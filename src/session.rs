//! Per-connection session handling
//!
//! A session reads one line, dispatches it, writes exactly one reply line and
//! goes back to reading. It ends on `EXIT`, end of stream, an over-long
//! line, or any I/O error. The buffered reader lives for the whole session
//! so bytes that arrive ahead of the current command are never dropped.

use crate::dispatcher::CommandDispatcher;
use crate::error::Result;
use crate::protocol::{Response, EXIT_LINE};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

/// Longest request line accepted, newline excluded
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Serve one accepted connection, plain or TLS, until it closes.
pub async fn handle_session<S>(
    stream: S,
    peer: SocketAddr,
    dispatcher: Arc<CommandDispatcher>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = (&mut stream)
            .take(MAX_LINE_LENGTH as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await?;
        if read == 0 {
            debug!(client = %peer, "peer closed the connection");
            break;
        }

        let terminated = buf.last() == Some(&b'\n');
        if !terminated && buf.len() > MAX_LINE_LENGTH {
            warn!(client = %peer, "request line exceeds limit, closing session");
            stream.write_all(&Response::LineTooLong.to_bytes()).await?;
            stream.flush().await?;
            break;
        }

        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }

        let response = match std::str::from_utf8(&buf) {
            Ok(request) if request == EXIT_LINE => {
                debug!(client = %peer, "client sent EXIT");
                break;
            }
            Ok(request) => dispatcher.dispatch(request).await,
            Err(_) => {
                debug!(client = %peer, "request line is not valid UTF-8");
                Response::InvalidEncoding
            }
        };
        stream.write_all(&response.to_bytes()).await?;
        stream.flush().await?;

        if !terminated {
            break;
        }
    }

    stream.shutdown().await.ok();
    Ok(())
}
