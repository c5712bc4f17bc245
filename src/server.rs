//! columnkv TCP server
//!
//! Binds the listener, rehydrates the store from the durable image and runs
//! the accept loop. Each accepted connection (after the TLS handshake, when
//! enabled) gets its own session task. `stop` closes the accept socket;
//! sessions already running are left to finish on their own.

use crate::{
    config::Config,
    dispatcher::CommandDispatcher,
    error::{ColumnKvError, Result},
    persistence::Persistence,
    session::handle_session,
    store::{MemoryStore, Store},
    tls,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{watch, Mutex},
};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

/// columnkv TCP server
pub struct Server {
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    acceptor: Option<TlsAcceptor>,
    dispatcher: Arc<CommandDispatcher>,
    shutdown_tx: watch::Sender<bool>,
}

impl Server {
    /// Load the durable image and bind the listening socket.
    ///
    /// An unreadable image, bad TLS material or a failed bind are all fatal.
    pub async fn bind(config: Config) -> Result<Self> {
        config.validate()?;

        let persistence = Arc::new(Persistence::new(&config.storage.file_path));
        let entries = persistence.load().await?;
        let store = Arc::new(MemoryStore::from_entries(entries));
        info!(
            path = %config.storage.file_path.display(),
            entries = store.len().await,
            "restored dataset from durable image"
        );

        let acceptor = if config.server.tls {
            match (&config.server.tls_cert_file, &config.server.tls_key_file) {
                (Some(cert), Some(key)) => Some(tls::load_acceptor(cert, key)?),
                _ => None,
            }
        } else {
            None
        };

        let listener = TcpListener::bind(config.bind_address()).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, tls = acceptor.is_some(), "columnkv server listening");

        let dispatcher = Arc::new(CommandDispatcher::new(
            store,
            persistence,
            config.auth_policy(),
        ));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            listener: Mutex::new(Some(listener)),
            local_addr,
            acceptor,
            dispatcher,
            shutdown_tx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until `stop` is called, then close the socket.
    pub async fn run(&self) -> Result<()> {
        let listener = self
            .listener
            .lock()
            .await
            .take()
            .ok_or_else(|| ColumnKvError::Server("server is already running".to_string()))?;

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if *shutdown_rx.borrow() {
            return Ok(());
        }

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            info!(client = %addr, "client connected");
                            self.spawn_session(stream, addr);
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to accept connection");
                        }
                    }
                }

                _ = shutdown_rx.changed() => {
                    info!("stop requested, no longer accepting connections");
                    break;
                }
            }
        }

        Ok(())
    }

    fn spawn_session(&self, stream: TcpStream, addr: SocketAddr) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let acceptor = self.acceptor.clone();

        tokio::spawn(async move {
            let result = match acceptor {
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(tls_stream) => handle_session(tls_stream, addr, dispatcher).await,
                    Err(e) => {
                        warn!(client = %addr, error = %e, "TLS handshake failed");
                        return;
                    }
                },
                None => handle_session(stream, addr, dispatcher).await,
            };

            match result {
                Ok(()) => info!(client = %addr, "client disconnected"),
                Err(e) => debug!(client = %addr, error = %e, "session ended with transport error"),
            }
        });
    }

    /// Stop accepting new connections. Running sessions are unaffected.
    pub fn stop(&self) {
        self.shutdown_tx.send_replace(true);
    }
}
