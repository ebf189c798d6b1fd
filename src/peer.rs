//! Development peer hosting the share-vote chaincode
//!
//! Serves the line protocol over TCP, keeps the world state in a
//! WAL-backed `MemoryStub`, and runs every connection on its own task.

use crate::{
    chaincode::ShareVoteChaincode,
    error::{Result, ShareVoteError},
    protocol::{parse_command, Command, Response},
    stub::MemoryStub,
    wal::WriteAheadLog,
};
use std::sync::Arc;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::{broadcast, Semaphore},
};
use tracing::{debug, error, info, warn};

/// Peer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PeerConfig {
    pub bind_addr: String,
    pub wal_path: String,
    pub max_connections: usize,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7052".to_string(),
            wal_path: "sharevote.log".to_string(),
            max_connections: 1000,
        }
    }
}

impl PeerConfig {
    /// Build a config from command line flags, starting from the defaults
    ///
    /// Recognised flags: `--bind <addr>`, `--wal <path>`,
    /// `--max-connections <n>`.
    pub fn from_args<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Self::default();
        let mut args = args.into_iter();

        while let Some(flag) = args.next() {
            let mut value = || {
                args.next()
                    .ok_or_else(|| ShareVoteError::Config(format!("Missing value for {}", flag)))
            };

            match flag.as_str() {
                "--bind" => config.bind_addr = value()?,
                "--wal" => config.wal_path = value()?,
                "--max-connections" => {
                    let raw = value()?;
                    config.max_connections = raw.parse().map_err(|_| {
                        ShareVoteError::Config(format!("Invalid --max-connections: {}", raw))
                    })?;
                    if config.max_connections == 0 {
                        return Err(ShareVoteError::Config(
                            "--max-connections must be at least 1".to_string(),
                        ));
                    }
                }
                other => {
                    return Err(ShareVoteError::Config(format!("Unknown flag: {}", other)));
                }
            }
        }

        Ok(config)
    }
}

/// Development peer
pub struct ShareVotePeer {
    config: PeerConfig,
    chaincode: ShareVoteChaincode,
    stub: Arc<MemoryStub>,
    connections: Arc<Semaphore>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ShareVotePeer {
    /// Create a new peer, restoring world state from the WAL
    pub async fn new(config: PeerConfig) -> Result<Self> {
        let wal = Arc::new(WriteAheadLog::new(&config.wal_path)?);
        let stub = MemoryStub::with_wal(wal);

        info!(wal = %config.wal_path, "restoring state from WAL");
        stub.restore_from_wal().await?;
        info!(keys = stub.len().await, "world state restored");

        let (shutdown_tx, _) = broadcast::channel(1);
        let connections = Arc::new(Semaphore::new(config.max_connections));

        Ok(Self {
            config,
            chaincode: ShareVoteChaincode::new(),
            stub: Arc::new(stub),
            connections,
            shutdown_tx,
        })
    }

    /// Shared handle to the world state
    pub fn stub(&self) -> Arc<MemoryStub> {
        Arc::clone(&self.stub)
    }

    /// Start the peer
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(addr = %self.config.bind_addr, "sharevote peer listening");

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let permit = match Arc::clone(&self.connections).try_acquire_owned() {
                                Ok(permit) => permit,
                                Err(_) => {
                                    warn!(%addr, "connection limit reached, rejecting client");
                                    Self::reject(stream).await;
                                    continue;
                                }
                            };

                            debug!(%addr, "client connected");
                            let chaincode = self.chaincode;
                            let stub = Arc::clone(&self.stub);
                            let shutdown_rx = self.shutdown_tx.subscribe();

                            tokio::spawn(async move {
                                if let Err(e) = Self::handle_client(stream, chaincode, stub, shutdown_rx).await {
                                    error!(%addr, error = %e, "error handling client");
                                }
                                debug!(%addr, "client disconnected");
                                drop(permit);
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received, stopping peer");
                    break;
                }
            }
        }

        if let Err(e) = self.stub.compact_wal().await {
            warn!(error = %e, "WAL compaction on shutdown failed");
        }
        info!("peer stopped");
        Ok(())
    }

    async fn reject(mut stream: TcpStream) {
        let response = Response::Error("Too many connections".to_string());
        let _ = stream.write_all(&response.to_bytes()).await;
        let _ = stream.shutdown().await;
    }

    /// Handle a single client connection
    async fn handle_client(
        mut stream: TcpStream,
        chaincode: ShareVoteChaincode,
        stub: Arc<MemoryStub>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let (reader, mut writer) = stream.split();
        let mut buf_reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();

            tokio::select! {
                result = buf_reader.read_line(&mut line) => {
                    match result {
                        Ok(0) => break,
                        Ok(_) => {
                            let response = Self::process_command(&line, &chaincode, &stub).await;
                            writer.write_all(&response.to_bytes()).await?;
                            writer.flush().await?;
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to read from client");
                            break;
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    debug!("shutdown signal received, closing client connection");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Process one protocol line from a client
    async fn process_command(
        line: &str,
        chaincode: &ShareVoteChaincode,
        stub: &MemoryStub,
    ) -> Response {
        let command_bytes = line.trim_start().trim_end_matches(['\r', '\n']).as_bytes();
        if command_bytes.iter().all(u8::is_ascii_whitespace) {
            return Response::Error("Empty command".to_string());
        }

        let mut full_command = command_bytes.to_vec();
        full_command.extend_from_slice(b"\r\n");

        match parse_command(&full_command) {
            Ok(command) => Self::execute_command(command, chaincode, stub).await,
            Err(e) => Response::Error(e.to_string()),
        }
    }

    /// Execute a parsed command against the chaincode
    async fn execute_command(
        command: Command,
        chaincode: &ShareVoteChaincode,
        stub: &MemoryStub,
    ) -> Response {
        let result = match &command {
            Command::Init { args } => chaincode.init(stub, args).await,
            Command::Invoke { function, args } => chaincode.invoke(stub, function, args).await,
            Command::Query { function, args } => chaincode.query(stub, function, args).await,
        };

        match result {
            Ok(None) => Response::Ok,
            Ok(Some(payload)) => Response::Payload(payload),
            Err(e) => Response::Error(e.to_string()),
        }
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) -> Result<()> {
        self.shutdown_tx.send(()).map_err(|_| {
            ShareVoteError::Server("Failed to send shutdown signal".to_string())
        })?;
        Ok(())
    }
}
