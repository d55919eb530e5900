use crate::cluster::{Command, NodeAddress, Transport};
use crate::error::{AikvError, Result};
use crate::protocol::{RespParser, RespValue};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

/// One RESP connection to one node
struct NodeConnection {
    stream: TcpStream,
    parser: RespParser,
    /// Set while a request is outstanding. A request future dropped by a
    /// timeout leaves this set, and the connection is discarded on next use.
    in_flight: bool,
}

impl NodeConnection {
    async fn connect(node: &NodeAddress) -> Result<Self> {
        let stream = TcpStream::connect((node.host(), node.port())).await?;
        stream.set_nodelay(true)?;
        debug!(node = %node, "connected");
        Ok(Self {
            stream,
            parser: RespParser::new(8192),
            in_flight: false,
        })
    }

    /// Allow reads on a replica connection. Sent once, right after connect.
    async fn enable_replica_reads(&mut self, node: &NodeAddress) -> Result<()> {
        match self.request(&Command::new("READONLY", Vec::new())).await? {
            RespValue::Error(message) => Err(AikvError::Protocol(format!(
                "READONLY rejected by {}: {}",
                node, message
            ))),
            _ => Ok(()),
        }
    }

    async fn request(&mut self, command: &Command) -> Result<RespValue> {
        self.in_flight = true;
        self.stream
            .write_all(&command.to_resp().serialize())
            .await?;

        loop {
            if let Some(reply) = self.parser.parse()? {
                self.in_flight = false;
                return Ok(reply);
            }
            let n = self.stream.read_buf(self.parser.buffer_mut()).await?;
            if n == 0 {
                return Err(AikvError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed by node",
                )));
            }
        }
    }
}

/// Transport keeping one lazily opened TCP connection per node.
///
/// Requests to the same node are serialized on its connection; different
/// nodes proceed in parallel. A connection that failed is dropped and
/// reopened by the next request.
///
/// With replica reads enabled every new connection starts with `READONLY`,
/// so reads routed to a replica are served there instead of redirected.
#[derive(Default)]
pub struct TcpTransport {
    connections: Mutex<HashMap<NodeAddress, Arc<Mutex<Option<NodeConnection>>>>>,
    replica_reads: bool,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replica_reads(mut self, enabled: bool) -> Self {
        self.replica_reads = enabled;
        self
    }

    async fn slot_for(&self, node: &NodeAddress) -> Arc<Mutex<Option<NodeConnection>>> {
        let mut connections = self.connections.lock().await;
        connections
            .entry(node.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Run `commands` back to back on the node's connection
    async fn exchange(&self, node: &NodeAddress, commands: &[&Command]) -> Result<RespValue> {
        let slot = self.slot_for(node).await;
        let mut guard = slot.lock().await;

        if guard.as_ref().is_some_and(|c| c.in_flight) {
            debug!(node = %node, "discarding connection with an abandoned request");
            *guard = None;
        }
        if guard.is_none() {
            let mut connection = NodeConnection::connect(node).await?;
            if self.replica_reads {
                connection.enable_replica_reads(node).await?;
            }
            *guard = Some(connection);
        }

        let mut last = RespValue::Null;
        for command in commands {
            let result = match guard.as_mut() {
                Some(connection) => connection.request(command).await,
                None => Err(AikvError::Protocol("connection unavailable".to_string())),
            };
            match result {
                Ok(RespValue::Error(message)) => return Ok(RespValue::Error(message)),
                Ok(reply) => last = reply,
                Err(e) => {
                    *guard = None;
                    return Err(e);
                }
            }
        }
        Ok(last)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, node: &NodeAddress, command: &Command) -> Result<RespValue> {
        self.exchange(node, &[command]).await
    }

    /// `ASKING` only applies to the next command on the same connection,
    /// so both go out under one connection lock.
    async fn send_asking(&self, node: &NodeAddress, command: &Command) -> Result<RespValue> {
        let asking = Command::new("ASKING", Vec::new());
        self.exchange(node, &[&asking, command]).await
    }
}
