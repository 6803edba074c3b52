//! The concurrent RPC server (spec §4.6, C6).
//!
//! Ported from `original_source/rpc.go`'s `serve`/`sendResults`/`processRPC`
//! trio: one reader loop per connection that decodes frames and spawns a
//! task per request, one writer task that owns the socket's write half and
//! drains a bounded outbound queue, and a handler registry looked up by
//! method name.

use std::collections::HashMap;
use std::sync::Arc;

use pack_core::{DecodeOptions, Value};
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::async_io::decode_async;
use crate::error::RpcError;
use crate::frame::{self, Frame};
use crate::handler::Handler;

/// Tunable knobs for [`Server::serve`] (SPEC_FULL §4.6: no env vars, no
/// files — the caller constructs this directly).
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    /// Capacity of each connection's outbound byte-string queue (spec §4.6:
    /// "capacity >= 256 recommended; the original uses 1024").
    pub outbound_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            outbound_queue_capacity: 1024,
        }
    }
}

/// An RPC server: a per-instance method registry (spec §9's open question,
/// resolved in favor of parameterizing instead of a process-global map) plus
/// the config it serves connections with.
pub struct Server {
    handlers: Arc<HashMap<String, Arc<dyn Handler>>>,
    config: ServerConfig,
}

/// Builds up a [`Server`]'s handler registry before any connection is
/// accepted; registration-then-serve gives the "happen-before dispatch"
/// ordering spec §5 asks for without extra synchronization.
pub struct ServerBuilder {
    handlers: HashMap<String, Arc<dyn Handler>>,
    config: ServerConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        ServerBuilder {
            handlers: HashMap::new(),
            config: ServerConfig::default(),
        }
    }

    pub fn with_config(config: ServerConfig) -> Self {
        ServerBuilder {
            handlers: HashMap::new(),
            config,
        }
    }

    /// Maps `name` to `handler` (spec §4.6: "a global name->handler
    /// registry maps method names to handler functions").
    pub fn register(mut self, name: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn build(self) -> Server {
        Server {
            handlers: Arc::new(self.handlers),
            config: self.config,
        }
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    /// Binds `endpoint` and serves connections until the listener errors
    /// (spec §4.6: "the server listens on a configured network endpoint").
    /// Blocks the calling task; spawn it if the caller needs to do other work.
    pub async fn serve<A: ToSocketAddrs>(&self, endpoint: A) -> Result<(), RpcError> {
        let listener = TcpListener::bind(endpoint).await?;
        info!("pack-rpc server listening");
        loop {
            let (stream, peer) = listener.accept().await?;
            info!(%peer, "accepted connection");
            let handlers = Arc::clone(&self.handlers);
            let config = self.config;
            tokio::spawn(async move {
                if let Err(err) = handle_connection(stream, handlers, config).await {
                    warn!(%peer, %err, "connection closed with error");
                } else {
                    debug!(%peer, "connection closed");
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    handlers: Arc<HashMap<String, Arc<dyn Handler>>>,
    config: ServerConfig,
) -> Result<(), RpcError> {
    let (read_half, write_half) = tokio::io::split(stream);
    let (tx, rx) = mpsc::channel::<Vec<u8>>(config.outbound_queue_capacity);

    let writer_task = tokio::spawn(run_writer(write_half, rx));
    let reader_result = run_reader(read_half, handlers, tx).await;

    // Dropping the sender (reader_result's tx went out of scope already)
    // lets the writer drain its queue and exit on its own; we still await
    // it so `serve`'s spawned task doesn't outlive the connection.
    let _ = writer_task.await;
    reader_result
}

/// Sole owner of the socket's write half (spec §4.6 invariant: "at-most-one
/// writer per connection"). Drains `rx` until every sender is dropped.
async fn run_writer(mut write_half: WriteHalf<TcpStream>, mut rx: mpsc::Receiver<Vec<u8>>) {
    while let Some(bytes) = rx.recv().await {
        if let Err(err) = write_half.write_all(&bytes).await {
            warn!(%err, "write failed, closing connection");
            return;
        }
    }
}

/// Decodes frames in a loop and dispatches each one to its own task (spec
/// §4.6: "for each frame it launches a concurrent handler task"). Response
/// write order is therefore unspecified relative to request order.
async fn run_reader(
    mut read_half: ReadHalf<TcpStream>,
    handlers: Arc<HashMap<String, Arc<dyn Handler>>>,
    tx: mpsc::Sender<Vec<u8>>,
) -> Result<(), RpcError> {
    let opts = DecodeOptions::default();
    loop {
        let (value, _n) = match decode_async(&mut read_half, &opts).await {
            Ok(pair) => pair,
            Err(err) => {
                // Clean EOF looks like a ShortRead with 0 bytes consumed;
                // anything else is a genuine framing error worth logging.
                if err.consumed() > 0 {
                    warn!(%err, "malformed frame, closing connection");
                    return Err(RpcError::from(err));
                }
                return Ok(());
            }
        };

        let frame = match frame::parse_frame(value) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, "could not parse frame, closing connection");
                return Err(RpcError::from(err));
            }
        };

        match frame {
            Frame::Request {
                msgid,
                method,
                params,
            } => {
                let handlers = Arc::clone(&handlers);
                let tx = tx.clone();
                tokio::spawn(async move {
                    dispatch_request(handlers, msgid, method, params, tx).await;
                });
            }
            Frame::Notify { method, params } => {
                let handlers = Arc::clone(&handlers);
                tokio::spawn(async move {
                    dispatch_notify(handlers, method, params).await;
                });
            }
            Frame::Response { msgid, .. } => {
                warn!(msgid, "server received a response frame, ignoring");
            }
        }
    }
}

async fn dispatch_request(
    handlers: Arc<HashMap<String, Arc<dyn Handler>>>,
    msgid: u32,
    method: String,
    params: Value,
    tx: mpsc::Sender<Vec<u8>>,
) {
    let response = match handlers.get(&method) {
        None => {
            warn!(%method, "no procedure registered");
            frame::response_err_value(msgid, Value::from(format!("no procedure: {}", method)))
        }
        Some(handler) => {
            let handler = Arc::clone(handler);
            match tokio::spawn(async move { handler.call(params).await }).await {
                Ok(Ok(result)) => frame::response_ok_value(msgid, result),
                Ok(Err(message)) => {
                    warn!(%method, %message, "handler returned an error");
                    frame::response_err_value(msgid, Value::from(message))
                }
                Err(join_err) => {
                    error!(%method, %join_err, "handler panicked");
                    frame::response_err_value(msgid, Value::from("handler panicked"))
                }
            }
        }
    };

    let mut buf = Vec::new();
    if let Err(err) = pack_core::encode(&mut buf, &response) {
        error!(%err, "failed to encode response frame");
        return;
    }
    let _ = tx.send(buf).await;
}

async fn dispatch_notify(
    handlers: Arc<HashMap<String, Arc<dyn Handler>>>,
    method: String,
    params: Value,
) {
    match handlers.get(&method) {
        None => warn!(%method, "no procedure registered for notify"),
        Some(handler) => {
            let handler = Arc::clone(handler);
            if let Err(join_err) = tokio::spawn(async move { handler.call(params).await }).await {
                error!(%method, %join_err, "notify handler panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;

    #[tokio::test]
    async fn echo_round_trip_over_tcp() {
        let server = ServerBuilder::new()
            .register("echo", |params: Value| async move { Ok(params) })
            .build();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let server = Arc::new(server);
        let serve_handle = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.serve(addr).await })
        };
        // give the listener a moment to bind
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let client = Client::connect(addr).await.unwrap();
        let result = client.call_sync("echo", Value::UInt(42)).await.unwrap();
        assert_eq!(result, Value::UInt(42));

        serve_handle.abort();
    }

    #[tokio::test]
    async fn unknown_method_returns_named_error() {
        let server = Arc::new(ServerBuilder::new().build());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let serve_handle = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.serve(addr).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let client = Client::connect(addr).await.unwrap();
        let err = client
            .call_sync("does-not-exist", Value::Nil)
            .await
            .unwrap_err();
        match err {
            RpcError::HandlerError(message) => assert!(message.contains("does-not-exist")),
            other => panic!("expected HandlerError, got {:?}", other),
        }

        serve_handle.abort();
    }
}
