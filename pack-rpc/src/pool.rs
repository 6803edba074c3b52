//! Bounded per-host client pool (spec §4.7, C7).
//!
//! Ported from `original_source/rpc.go`'s `ClientPool`: a mutex-guarded
//! stack of live clients, capped at `MaxSize` (default 10), that dials a
//! fresh connection when empty and discards disconnected clients on both
//! `acquire` and `release`.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::client::Client;
use crate::error::RpcError;

const DEFAULT_MAX_SIZE: usize = 10;

/// A pool of connected [`Client`]s for one endpoint. All state lives behind
/// one mutex; critical sections are O(1) push/pop (spec §5: "critical
/// sections are O(1)").
pub struct Pool {
    endpoint: String,
    max_size: usize,
    clients: Mutex<Vec<Arc<Client>>>,
}

impl Pool {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Pool {
            endpoint: endpoint.into(),
            max_size: DEFAULT_MAX_SIZE,
            clients: Mutex::new(Vec::new()),
        }
    }

    pub fn with_max_size(endpoint: impl Into<String>, max_size: usize) -> Self {
        Pool {
            endpoint: endpoint.into(),
            max_size,
            clients: Mutex::new(Vec::new()),
        }
    }

    /// Returns the most recently released live client, discarding
    /// disconnected ones it finds along the way; dials a new connection if
    /// the stack is empty (spec §4.7: "`acquire()` returns the
    /// most-recently released live client, discarding disconnected ones; if
    /// empty, it dials a new connection").
    pub async fn acquire(&self) -> Result<Arc<Client>, RpcError> {
        loop {
            let candidate = self.clients.lock().pop();
            match candidate {
                Some(client) if client.is_connected() => return Ok(client),
                Some(_) => continue,
                None => break,
            }
        }
        let client = Client::connect(self.endpoint.clone()).await?;
        Ok(Arc::new(client))
    }

    /// Discards `client` if the pool is full or the client disconnected,
    /// otherwise pushes it back for reuse (spec §4.7: "`release(c)` discards
    /// `c` if full or disconnected, otherwise pushes it back").
    pub async fn release(&self, client: Arc<Client>) {
        if !client.is_connected() {
            client.close().await;
            return;
        }

        let overflowed = {
            let mut clients = self.clients.lock();
            if clients.len() >= self.max_size {
                true
            } else {
                clients.push(client.clone());
                false
            }
        };
        if overflowed {
            client.close().await;
        }
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
