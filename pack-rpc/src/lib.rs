//! Request/response/notify RPC framing over `pack-core`: a concurrent
//! server, a msgid-demultiplexing client, and a bounded connection pool.

pub mod async_io;
pub mod client;
pub mod error;
pub mod frame;
pub mod handler;
pub mod pool;
pub mod server;

pub use client::Client;
pub use error::RpcError;
pub use frame::{pack_notify, pack_request, pack_response_err, pack_response_ok, Frame, FrameError, MalformedFrame};
pub use handler::{Handler, HandlerFuture, HandlerResult};
pub use pool::Pool;
pub use server::{Server, ServerBuilder, ServerConfig};
