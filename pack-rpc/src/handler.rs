//! The registered-method side of the RPC surface (spec §4.6, §6):
//! `(params: Value) -> (Value, error)`, expressed as an async Rust trait.

use std::future::Future;
use std::pin::Pin;

use pack_core::Value;

/// What a handler resolves to: either the call's result, or an error
/// message string that becomes the response's `error` slot (spec §3.3).
pub type HandlerResult = Result<Value, String>;

/// A boxed, `Send` future, so `Server::dispatch` can spawn a handler call
/// without knowing its concrete future type.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// A registered RPC method (spec §4.6: "a global name->handler registry maps
/// method names to handler functions").
pub trait Handler: Send + Sync {
    fn call(&self, params: Value) -> HandlerFuture;
}

/// Any `Fn(Value) -> impl Future<Output = HandlerResult>` is a [`Handler`],
/// so callers register plain async closures:
///
/// ```ignore
/// server.register("echo", |params| async move { Ok(params) });
/// ```
impl<F, Fut> Handler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, params: Value) -> HandlerFuture {
        Box::pin(self(params))
    }
}
