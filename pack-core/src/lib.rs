//! Tagged binary value format: wire tags, a dynamic `Value`, a
//! narrowest-form encoder, and a streaming recursive-descent decoder.

pub mod decode;
pub mod encode;
pub mod error;
pub mod tags;
pub mod value;

pub use decode::{decode, decode_with, DecodeOptions};
pub use encode::encode;
pub use error::{DecodeError, EncodeError};
pub use value::{ArrayView, MapView, Params, Value};
