//! Serialization codecs for cache entries

use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Turns computation results into storable bytes and back
///
/// Implementations must round-trip numeric matrices bit-exactly for finite
/// values and must preserve every key of nested mappings.
pub trait Codec: Send + Sync {
    /// File extension for entries written with this codec, without the dot
    fn extension(&self) -> &'static str;

    /// Serialize a value
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize a value
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// MessagePack codec, the default
///
/// Struct fields are written as named map entries so entries stay readable by
/// other MessagePack tooling, and `f32` values stay 32-bit on the wire.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl Codec for MsgPackCodec {
    fn extension(&self) -> &'static str {
        "msgpack"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(value)
            .map_err(|e| Error::codec(format!("Failed to encode MessagePack: {e}")))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        rmp_serde::from_slice(bytes)
            .map_err(|e| Error::codec(format!("Failed to decode MessagePack: {e}")))
    }
}

/// JSON codec, for caches meant to be inspected by hand
///
/// Non-finite floats have no JSON representation: serde_json writes them as
/// `null`, which then fails to decode as a float. Use [`MsgPackCodec`] for
/// results that may contain NaN or infinities.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| Error::codec(format!("Failed to encode JSON: {e}")))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::codec(format!("Failed to decode JSON: {e}")))
    }
}
