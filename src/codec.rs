//! Wire/storage codec: JSON via `serde_json`, shared by the near and far
//! adapters so both encode `Entry<T>` the same way.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CacheResult;

/// Encodes `value` to its JSON byte representation.
pub fn encode<T: Serialize>(value: &T) -> CacheResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Decodes `bytes` from their JSON byte representation.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CacheResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}
