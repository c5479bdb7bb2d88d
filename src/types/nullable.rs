//! Serde helper for fields that some backends send as `null` instead of omitting.
//!
//! Use with `#[serde(default, deserialize_with = "crate::types::nullable::deserialize")]`.

use serde::{Deserialize, Deserializer};

/// Deserialize a value, mapping `null` to the type's default.
pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
