//! JSON encoding of the list and map columns shared by the SQL backends.

use serde::{de::DeserializeOwned, Serialize};

use crate::StorageResult;

/// Encodes an optional value as JSON text, keeping `None` as SQL NULL.
pub(crate) fn encode_optional<T: Serialize>(value: &Option<T>) -> StorageResult<Option<String>> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(Into::into)
}

/// Encodes an optional value as JSON text, writing `empty` for `None`.
pub(crate) fn encode_or_empty<T: Serialize>(
    value: &Option<T>,
    empty: &str,
) -> StorageResult<String> {
    match value {
        Some(value) => Ok(serde_json::to_string(value)?),
        None => Ok(empty.to_string()),
    }
}

/// Decodes a nullable JSON column. Malformed text is an error.
pub(crate) fn decode_optional<T: DeserializeOwned>(text: Option<&str>) -> StorageResult<Option<T>> {
    text.map(serde_json::from_str).transpose().map_err(Into::into)
}

/// Decodes a JSON column where the empty literal stands for "absent".
pub(crate) fn decode_collapsed<T: DeserializeOwned>(
    text: Option<&str>,
    empty: &str,
) -> StorageResult<Option<T>> {
    match text {
        None => Ok(None),
        Some(t) if t == empty => Ok(None),
        Some(t) => Ok(Some(serde_json::from_str(t)?)),
    }
}
