//! CBOR serialization helpers (§6.5).
//!
//! Per-node `serialize`/`deserialize` use `serde`'s derive machinery.
//! [`crate::arena::Link`] has a hand-written impl that encodes as a bare
//! `u32`, skipping the map wrapper entirely; [`crate::expr::Expr`]'s and
//! [`crate::statement::Statement`]'s variant tags, and the `cycle` fields
//! the scheduler touches every statement, carry `#[serde(rename = "...")]`
//! short keys. This module is just the `ciborium` read/write entry point
//! shared by every node type.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{IrError, IrResult};

/// Serialize `value` to CBOR and write it to `writer`.
pub fn to_writer<T: Serialize>(value: &T, writer: impl std::io::Write) -> IrResult<()> {
    ciborium::into_writer(value, writer)
        .map_err(|e| IrError::Configuration(format!("CBOR encode failed: {e}")))
}

/// Deserialize a value of type `T` from a CBOR byte stream.
pub fn from_reader<T: DeserializeOwned>(reader: impl std::io::Read) -> IrResult<T> {
    ciborium::from_reader(reader)
        .map_err(|e| IrError::Configuration(format!("CBOR decode failed: {e}")))
}

/// Serialize `value` to an in-memory CBOR byte buffer.
pub fn to_vec<T: Serialize>(value: &T) -> IrResult<Vec<u8>> {
    let mut buf = Vec::new();
    to_writer(value, &mut buf)?;
    Ok(buf)
}

/// Deserialize a value of type `T` from an in-memory CBOR byte buffer.
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> IrResult<T> {
    from_reader(bytes)
}
