//! Boundary value model.
//!
//! Every argument and result crossing the isolation boundary is a
//! [`Value`]. Values are passed by structured clone: a CBOR
//! serialize/deserialize round trip that severs any aliasing with the
//! caller's data, the same guarantee a message-passing boundary gives.

use serde::{Deserialize, Serialize};

use crate::error::SandboxError;

/// A value that can cross the isolation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Absent or intentionally empty result.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Signed integer (iteration counts, lengths).
    Int(i64),
    /// UTF-8 text (passwords, usage literals, file names).
    Text(String),
    /// Raw bytes (payloads, salts, DER buffers).
    Bytes(Vec<u8>),
    /// Opaque key handle minted by a session's key cache.
    Handle(String),
    /// Ordered collection of values.
    List(Vec<Value>),
}

impl Value {
    /// Borrow as text.
    pub fn as_text(&self) -> Result<&str, SandboxError> {
        match self {
            Self::Text(s) => Ok(s),
            other => Err(type_error("text", other)),
        }
    }

    /// Borrow as bytes.
    pub fn as_bytes(&self) -> Result<&[u8], SandboxError> {
        match self {
            Self::Bytes(b) => Ok(b),
            other => Err(type_error("bytes", other)),
        }
    }

    /// Read as a boolean.
    pub fn as_bool(&self) -> Result<bool, SandboxError> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(type_error("bool", other)),
        }
    }

    /// Read as an integer.
    pub fn as_int(&self) -> Result<i64, SandboxError> {
        match self {
            Self::Int(n) => Ok(*n),
            other => Err(type_error("int", other)),
        }
    }

    /// Borrow as a key handle.
    pub fn as_handle(&self) -> Result<&str, SandboxError> {
        match self {
            Self::Handle(h) => Ok(h),
            other => Err(type_error("handle", other)),
        }
    }

    /// Borrow as a list.
    pub fn as_list(&self) -> Result<&[Value], SandboxError> {
        match self {
            Self::List(items) => Ok(items),
            other => Err(type_error("list", other)),
        }
    }

    /// Name of this variant, for diagnostics.
    fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Handle(_) => "handle",
            Self::List(_) => "list",
        }
    }
}

fn type_error(expected: &str, got: &Value) -> SandboxError {
    SandboxError::InvalidArgument(format!("expected {expected}, got {}", got.kind()))
}

/// Fetch a positional argument.
pub fn arg(args: &[Value], index: usize) -> Result<&Value, SandboxError> {
    args.get(index)
        .ok_or_else(|| SandboxError::InvalidArgument(format!("missing argument {index}")))
}

/// Pass a value through a serialize/deserialize round trip.
///
/// Models the copy semantics of the isolation boundary: the returned
/// value shares no storage with the input.
pub fn structured_clone(value: &Value) -> Result<Value, SandboxError> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| SandboxError::Transport(e.to_string()))?;
    ciborium::de::from_reader(buf.as_slice()).map_err(|e| SandboxError::Transport(e.to_string()))
}
