use super::id::ConnectionId;
use crate::error::{Error, Result};

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

/// A single field value carried in a message [`Body`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Bytes(Vec<u8>),
    Duration(Duration),
    Connection(ConnectionId),
    Addr(SocketAddr),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

macro_rules! int_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Int(value as i64)
                }
            }
        )*
    };
}

int_value!(i32, i64, u16, u32, usize);

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Value {
    fn from(value: &[u8; N]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<Duration> for Value {
    fn from(value: Duration) -> Self {
        Value::Duration(value)
    }
}

impl From<ConnectionId> for Value {
    fn from(value: ConnectionId) -> Self {
        Value::Connection(value)
    }
}

impl From<SocketAddr> for Value {
    fn from(value: SocketAddr) -> Self {
        Value::Addr(value)
    }
}

/// Structured payload of an [`Envelope`](super::Envelope).
///
/// A body is an ordered map from field name to [`Value`]. Lookups are
/// typed: a getter returns `None` both when the field is absent and when
/// it holds a value of another type. The `require_*` variants turn that
/// into [`Error::InvalidArguments`] naming the field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body {
    fields: BTreeMap<String, Value>,
}

impl Body {
    /// Creates an empty body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the body with `key` set to `value`.
    ///
    /// ```rust,ignore
    /// let body = Body::new().with("host", "127.0.0.1").with("port", 9000);
    /// ```
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_owned(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(Value::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(Value::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Returns a byte field. Strings are read as their UTF-8 bytes.
    pub fn bytes(&self, key: &str) -> Option<&[u8]> {
        match self.get(key) {
            Some(Value::Bytes(b)) => Some(b),
            Some(Value::Str(s)) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Returns a duration field.
    ///
    /// Integer values are read as whole seconds.
    pub fn duration(&self, key: &str) -> Option<Duration> {
        match self.get(key) {
            Some(Value::Duration(d)) => Some(*d),
            Some(Value::Int(secs)) if *secs >= 0 => Some(Duration::from_secs(*secs as u64)),
            _ => None,
        }
    }

    pub fn connection(&self, key: &str) -> Option<ConnectionId> {
        match self.get(key) {
            Some(Value::Connection(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn addr(&self, key: &str) -> Option<SocketAddr> {
        match self.get(key) {
            Some(Value::Addr(addr)) => Some(*addr),
            _ => None,
        }
    }

    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.str(key).ok_or_else(|| missing(key, "a string"))
    }

    pub fn require_bytes(&self, key: &str) -> Result<&[u8]> {
        self.bytes(key).ok_or_else(|| missing(key, "bytes"))
    }

    pub fn require_connection(&self, key: &str) -> Result<ConnectionId> {
        self.connection(key)
            .ok_or_else(|| missing(key, "a connection id"))
    }

    /// Reads a TCP port, rejecting values outside `0..=65535`.
    pub fn require_port(&self, key: &str) -> Result<u16> {
        let raw = self.int(key).ok_or_else(|| missing(key, "a port number"))?;

        u16::try_from(raw)
            .map_err(|_| Error::InvalidArguments(format!("`{key}` is out of range: {raw}")))
    }
}

fn missing(key: &str, expected: &str) -> Error {
    Error::InvalidArguments(format!("`{key}` must be present and hold {expected}"))
}
