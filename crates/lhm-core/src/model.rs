//! Server record model
//!
//! A [`ServerRecord`] is the only entity in the registry. Its fields are
//! private so that the derived `url` can never drift from `host`, `port` and
//! the scheme flag: the url is computed on construction and again on every
//! deserialization, whatever the input said.
//!
//! ## Wire Format
//!
//! ```json
//! {
//!   "id": 1736424000000,
//!   "host": "localhost",
//!   "label": "Vite",
//!   "port": 5173,
//!   "isSecure": false,
//!   "url": "http://localhost:5173"
//! }
//! ```
//!
//! The legacy `isHttps` key is accepted on input. Unknown keys are kept and
//! written back unchanged.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::num::NonZeroU16;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Host used when the user leaves the host field empty
pub const DEFAULT_HOST: &str = "localhost";

/// Server identifier
///
/// Identifiers created by this crate are always integers. The other forms
/// only enter through imported or previously stored data and are written
/// back exactly as they came in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServerId {
    /// Positive integer identifier (the form produced by [`crate::IdGenerator`])
    Int(u64),
    /// Any other non-zero JSON number, e.g. `1736424000000.25` or `-3`
    Number(Number),
    /// Any non-empty string
    Text(String),
}

impl ServerId {
    /// Interpret a JSON value as an identifier
    ///
    /// Only "truthy" values yield an identifier: `0`, `""`, `null`, booleans,
    /// arrays and objects are treated as missing. Numbers stay numbers.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_u64() {
                Some(0) => None,
                Some(int) => Some(Self::Int(int)),
                None if n.as_f64() == Some(0.0) => None,
                None => Some(Self::Number(n.clone())),
            },
            Value::String(s) if !s.is_empty() => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// The integer value, if this is an integer identifier
    pub fn as_int(&self) -> Option<u64> {
        match self {
            Self::Int(int) => Some(*int),
            Self::Number(_) | Self::Text(_) => None,
        }
    }

    /// Whether `text` is how this id is displayed
    ///
    /// Command-line arguments cannot say whether `42` meant the number or
    /// the string, so lookups by user input compare displayed forms.
    pub fn matches_display(&self, text: &str) -> bool {
        let text = text.trim();
        match self {
            Self::Int(int) => text.parse::<u64>() == Ok(*int),
            Self::Number(n) => n.to_string() == text,
            Self::Text(own) => own == text,
        }
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(int) => write!(f, "{}", int),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl FromStr for ServerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::validation("Server id cannot be empty"));
        }
        Ok(match s.parse::<u64>() {
            Ok(int) => Self::Int(int),
            Err(_) => Self::Text(s.to_string()),
        })
    }
}

impl From<u64> for ServerId {
    fn from(int: u64) -> Self {
        Self::Int(int)
    }
}

impl Serialize for ServerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Int(int) => serializer.serialize_u64(*int),
            Self::Number(n) => n.serialize(serializer),
            Self::Text(text) => serializer.serialize_str(text),
        }
    }
}

impl<'de> Deserialize<'de> for ServerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid server id: {}", value)))
    }
}

/// URL scheme of a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Pick the scheme from the `isSecure` flag
    pub fn from_secure(is_secure: bool) -> Self {
        if is_secure { Self::Https } else { Self::Http }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the canonical url of a server
pub fn build_url(host: &str, port: NonZeroU16, is_secure: bool) -> String {
    format!("{}://{}:{}", Scheme::from_secure(is_secure), host, port)
}

/// Default label for a server without one
pub fn default_label(port: NonZeroU16) -> String {
    format!("Port {}", port)
}

/// Parse user-entered port text
///
/// The text must be present and be a whole number in `1..=65535`.
pub fn parse_port(text: &str) -> Result<NonZeroU16> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::validation("Please enter a port"));
    }

    let value: i64 = text
        .parse()
        .map_err(|_| Error::validation(format!("Port must be a number, got '{}'", text)))?;

    u16::try_from(value)
        .ok()
        .and_then(NonZeroU16::new)
        .ok_or_else(|| Error::validation("Port must be between 1 and 65535"))
}

/// A registered server endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RecordRepr", into = "RecordRepr")]
pub struct ServerRecord {
    id: ServerId,
    host: String,
    label: String,
    port: NonZeroU16,
    is_secure: bool,
    url: String,
    extra: Map<String, Value>,
}

impl ServerRecord {
    /// Create a new record
    ///
    /// `host` and `label` must be non-empty; defaults are applied by the
    /// caller (see [`crate::RegistryStore::add`]).
    pub fn new(
        id: ServerId,
        host: impl Into<String>,
        label: impl Into<String>,
        port: NonZeroU16,
        is_secure: bool,
    ) -> Result<Self> {
        let host = host.into();
        let label = label.into();

        if host.is_empty() {
            return Err(Error::validation("Host cannot be empty"));
        }
        if label.is_empty() {
            return Err(Error::validation("Label cannot be empty"));
        }

        Ok(Self {
            url: build_url(&host, port, is_secure),
            id,
            host,
            label,
            port,
            is_secure,
            extra: Map::new(),
        })
    }

    /// Attach unrecognized fields carried over from an imported element
    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = extra;
        self
    }

    pub fn id(&self) -> &ServerId {
        &self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn port(&self) -> NonZeroU16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.is_secure
    }

    pub fn scheme(&self) -> Scheme {
        Scheme::from_secure(self.is_secure)
    }

    /// Always `{scheme}://{host}:{port}`
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fields this crate does not interpret
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Same id replaced, everything else kept
    pub(crate) fn with_id(mut self, id: ServerId) -> Self {
        self.id = id;
        self
    }

    /// Compare the user-visible content, ignoring the identifier
    pub fn same_endpoint(&self, other: &Self) -> bool {
        self.host == other.host
            && self.label == other.label
            && self.port == other.port
            && self.is_secure == other.is_secure
    }
}

/// Serialized shape of a [`ServerRecord`]
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordRepr {
    id: ServerId,
    host: String,
    label: String,
    port: u16,
    #[serde(default, alias = "isHttps")]
    is_secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TryFrom<RecordRepr> for ServerRecord {
    type Error = Error;

    fn try_from(repr: RecordRepr) -> Result<Self> {
        let port = NonZeroU16::new(repr.port)
            .ok_or_else(|| Error::validation("Port must be between 1 and 65535"))?;
        // The stored url is ignored and recomputed.
        Ok(ServerRecord::new(repr.id, repr.host, repr.label, port, repr.is_secure)?
            .with_extra(repr.extra))
    }
}

impl From<ServerRecord> for RecordRepr {
    fn from(record: ServerRecord) -> Self {
        Self {
            id: record.id,
            host: record.host,
            label: record.label,
            port: record.port.get(),
            is_secure: record.is_secure,
            url: Some(record.url),
            extra: record.extra,
        }
    }
}
