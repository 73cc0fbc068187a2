//! Object identifiers.
//!
//! Servers identify instances, tables and tablets by a UUID that appears on
//! the wire either as 16 raw bytes or as a 32 character hex string.

use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(Uuid);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid object id: {0}")]
pub struct InvalidObjectId(String);

impl ObjectId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Parses an id as it appears in a protobuf `bytes` field: either 16 raw
    /// bytes or the ASCII hex form.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, InvalidObjectId> {
        if let Ok(raw) = <[u8; 16]>::try_from(bytes) {
            return Ok(Self::from_bytes(raw));
        }
        let text = std::str::from_utf8(bytes)
            .map_err(|_| InvalidObjectId(format!("{} non-utf8 bytes", bytes.len())))?;
        text.parse()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl FromStr for ObjectId {
    type Err = InvalidObjectId;

    /// Accepts both the 32 character simple form and the hyphenated form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| InvalidObjectId(s.to_string()))
    }
}

impl From<Uuid> for ObjectId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}
