use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::stream_log::error::Error;

/// Log-assigned entry identifier
///
/// Rendered as `<millis>-<seq>`. Identifiers are totally ordered: first by the
/// millisecond part, then by the sequence number within that millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntryId {
    /// Milliseconds part
    pub millis: u64,

    /// Sequence number within the millisecond
    pub seq: u64,
}

impl EntryId {
    /// Create an identifier from its two parts
    pub fn new(millis: u64, seq: u64) -> Self {
        Self { millis, seq }
    }

    /// The smallest identifier strictly greater than this one
    pub fn next(&self) -> Self {
        match self.seq.checked_add(1) {
            Some(seq) => Self::new(self.millis, seq),
            None => Self::new(self.millis + 1, 0),
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

impl FromStr for EntryId {
    type Err = Error;

    /// Parse `<millis>-<seq>`, or a bare `<millis>` which implies sequence 0
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::ValidationError(format!("Invalid entry id: {:?}", s));

        let (millis, seq) = match s.split_once('-') {
            Some((millis, seq)) => (millis, seq),
            None => (s, "0"),
        };

        let millis = millis.parse::<u64>().map_err(|_| invalid())?;
        let seq = seq.parse::<u64>().map_err(|_| invalid())?;

        Ok(Self { millis, seq })
    }
}

impl Serialize for EntryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One entry delivered from a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEntry {
    /// Identifier assigned by the log
    pub id: EntryId,

    /// Field/value payload
    pub fields: HashMap<String, String>,
}

impl StreamEntry {
    /// Create a new entry
    pub fn new(id: EntryId, fields: HashMap<String, String>) -> Self {
        Self { id, fields }
    }

    /// Look up a single field
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// The entries of one stream returned by a group read, in delivery order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamBatch {
    /// Stream the entries were read from
    pub stream: String,

    /// Entries in the order the log returned them
    pub entries: Vec<StreamEntry>,
}

impl StreamBatch {
    pub fn new(stream: impl Into<String>, entries: Vec<StreamEntry>) -> Self {
        Self {
            stream: stream.into(),
            entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
