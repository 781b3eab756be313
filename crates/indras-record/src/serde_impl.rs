//! Serde support for records
//!
//! A record serializes as its kind, page layout and entry list in
//! iteration order. Deserializing replays the entries through
//! [`Record::set`], so reserved-key rewrites apply as usual.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use crate::config::PageConfig;
use crate::op::Op;
use crate::record::{Record, RecordKind};

#[derive(Serialize)]
struct EntryRef<'a> {
    key: &'a str,
    value: Option<&'a str>,
    op: Op,
}

#[derive(Deserialize)]
struct OwnedEntry {
    key: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    op: Op,
}

#[derive(Deserialize)]
struct RecordRepr {
    #[serde(default)]
    kind: RecordKind,
    #[serde(default)]
    config: PageConfig,
    #[serde(default)]
    entries: Vec<OwnedEntry>,
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries: Vec<EntryRef<'_>> = self
            .iter()
            .map(|entry| EntryRef {
                key: entry.key,
                value: entry.value,
                op: entry.op,
            })
            .collect();

        let mut state = serializer.serialize_struct("Record", 3)?;
        state.serialize_field("kind", &self.kind)?;
        state.serialize_field("config", &self.config)?;
        state.serialize_field("entries", &entries)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = RecordRepr::deserialize(deserializer)?;
        let mut record = Record::with_config(repr.kind, repr.config).map_err(de::Error::custom)?;
        for entry in &repr.entries {
            record.set(&entry.key, entry.value.as_deref(), entry.op);
        }
        Ok(record)
    }
}
