//! The record container
//!
//! A [`Record`] is an ordered chain of pages. Entries are visited in page
//! order, then slot order; that order is stable across mutations that do not
//! clear and re-add an entry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::PageConfig;
use crate::error::ConfigError;
use crate::keys::DictKey;
use crate::op::Op;
use crate::page::Page;
use crate::slot::SlotRef;

/// What a record represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RecordKind {
    /// A concrete log entry; ops are always [`Op::NULL`]
    #[default]
    Data,
    /// A conjunction of predicates; keys may repeat
    Query,
}

/// Restartable iteration position
///
/// Encodes a page ordinal in the upper 24 bits and a slot ordinal in the
/// lower 8. [`Cursor::END`] never names a real slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cursor(u32);

impl Cursor {
    /// First position of any record
    pub const START: Cursor = Cursor(0);
    /// Past the last entry
    pub const END: Cursor = Cursor(u32::MAX);

    pub(crate) fn new(page: usize, slot: usize) -> Self {
        debug_assert!(slot <= 0xff && page < 0x00ff_ffff);
        Cursor(((page as u32) << 8) | slot as u32)
    }

    /// Rebuild a cursor from [`Cursor::raw`]
    pub fn from_raw(raw: u32) -> Self {
        Cursor(raw)
    }

    /// The opaque integer value
    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_end(self) -> bool {
        self == Cursor::END
    }

    pub(crate) fn page(self) -> usize {
        (self.0 >> 8) as usize
    }

    pub(crate) fn slot(self) -> usize {
        (self.0 & 0xff) as usize
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor::START
    }
}

/// One borrowed (key, value, op) entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry<'a> {
    /// Position of this entry, usable with [`Record::unset_at`]
    pub cursor: Cursor,
    pub key: &'a str,
    /// `None` when the key is present without a value
    pub value: Option<&'a str>,
    pub op: Op,
}

/// Paged key/value/op record
pub struct Record {
    pub(crate) kind: RecordKind,
    pub(crate) config: PageConfig,
    pub(crate) pages: Vec<Page>,
}

impl Record {
    /// Create an empty record with the default page layout
    pub fn new(kind: RecordKind) -> Self {
        Self::from_valid_config(kind, PageConfig::default())
    }

    /// Create an empty data record
    pub fn data() -> Self {
        Self::new(RecordKind::Data)
    }

    /// Create an empty query record
    pub fn query() -> Self {
        Self::new(RecordKind::Query)
    }

    /// Create an empty record with a custom page layout
    pub fn with_config(kind: RecordKind, config: PageConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid_config(kind, config))
    }

    pub(crate) fn from_valid_config(kind: RecordKind, config: PageConfig) -> Self {
        Self {
            kind,
            config,
            pages: vec![Page::new(&config)],
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn is_query(&self) -> bool {
        self.kind == RecordKind::Query
    }

    pub fn config(&self) -> &PageConfig {
        &self.config
    }

    /// Number of entries across all pages
    pub fn count(&self) -> usize {
        self.pages.iter().map(Page::count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Number of pages in the chain
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Arena bytes in use across all pages
    pub fn data_size(&self) -> usize {
        self.pages.iter().map(Page::data_size).sum()
    }

    /// Bytes held by extern strings across all pages
    pub fn mem_size(&self) -> usize {
        self.pages.iter().map(Page::mem_size).sum()
    }

    /// Locate the first slot holding `key`
    pub(crate) fn find(&self, key: &str) -> Option<(usize, usize)> {
        let dict = DictKey::lookup(key);
        for (page_idx, page) in self.pages.iter().enumerate() {
            if page.count() == 0 {
                continue;
            }
            for slot_idx in 0..page.capacity() {
                let matched = match (&page.slot(slot_idx).key, dict) {
                    (SlotRef::Free, _) => false,
                    (SlotRef::Dict(stored), Some(wanted)) => *stored == wanted,
                    // interned keys are always stored interned
                    (SlotRef::Dict(_), None) | (_, Some(_)) => false,
                    (stored, None) => page.decode(stored) == Some(key),
                };
                if matched {
                    return Some((page_idx, slot_idx));
                }
            }
        }
        None
    }

    /// Value and op stored for `key`
    ///
    /// `None` means the key is missing; `Some((None, op))` means the key is
    /// present without a value.
    pub fn lookup(&self, key: &str) -> Option<(Option<&str>, Op)> {
        let (page_idx, slot_idx) = self.find(key)?;
        let page = &self.pages[page_idx];
        Some((page.value_at(slot_idx), page.op_at(slot_idx)))
    }

    /// Value stored for `key`, if both key and value are present
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lookup(key).and_then(|(value, _)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// First entry at or after `cursor`, and the cursor to resume from
    pub fn fetch(&self, cursor: Cursor) -> Option<(Entry<'_>, Cursor)> {
        if cursor.is_end() {
            return None;
        }
        let mut page_idx = cursor.page();
        let mut slot_idx = cursor.slot();
        while page_idx < self.pages.len() {
            let page = &self.pages[page_idx];
            while slot_idx < page.capacity() {
                if !page.slot(slot_idx).is_free() {
                    let entry = Entry {
                        cursor: Cursor::new(page_idx, slot_idx),
                        key: page.key_at(slot_idx),
                        value: page.value_at(slot_idx),
                        op: page.op_at(slot_idx),
                    };
                    return Some((entry, self.next_cursor(page_idx, slot_idx)));
                }
                slot_idx += 1;
            }
            page_idx += 1;
            slot_idx = 0;
        }
        None
    }

    fn next_cursor(&self, page_idx: usize, slot_idx: usize) -> Cursor {
        if slot_idx + 1 < self.pages[page_idx].capacity() {
            Cursor::new(page_idx, slot_idx + 1)
        } else if page_idx + 1 < self.pages.len() {
            Cursor::new(page_idx + 1, 0)
        } else {
            Cursor::END
        }
    }

    /// Iterate entries in storage order
    pub fn iter(&self) -> Entries<'_> {
        Entries {
            record: self,
            cursor: Cursor::START,
        }
    }

    /// Keys in storage order
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.iter().map(|entry| entry.key)
    }
}

/// Iterator over a record's entries, driven by [`Record::fetch`]
pub struct Entries<'a> {
    record: &'a Record,
    cursor: Cursor,
}

impl<'a> Iterator for Entries<'a> {
    type Item = Entry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (entry, next) = self.record.fetch(self.cursor)?;
        self.cursor = next;
        Some(entry)
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = Entry<'a>;
    type IntoIter = Entries<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::data()
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for entry in self.iter() {
            match entry.op {
                Op::NULL => map.entry(&entry.key, &entry.value),
                op => map.entry(&entry.key, &(entry.value, op)),
            };
        }
        map.finish()
    }
}
