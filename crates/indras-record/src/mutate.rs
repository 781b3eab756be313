//! Record mutation
//!
//! Mutators never fail: when no existing page can take an entry, a new page
//! is appended to the chain.

use tracing::trace;

use crate::keys::{self, LEVEL, LEVEL_DEBUG, MESSAGE};
use crate::op::Op;
use crate::page::Page;
use crate::record::{Cursor, Record, RecordKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetMode {
    /// Replace the first entry with the same key, if any
    Upsert,
    /// Always add a new entry
    Append,
}

/// Apply the reserved-key rewrites to a value before it is stored
fn normalize_value<'a>(kind: RecordKind, key: &str, value: Option<&'a str>) -> Option<&'a str> {
    let value = value?;
    match key {
        LEVEL => match keys::normalize_level(value) {
            Some(level) => Some(level),
            // a query may hold a pattern or numeric bound instead of a level
            None if kind == RecordKind::Query => Some(value),
            None => Some(LEVEL_DEBUG),
        },
        MESSAGE => Some(keys::trim_message(value)),
        _ => Some(value),
    }
}

impl Record {
    /// Store `key` with `value` and `op`
    ///
    /// Data records keep one entry per key and always store [`Op::NULL`].
    /// Query records keep `op` and always append, since a query may test the
    /// same key more than once.
    pub fn set(&mut self, key: &str, value: Option<&str>, op: Op) {
        let mode = match self.kind {
            RecordKind::Data => SetMode::Upsert,
            RecordKind::Query => SetMode::Append,
        };
        self.set_with_mode(key, value, op, mode);
    }

    /// Store `key` with `value`, replacing any existing entry even in a query
    pub fn upsert(&mut self, key: &str, value: Option<&str>, op: Op) {
        self.set_with_mode(key, value, op, SetMode::Upsert);
    }

    fn set_with_mode(&mut self, key: &str, value: Option<&str>, op: Op, mode: SetMode) {
        let op = match self.kind {
            RecordKind::Data => Op::NULL,
            RecordKind::Query => op,
        };
        let value = normalize_value(self.kind, key, value);

        if mode == SetMode::Upsert {
            if let Some(position) = self.find(key) {
                self.update_existing(position, key, value, op);
                return;
            }
        }
        self.add(key, value, op);
    }

    fn update_existing(&mut self, (page_idx, slot_idx): (usize, usize), key: &str, value: Option<&str>, op: Op) {
        let page = &mut self.pages[page_idx];
        match value {
            None => {
                page.release_value(slot_idx);
                page.set_op(slot_idx, op);
            }
            Some(value) if page.value_at(slot_idx) == Some(value) => {
                page.set_op(slot_idx, op);
            }
            Some(value) if page.overwrite_in_place(slot_idx, value) => {
                page.set_op(slot_idx, op);
            }
            Some(value) if page.slot(slot_idx).value.is_free() && page.try_place_value(slot_idx, value) => {
                page.set_op(slot_idx, op);
            }
            Some(value) => {
                page.release_slot(slot_idx);
                // keep the entry where it was when the page still has room
                if !page.try_place(slot_idx, key, Some(value), op) {
                    self.add(key, Some(value), op);
                }
            }
        }
    }

    fn add(&mut self, key: &str, value: Option<&str>, op: Op) {
        for page in &mut self.pages {
            if let Some(slot_idx) = page.find_free_slot() {
                if page.try_place(slot_idx, key, value, op) {
                    return;
                }
            }
        }

        let mut page = Page::new(&self.config);
        let placed = page.try_place(0, key, value, op);
        // a validated layout always fits one pair of extern placeholders
        debug_assert!(placed, "fresh page rejected a pair");
        trace!(pages = self.pages.len() + 1, key, "appending record page");
        self.pages.push(page);
    }

    /// Remove the first entry for `key`; returns whether one was removed
    pub fn unset(&mut self, key: &str) -> bool {
        match self.find(key) {
            Some((page_idx, slot_idx)) => {
                self.pages[page_idx].release_slot(slot_idx);
                true
            }
            None => false,
        }
    }

    /// Remove the entry at `cursor`; returns whether one was removed
    pub fn unset_at(&mut self, cursor: Cursor) -> bool {
        if cursor.is_end() {
            return false;
        }
        let Some(page) = self.pages.get_mut(cursor.page()) else {
            return false;
        };
        if cursor.slot() >= page.capacity() || page.slot(cursor.slot()).is_free() {
            return false;
        }
        page.release_slot(cursor.slot());
        true
    }

    /// Copy every entry of `source` whose key is not already present
    pub fn merge_from(&mut self, source: &Record) {
        for entry in source {
            if !self.contains_key(entry.key) {
                self.set_with_mode(entry.key, entry.value, entry.op, SetMode::Append);
            }
        }
    }

    /// Store every entry of `source`, overwriting existing keys
    pub fn replace_from(&mut self, source: &Record) {
        for entry in source {
            self.set_with_mode(entry.key, entry.value, entry.op, SetMode::Upsert);
        }
    }

    /// Independent copy with the same kind, layout and entries
    pub fn copy(&self) -> Record {
        let mut copy = Record {
            kind: self.kind,
            config: self.config,
            pages: vec![Page::new(&self.config)],
        };
        for entry in self {
            copy.add(entry.key, entry.value, entry.op);
        }
        copy
    }
}

impl Clone for Record {
    fn clone(&self) -> Self {
        self.copy()
    }
}

/// Merge `source` into `target`, or copy it when there is no target
pub fn merge(target: Option<Record>, source: &Record) -> Record {
    match target {
        Some(mut target) => {
            target.merge_from(source);
            target
        }
        None => source.copy(),
    }
}

/// Upsert every entry of `source` into `target`
pub fn replace(target: &mut Record, source: &Record) {
    target.replace_from(source);
}
