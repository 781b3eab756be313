//! Fixed-capacity storage page
//!
//! A page is a fixed array of slots plus an append-only arena. Inline
//! strings are written at the arena cursor followed by a NUL; extern strings
//! reserve a pointer-sized placeholder at the cursor instead. Space is never
//! compacted. The only reclamation is rolling the cursor back when the
//! released allocation is the last one in the arena.

use tracing::trace;

use crate::config::PageConfig;
use crate::op::Op;
use crate::slot::{plan_pair, plan_value, Placement, Slot, SlotRef, EXTERN_REF_SIZE};

#[derive(Debug, Clone)]
pub(crate) struct Page {
    slots: Vec<Slot>,
    /// Used arena bytes; `arena.len()` is the data cursor
    arena: String,
    arena_size: usize,
    /// Bytes held by extern strings
    mem_size: usize,
    /// Occupied slots
    count: usize,
}

impl Page {
    pub(crate) fn new(config: &PageConfig) -> Self {
        Self {
            slots: vec![Slot::default(); config.slots],
            arena: String::with_capacity(config.arena_size),
            arena_size: config.arena_size,
            mem_size: 0,
            count: 0,
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    pub(crate) fn data_size(&self) -> usize {
        self.arena.len()
    }

    pub(crate) fn mem_size(&self) -> usize {
        self.mem_size
    }

    pub(crate) fn available(&self) -> usize {
        self.arena_size - self.arena.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn slot(&self, idx: usize) -> &Slot {
        &self.slots[idx]
    }

    pub(crate) fn find_free_slot(&self) -> Option<usize> {
        self.slots.iter().position(Slot::is_free)
    }

    /// Borrow the string behind a reference; `None` for a free reference
    pub(crate) fn decode<'a>(&'a self, slot_ref: &'a SlotRef) -> Option<&'a str> {
        match slot_ref {
            SlotRef::Free => None,
            SlotRef::Dict(dict) => Some(dict.as_str()),
            SlotRef::Inline { offset, span } => {
                let start = *offset as usize;
                let bytes = &self.arena[start..start + *span as usize];
                Some(match bytes.find('\0') {
                    Some(end) => &bytes[..end],
                    None => bytes,
                })
            }
            SlotRef::Extern { string, .. } => Some(&**string),
        }
    }

    /// Key of an occupied slot
    pub(crate) fn key_at(&self, idx: usize) -> &str {
        self.decode(&self.slots[idx].key).unwrap_or_default()
    }

    pub(crate) fn value_at(&self, idx: usize) -> Option<&str> {
        self.decode(&self.slots[idx].value)
    }

    pub(crate) fn op_at(&self, idx: usize) -> Op {
        self.slots[idx].op
    }

    pub(crate) fn set_op(&mut self, idx: usize, op: Op) {
        self.slots[idx].op = op;
    }

    fn encode(&mut self, placement: Placement, s: &str) -> SlotRef {
        let offset = self.arena.len() as u16;
        match placement {
            Placement::Absent => SlotRef::Free,
            Placement::Dict(dict) => SlotRef::Dict(dict),
            Placement::Inline => {
                self.arena.push_str(s);
                self.arena.push('\0');
                SlotRef::Inline {
                    offset,
                    span: (s.len() + 1) as u16,
                }
            }
            Placement::Extern => {
                self.arena.extend(std::iter::repeat_n('\0', EXTERN_REF_SIZE));
                self.mem_size += s.len();
                trace!(offset, len = s.len(), "placing extern string");
                SlotRef::Extern {
                    offset,
                    string: s.into(),
                }
            }
        }
    }

    /// Write a pair into free slot `idx` if the arena has room for it
    pub(crate) fn try_place(&mut self, idx: usize, key: &str, value: Option<&str>, op: Op) -> bool {
        debug_assert!(self.slots[idx].is_free());
        let Some(plan) = plan_pair(key, value, self.available()) else {
            return false;
        };
        let key_ref = self.encode(plan.key, key);
        let value_ref = match value {
            Some(value) => self.encode(plan.value, value),
            None => SlotRef::Free,
        };
        self.slots[idx] = Slot {
            key: key_ref,
            value: value_ref,
            op,
        };
        self.count += 1;
        true
    }

    /// Store a value for the occupied slot `idx` whose value is free
    pub(crate) fn try_place_value(&mut self, idx: usize, value: &str) -> bool {
        debug_assert!(self.slots[idx].value.is_free());
        let Some(placement) = plan_value(value, self.available()) else {
            return false;
        };
        self.slots[idx].value = self.encode(placement, value);
        true
    }

    /// Overwrite the value of slot `idx` inside the space it already owns
    pub(crate) fn overwrite_in_place(&mut self, idx: usize, value: &str) -> bool {
        if let SlotRef::Inline { offset, span } = self.slots[idx].value {
            let span = span as usize;
            if value.len() + 1 > span {
                return false;
            }
            let start = offset as usize;
            let mut fill = String::with_capacity(span);
            fill.push_str(value);
            fill.extend(std::iter::repeat_n('\0', span - value.len()));
            self.arena.replace_range(start..start + span, &fill);
            return true;
        }
        if let SlotRef::Extern { string, .. } = &mut self.slots[idx].value {
            if value.len() > string.len() {
                return false;
            }
            self.mem_size = self.mem_size - string.len() + value.len();
            *string = value.into();
            return true;
        }
        false
    }

    /// Clear the value of slot `idx`, keeping its key
    pub(crate) fn release_value(&mut self, idx: usize) {
        let old = std::mem::take(&mut self.slots[idx].value);
        self.release(old);
    }

    /// Clear slot `idx` entirely
    pub(crate) fn release_slot(&mut self, idx: usize) {
        if self.slots[idx].is_free() {
            return;
        }
        let slot = std::mem::take(&mut self.slots[idx]);
        // value was written after its key, so release it first
        self.release(slot.value);
        self.release(slot.key);
        self.count -= 1;
    }

    fn release(&mut self, slot_ref: SlotRef) {
        if let Some((start, end)) = slot_ref.arena_range() {
            if end == self.arena.len() {
                trace!(from = end, to = start, "reclaiming last arena allocation");
                self.arena.truncate(start);
            }
        }
        if let SlotRef::Extern { string, .. } = slot_ref {
            self.mem_size -= string.len();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(slots: usize, arena_size: usize) -> Page {
        Page::new(&PageConfig::new(slots, arena_size))
    }

    #[test]
    fn test_new_page_is_empty() {
        let page = page(4, 64);
        assert_eq!(page.count(), 0);
        assert_eq!(page.data_size(), 0);
        assert_eq!(page.available(), 64);
        assert_eq!(page.capacity(), 4);
        assert_eq!(page.find_free_slot(), Some(0));
    }

    #[test]
    fn test_inline_pair_round_trip() {
        let mut page = page(4, 64);
        assert!(page.try_place(0, "color", Some("blue"), Op::NULL));
        assert_eq!(page.key_at(0), "color");
        assert_eq!(page.value_at(0), Some("blue"));
        assert_eq!(page.data_size(), "color\0blue\0".len());
        assert_eq!(page.count(), 1);
        assert_eq!(page.find_free_slot(), Some(1));
    }

    #[test]
    fn test_dictionary_key_uses_no_arena() {
        let mut page = page(4, 64);
        assert!(page.try_place(0, "Host", Some("h1"), Op::NULL));
        assert!(matches!(page.slot(0).key, SlotRef::Dict(_)));
        assert_eq!(page.key_at(0), "Host");
        assert_eq!(page.data_size(), 3);
    }

    #[test]
    fn test_extern_value_accounting() {
        let mut page = page(4, 32);
        let long = "x".repeat(100);
        assert!(page.try_place(0, "k", Some(&long), Op::NULL));
        assert!(matches!(page.slot(0).value, SlotRef::Extern { .. }));
        assert_eq!(page.value_at(0), Some(long.as_str()));
        assert_eq!(page.mem_size(), 100);
        assert_eq!(page.data_size(), 2 + EXTERN_REF_SIZE);

        page.release_slot(0);
        assert_eq!(page.mem_size(), 0);
        assert_eq!(page.count(), 0);
    }

    #[test]
    fn test_absent_value() {
        let mut page = page(2, 16);
        assert!(page.try_place(0, "flag", None, Op::NULL));
        assert_eq!(page.key_at(0), "flag");
        assert_eq!(page.value_at(0), None);
    }

    #[test]
    fn test_place_fails_when_full() {
        let mut page = page(2, 2 * EXTERN_REF_SIZE);
        let long = "y".repeat(40);
        assert!(page.try_place(0, &long, Some(&long), Op::NULL));
        assert_eq!(page.available(), 0);
        assert!(!page.try_place(1, &long, Some(&long), Op::NULL));
        assert_eq!(page.count(), 1);
    }

    #[test]
    fn test_overwrite_in_place_pads_span() {
        let mut page = page(4, 64);
        page.try_place(0, "k", Some("hello"), Op::NULL);
        page.try_place(1, "j", Some("z"), Op::NULL);
        let before = page.data_size();

        assert!(page.overwrite_in_place(0, "hi"));
        assert_eq!(page.value_at(0), Some("hi"));
        assert_eq!(page.value_at(1), Some("z"));
        assert_eq!(page.data_size(), before);

        // the padded span still belongs to the value
        assert!(page.overwrite_in_place(0, "howdy"));
        assert_eq!(page.value_at(0), Some("howdy"));
        assert!(!page.overwrite_in_place(0, "greetings"));
    }

    #[test]
    fn test_overwrite_extern_in_place() {
        let mut page = page(4, 16);
        let long = "x".repeat(50);
        page.try_place(0, "k", Some(&long), Op::NULL);
        assert!(page.overwrite_in_place(0, "short"));
        assert_eq!(page.value_at(0), Some("short"));
        assert_eq!(page.mem_size(), 5);
        assert!(!page.overwrite_in_place(0, &long));
    }

    #[test]
    fn test_shrink_last_reclaims_tail() {
        let mut page = page(4, 64);
        page.try_place(0, "a", Some("1"), Op::NULL);
        let after_first = page.data_size();
        page.try_place(1, "b", Some("2"), Op::NULL);

        page.release_slot(1);
        assert_eq!(page.data_size(), after_first);

        // releasing a non-last allocation leaves a hole
        page.try_place(1, "b", Some("2"), Op::NULL);
        let full = page.data_size();
        page.release_slot(0);
        assert_eq!(page.data_size(), full);
        assert_eq!(page.value_at(1), Some("2"));
    }

    #[test]
    fn test_release_value_keeps_key() {
        let mut page = page(4, 64);
        page.try_place(0, "k", Some("value"), Op::NULL);
        page.release_value(0);
        assert_eq!(page.key_at(0), "k");
        assert_eq!(page.value_at(0), None);
        assert_eq!(page.count(), 1);
        assert_eq!(page.data_size(), 2);

        assert!(page.try_place_value(0, "again"));
        assert_eq!(page.value_at(0), Some("again"));
    }
}
