//! Slot references and the placement policy
//!
//! A slot holds a key reference, a value reference and an [`Op`]. Each
//! reference is one of four encodings:
//!
//! ```text
//! Free     no payload
//! Dict     index into a well-known key table, no arena bytes
//! Inline   offset + span of a NUL-terminated string in the page arena
//! Extern   offset of a pointer-sized placeholder in the arena; the string
//!          itself is owned by the reference
//! ```

use crate::keys::DictKey;
use crate::op::Op;

/// Arena bytes reserved for an extern reference
pub const EXTERN_REF_SIZE: usize = std::mem::size_of::<usize>();

/// One encoded key or value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) enum SlotRef {
    #[default]
    Free,
    Dict(DictKey),
    Inline {
        offset: u16,
        span: u16,
    },
    Extern {
        offset: u16,
        string: Box<str>,
    },
}

impl SlotRef {
    pub(crate) fn is_free(&self) -> bool {
        matches!(self, SlotRef::Free)
    }

    /// Arena range owned by this reference, if any
    pub(crate) fn arena_range(&self) -> Option<(usize, usize)> {
        match self {
            SlotRef::Inline { offset, span } => {
                let start = *offset as usize;
                Some((start, start + *span as usize))
            }
            SlotRef::Extern { offset, .. } => {
                let start = *offset as usize;
                Some((start, start + EXTERN_REF_SIZE))
            }
            SlotRef::Free | SlotRef::Dict(_) => None,
        }
    }
}

/// One (key, value, op) location in a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Slot {
    pub(crate) key: SlotRef,
    pub(crate) value: SlotRef,
    pub(crate) op: Op,
}

impl Slot {
    pub(crate) fn is_free(&self) -> bool {
        self.key.is_free()
    }
}

/// How one string of a pair will be stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    /// Nothing to store (absent value)
    Absent,
    Dict(DictKey),
    Inline,
    Extern,
}

impl Placement {
    fn cost(self, len: usize) -> usize {
        match self {
            Placement::Absent | Placement::Dict(_) => 0,
            Placement::Inline => len + 1,
            Placement::Extern => EXTERN_REF_SIZE,
        }
    }
}

/// Placements chosen for a key/value pair on one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PairPlan {
    pub(crate) key: Placement,
    pub(crate) value: Placement,
}

impl PairPlan {
    fn cost(&self, key_len: usize, value_len: usize) -> usize {
        self.key.cost(key_len) + self.value.cost(value_len)
    }
}

/// Choose placements for a pair given `available` arena bytes
///
/// Inline first; if the pair does not fit, the larger inline side goes
/// extern, then both. Returns `None` when not even the placeholders fit.
pub(crate) fn plan_pair(key: &str, value: Option<&str>, available: usize) -> Option<PairPlan> {
    let key_len = key.len();
    let value_len = value.map_or(0, str::len);

    let mut plan = PairPlan {
        key: DictKey::lookup(key).map_or(Placement::Inline, Placement::Dict),
        value: if value.is_some() {
            Placement::Inline
        } else {
            Placement::Absent
        },
    };
    if plan.cost(key_len, value_len) <= available {
        return Some(plan);
    }

    let key_inline = plan.key.cost(key_len);
    let value_inline = plan.value.cost(value_len);
    if value_inline >= key_inline && plan.value == Placement::Inline {
        plan.value = Placement::Extern;
    } else if plan.key == Placement::Inline {
        plan.key = Placement::Extern;
    }
    if plan.cost(key_len, value_len) <= available {
        return Some(plan);
    }

    if plan.key == Placement::Inline {
        plan.key = Placement::Extern;
    }
    if plan.value == Placement::Inline {
        plan.value = Placement::Extern;
    }
    if plan.cost(key_len, value_len) <= available {
        return Some(plan);
    }
    None
}

/// Placement for a lone value on one page
pub(crate) fn plan_value(value: &str, available: usize) -> Option<Placement> {
    if Placement::Inline.cost(value.len()) <= available {
        Some(Placement::Inline)
    } else if EXTERN_REF_SIZE <= available {
        Some(Placement::Extern)
    } else {
        None
    }
}
