//! Comparison operators carried by query terms
//!
//! An [`Op`] packs a [`Relation`] (low three bits) with independent
//! [`Modifiers`]. Data records always carry [`Op::NULL`].

use std::cmp::Ordering;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// How a query term compares its value
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Modifiers: u32 {
        /// ASCII case-insensitive comparison
        const CASEFOLD = 0x0010;
        const PREFIX = 0x0020;
        const SUFFIX = 0x0040;
        /// Prefix and suffix together: match anywhere
        const SUBSTRING = Self::PREFIX.bits() | Self::SUFFIX.bits();
        /// Compare as integers
        const NUMERIC = 0x0080;
        const REGEX = 0x0100;
    }
}

/// Relation plus modifier flags for one query term
///
/// Serialized as its raw bits; undefined bits are dropped on the way in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Op(u32);

impl Op {
    /// No relation and no modifiers: the key must be absent
    pub const NULL: Op = Op(0x0000);
    pub const EQUAL: Op = Op::relation_only(Relation::Equal);
    pub const GREATER: Op = Op::relation_only(Relation::Greater);
    pub const GREATER_EQUAL: Op = Op::relation_only(Relation::GreaterEqual);
    pub const LESS: Op = Op::relation_only(Relation::Less);
    pub const LESS_EQUAL: Op = Op::relation_only(Relation::LessEqual);
    pub const NOT_EQUAL: Op = Op::relation_only(Relation::NotEqual);
    /// The key must be present, whatever its value
    pub const TRUE: Op = Op::relation_only(Relation::True);

    pub const CASEFOLD: Op = Op(Modifiers::CASEFOLD.bits());
    pub const PREFIX: Op = Op(Modifiers::PREFIX.bits());
    pub const SUFFIX: Op = Op(Modifiers::SUFFIX.bits());
    pub const SUBSTRING: Op = Op(Modifiers::SUBSTRING.bits());
    pub const NUMERIC: Op = Op(Modifiers::NUMERIC.bits());
    pub const REGEX: Op = Op(Modifiers::REGEX.bits());

    const RELATION_MASK: u32 = 0x0007;

    const fn relation_only(relation: Relation) -> Self {
        Op(relation as u32)
    }

    /// Combine a relation with modifiers
    pub const fn new(relation: Relation, modifiers: Modifiers) -> Self {
        Op(modifiers.bits() | relation as u32)
    }

    /// Build an op from raw bits, dropping undefined ones
    pub fn from_bits(bits: u32) -> Self {
        Self::new(
            Relation::from_bits(bits & Self::RELATION_MASK),
            Modifiers::from_bits_truncate(bits),
        )
    }

    /// Raw bit value
    pub fn bits(self) -> u32 {
        self.0
    }

    /// The relation part
    pub fn relation(self) -> Relation {
        Relation::from_bits(self.0 & Self::RELATION_MASK)
    }

    /// The modifier part
    pub fn modifiers(self) -> Modifiers {
        Modifiers::from_bits_truncate(self.0)
    }

    /// Same modifiers, different relation
    pub fn with_relation(self, relation: Relation) -> Self {
        Self::new(relation, self.modifiers())
    }

    /// Text token for this op, as used inside a query term
    pub fn to_token(self) -> String {
        if self == Op::NULL {
            return ".".to_string();
        }
        let modifiers = self.modifiers();
        let mut token = String::with_capacity(4);
        if modifiers.contains(Modifiers::CASEFOLD) {
            token.push('C');
        }
        if modifiers.contains(Modifiers::REGEX) {
            token.push('R');
        }
        if modifiers.contains(Modifiers::NUMERIC) {
            token.push('N');
        }
        if modifiers.contains(Modifiers::SUBSTRING) {
            token.push('S');
        } else if modifiers.contains(Modifiers::PREFIX) {
            token.push('A');
        } else if modifiers.contains(Modifiers::SUFFIX) {
            token.push('Z');
        }
        token.push_str(self.relation().symbol());
        token
    }

    /// Parse an op token; `None` if the token is not an op
    pub fn parse_token(token: &str) -> Option<Self> {
        if token == "." {
            return Some(Op::NULL);
        }
        if token.is_empty() {
            return None;
        }
        let mut modifiers = Modifiers::empty();
        let mut rest = token;
        while let Some(c) = rest.chars().next() {
            let flag = match c {
                'C' => Modifiers::CASEFOLD,
                'R' => Modifiers::REGEX,
                'N' => Modifiers::NUMERIC,
                'S' => Modifiers::SUBSTRING,
                'A' => Modifiers::PREFIX,
                'Z' => Modifiers::SUFFIX,
                _ => break,
            };
            modifiers |= flag;
            rest = &rest[1..];
        }
        let op = Op::new(Relation::from_symbol(rest)?, modifiers);
        // "." is the only spelling of the bare null op
        if op == Op::NULL {
            return None;
        }
        Some(op)
    }
}

impl From<u32> for Op {
    fn from(bits: u32) -> Self {
        Op::from_bits(bits)
    }
}

impl From<Op> for u32 {
    fn from(op: Op) -> Self {
        op.0
    }
}

impl From<Modifiers> for Op {
    fn from(modifiers: Modifiers) -> Self {
        Op::new(Relation::Unset, modifiers)
    }
}

impl BitOr for Op {
    type Output = Op;

    fn bitor(self, rhs: Op) -> Op {
        Op(self.0 | rhs.0)
    }
}

impl BitOrAssign for Op {
    fn bitor_assign(&mut self, rhs: Op) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Op({:#06x} {})", self.0, self.to_token())
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_token())
    }
}

/// The relational part of an [`Op`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Relation {
    /// No relation given; behaves as [`Relation::Equal`] when modifiers are set
    Unset = 0,
    Equal = 1,
    Greater = 2,
    GreaterEqual = 3,
    Less = 4,
    LessEqual = 5,
    NotEqual = 6,
    True = 7,
}

impl Relation {
    fn from_bits(bits: u32) -> Self {
        match bits {
            1 => Relation::Equal,
            2 => Relation::Greater,
            3 => Relation::GreaterEqual,
            4 => Relation::Less,
            5 => Relation::LessEqual,
            6 => Relation::NotEqual,
            7 => Relation::True,
            _ => Relation::Unset,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Relation::Unset => "",
            Relation::Equal => "=",
            Relation::Greater => ">",
            Relation::GreaterEqual => ">=",
            Relation::Less => "<",
            Relation::LessEqual => "<=",
            Relation::NotEqual => "!",
            Relation::True => "T",
        }
    }

    fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "" => Relation::Unset,
            "=" => Relation::Equal,
            ">" => Relation::Greater,
            ">=" => Relation::GreaterEqual,
            "<" => Relation::Less,
            "<=" => Relation::LessEqual,
            "!" => Relation::NotEqual,
            "T" => Relation::True,
            _ => return None,
        })
    }

    /// Whether `ordering` (data compared to query) satisfies this relation
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Relation::Unset | Relation::Equal => ordering == Ordering::Equal,
            Relation::Greater => ordering == Ordering::Greater,
            Relation::GreaterEqual => ordering != Ordering::Less,
            Relation::Less => ordering == Ordering::Less,
            Relation::LessEqual => ordering != Ordering::Greater,
            Relation::NotEqual => ordering != Ordering::Equal,
            Relation::True => true,
        }
    }
}
