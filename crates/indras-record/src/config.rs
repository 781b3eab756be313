//! Page layout configuration
//!
//! Every page of a record shares one layout: a fixed number of slots and a
//! fixed-size inline arena. Records built with different layouts still
//! compare, merge and round-trip normally.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::slot::EXTERN_REF_SIZE;

/// Largest slot count a page may carry (the slot ordinal fits a cursor byte)
pub const MAX_PAGE_SLOTS: usize = 255;

/// Largest arena a page may carry (arena offsets are 16-bit)
pub const MAX_ARENA_SIZE: usize = u16::MAX as usize;

/// Layout shared by every page of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    /// Number of key/value slots per page
    pub slots: usize,
    /// Inline arena capacity per page, in bytes
    pub arena_size: usize,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            slots: 25,
            arena_size: 800,
        }
    }
}

impl PageConfig {
    /// Create a layout with explicit limits
    pub fn new(slots: usize, arena_size: usize) -> Self {
        Self { slots, arena_size }
    }

    /// Small pages, for records that usually carry a handful of keys
    pub fn compact() -> Self {
        Self {
            slots: 8,
            arena_size: 256,
        }
    }

    /// Large pages, for records with long free-form values
    pub fn wide() -> Self {
        Self {
            slots: 64,
            arena_size: 8192,
        }
    }

    /// Set the slot count
    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slots = slots;
        self
    }

    /// Set the arena size
    pub fn with_arena_size(mut self, arena_size: usize) -> Self {
        self.arena_size = arena_size;
        self
    }

    /// Check the layout can always place a key/value pair on a fresh page
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slots == 0 || self.slots > MAX_PAGE_SLOTS {
            return Err(ConfigError::InvalidSlots {
                slots: self.slots,
                max: MAX_PAGE_SLOTS,
            });
        }
        let min = 2 * EXTERN_REF_SIZE;
        if self.arena_size < min {
            return Err(ConfigError::ArenaTooSmall {
                size: self.arena_size,
                min,
            });
        }
        if self.arena_size > MAX_ARENA_SIZE {
            return Err(ConfigError::ArenaTooLarge {
                size: self.arena_size,
                max: MAX_ARENA_SIZE,
            });
        }
        Ok(())
    }
}
