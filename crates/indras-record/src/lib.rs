//! # Indras Record
//!
//! Paged key/value log records and the query predicates that match them.
//!
//! A [`Record`] stores short strings inline in fixed-size pages and spills
//! longer ones to separate allocations. The same container holds either a
//! concrete log entry ([`RecordKind::Data`]) or a query ([`RecordKind::Query`])
//! whose entries carry an [`Op`] describing how to compare against data.
//!
//! ## Key Types
//!
//! - [`Record`]: The paged container, with set/lookup/iterate/merge/copy
//! - [`Op`]: Relation plus modifier flags for one query term
//! - [`QueryEvaluator`]: Query matching with a compiled-pattern cache
//! - [`SharedRecord`]: Counted shared ownership of one record
//!
//! ## Example
//!
//! ```
//! use indras_record::{Op, Record};
//!
//! let mut data = Record::data();
//! data.set("Host", Some("h1"), Op::NULL);
//! data.set("Size", Some("250"), Op::NULL);
//!
//! let query: Record = "Q [= Host h1] [N> Size 100]".parse().unwrap();
//! assert!(data.matches(&query));
//! ```

pub mod config;
pub mod error;
pub mod keys;
pub mod lifecycle;
pub mod op;
pub mod query;
pub mod record;
pub mod text;
pub mod time;

mod mutate;
mod page;
mod serde_impl;
mod slot;

// Re-export main types
pub use config::PageConfig;
pub use error::{ConfigError, RecordError, RecordResult, TextError};
pub use lifecycle::{clear_free_note_hook, set_free_note_hook, SharedRecord};
pub use mutate::{merge, replace};
pub use op::{Modifiers, Op, Relation};
pub use query::{compare, match_list, test, CompileEachTime, PatternCache, PatternMatcher, QueryEvaluator};
pub use record::{Cursor, Entries, Entry, Record, RecordKind};
pub use slot::EXTERN_REF_SIZE;
pub use text::{from_text, from_text_with_config, to_text};
pub use time::parse_time;
