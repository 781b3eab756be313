//! Query evaluation
//!
//! A query record is a conjunction of terms. Each term names a key, an
//! optional value and an [`Op`]; the query matches a data record when every
//! term holds against it.
//!
//! Term semantics:
//!
//! - [`Op::NULL`]: the key must be missing.
//! - relation `T`: the key must be present.
//! - any other term against a missing key holds only for `!` (not equal).
//! - `Time` terms compare parsed instants when both sides parse.
//! - otherwise the modifiers pick the comparison: regex, numeric,
//!   prefix/suffix/substring windows, or plain text, each optionally
//!   case-folded.

use std::cmp::Ordering;
use std::fmt;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use tracing::{debug, trace};

use crate::keys;
use crate::op::{Modifiers, Op, Relation};
use crate::record::{Entry, Record, RecordKind};
use crate::time::parse_time;

/// Source of compiled regular expressions for regex terms
pub trait PatternMatcher {
    /// Whether `text` matches `pattern`; an invalid pattern never matches
    fn is_match(&self, pattern: &str, casefold: bool, text: &str) -> bool;
}

fn compile(pattern: &str, casefold: bool) -> Option<Regex> {
    match RegexBuilder::new(pattern).case_insensitive(casefold).build() {
        Ok(regex) => Some(regex),
        Err(err) => {
            debug!(pattern, error = %err, "invalid query pattern, treating as no match");
            None
        }
    }
}

/// Compiles the pattern on every use
#[derive(Debug, Default, Clone, Copy)]
pub struct CompileEachTime;

impl PatternMatcher for CompileEachTime {
    fn is_match(&self, pattern: &str, casefold: bool, text: &str) -> bool {
        compile(pattern, casefold).is_some_and(|regex| regex.is_match(text))
    }
}

/// Compiled patterns keyed by pattern text and case folding
///
/// Invalid patterns are cached too, so they are only reported once. At
/// capacity the least recently used pattern is evicted.
pub struct PatternCache {
    patterns: Mutex<LruCache<(String, bool), Option<Regex>>>,
}

impl PatternCache {
    pub const DEFAULT_CAPACITY: usize = 256;

    /// Cache holding at most `capacity` patterns (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            patterns: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.patterns.lock().cap().get()
    }

    /// Number of cached patterns
    pub fn len(&self) -> usize {
        self.patterns.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `pattern` is cached, without touching its recency
    pub fn contains(&self, pattern: &str, casefold: bool) -> bool {
        self.patterns.lock().contains(&(pattern.to_string(), casefold))
    }

    pub fn clear(&self) {
        self.patterns.lock().clear();
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl fmt::Debug for PatternCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let patterns = self.patterns.lock();
        f.debug_struct("PatternCache")
            .field("len", &patterns.len())
            .field("capacity", &patterns.cap())
            .finish()
    }
}

impl PatternMatcher for PatternCache {
    fn is_match(&self, pattern: &str, casefold: bool, text: &str) -> bool {
        let key = (pattern.to_string(), casefold);
        let mut patterns = self.patterns.lock();
        if let Some(compiled) = patterns.get(&key) {
            return compiled.as_ref().is_some_and(|regex| regex.is_match(text));
        }
        let compiled = compile(pattern, casefold);
        let matched = compiled.as_ref().is_some_and(|regex| regex.is_match(text));
        if let Some(((evicted, _), _)) = patterns.push(key, compiled) {
            trace!(pattern = %evicted, "evicted query pattern");
        }
        matched
    }
}

/// Evaluate `query` against `data`, compiling patterns as needed
pub fn test(query: &Record, data: &Record) -> bool {
    evaluate(query, data, &CompileEachTime)
}

/// True if `data` matches any of `queries`, or `queries` is empty
pub fn match_list(data: &Record, queries: &[Record]) -> bool {
    match_any(data, queries, &CompileEachTime)
}

/// Compare two records
///
/// Records of the same kind are compared structurally. A data record and a
/// query record are compared by evaluating the query against the data,
/// whichever order they are given in.
pub fn compare(a: &Record, b: &Record) -> bool {
    compare_with(a, b, &CompileEachTime)
}

/// Query evaluation with a shared pattern cache
///
/// Produces the same results as [`test`], [`match_list`] and [`compare`]
/// while compiling each distinct pattern once.
#[derive(Debug, Default)]
pub struct QueryEvaluator {
    patterns: PatternCache,
}

impl QueryEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluator whose cache holds at most `capacity` patterns
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            patterns: PatternCache::new(capacity),
        }
    }

    pub fn test(&self, query: &Record, data: &Record) -> bool {
        evaluate(query, data, &self.patterns)
    }

    pub fn match_list(&self, data: &Record, queries: &[Record]) -> bool {
        match_any(data, queries, &self.patterns)
    }

    pub fn compare(&self, a: &Record, b: &Record) -> bool {
        compare_with(a, b, &self.patterns)
    }

    pub fn patterns(&self) -> &PatternCache {
        &self.patterns
    }
}

impl Record {
    /// Whether this record satisfies `query`
    pub fn matches(&self, query: &Record) -> bool {
        test(query, self)
    }
}

fn match_any<P: PatternMatcher>(data: &Record, queries: &[Record], patterns: &P) -> bool {
    queries.is_empty() || queries.iter().any(|query| evaluate(query, data, patterns))
}

fn compare_with<P: PatternMatcher>(a: &Record, b: &Record, patterns: &P) -> bool {
    match (a.kind(), b.kind()) {
        (RecordKind::Query, RecordKind::Data) => evaluate(a, b, patterns),
        (RecordKind::Data, RecordKind::Query) => evaluate(b, a, patterns),
        _ => structurally_equal(a, b),
    }
}

fn evaluate<P: PatternMatcher>(query: &Record, data: &Record, patterns: &P) -> bool {
    query.iter().all(|term| test_term(&term, data, patterns))
}

fn test_term<P: PatternMatcher>(term: &Entry<'_>, data: &Record, patterns: &P) -> bool {
    let found = data.lookup(term.key);
    if term.op == Op::NULL {
        return found.is_none();
    }

    let relation = term.op.relation();
    let Some((data_value, _)) = found else {
        return relation == Relation::NotEqual;
    };
    if relation == Relation::True {
        return true;
    }

    let query_value = term.value.unwrap_or_default();
    let data_value = data_value.unwrap_or_default();
    if term.key == keys::TIME {
        if let Some(result) = compare_times(relation, query_value, data_value) {
            return result;
        }
    }
    compare_values(term.op, query_value, data_value, patterns)
}

fn compare_times(relation: Relation, query: &str, data: &str) -> Option<bool> {
    let query = parse_time(query)?;
    let data = parse_time(data)?;
    Some(relation.holds(data.cmp(&query)))
}

fn compare_values<P: PatternMatcher>(op: Op, query: &str, data: &str, patterns: &P) -> bool {
    let relation = op.relation();
    let modifiers = op.modifiers();
    let casefold = modifiers.contains(Modifiers::CASEFOLD);

    if modifiers.contains(Modifiers::REGEX) {
        let matched = patterns.is_match(query, casefold, data);
        return matched != (relation == Relation::NotEqual);
    }
    if modifiers.contains(Modifiers::NUMERIC) {
        return match (parse_integer(query), parse_integer(data)) {
            (Some(query), Some(data)) => relation.holds(data.cmp(&query)),
            _ => relation == Relation::NotEqual,
        };
    }
    if modifiers.intersects(Modifiers::SUBSTRING) {
        return test_windows(op, query, data);
    }
    relation.holds(compare_text(data, query, casefold))
}

fn parse_integer(value: &str) -> Option<i64> {
    value.trim().parse().ok()
}

fn compare_text(a: &str, b: &str, casefold: bool) -> Ordering {
    if casefold {
        let a = a.bytes().map(|byte| byte.to_ascii_lowercase());
        let b = b.bytes().map(|byte| byte.to_ascii_lowercase());
        a.cmp(b)
    } else {
        a.cmp(b)
    }
}

/// Prefix, suffix or substring test of `query` inside `data`
fn test_windows(op: Op, query: &str, data: &str) -> bool {
    let negate = op.relation() == Relation::NotEqual;
    let modifiers = op.modifiers();
    let casefold = modifiers.contains(Modifiers::CASEFOLD);
    let (query, data) = (query.as_bytes(), data.as_bytes());

    if query.is_empty() {
        return !negate;
    }
    if query.len() > data.len() {
        return negate;
    }

    let equal = |window: &[u8]| {
        if casefold {
            window.eq_ignore_ascii_case(query)
        } else {
            window == query
        }
    };
    let matched = match (
        modifiers.contains(Modifiers::PREFIX),
        modifiers.contains(Modifiers::SUFFIX),
    ) {
        (true, true) => data.windows(query.len()).any(equal),
        (true, false) => equal(&data[..query.len()]),
        _ => equal(&data[data.len() - query.len()..]),
    };
    matched != negate
}

/// Same kind, same entries; queries also compare ops
fn structurally_equal(a: &Record, b: &Record) -> bool {
    a.kind() == b.kind() && a.count() == b.count() && contains_all(a, b) && contains_all(b, a)
}

fn contains_all(a: &Record, b: &Record) -> bool {
    match a.kind() {
        RecordKind::Data => a.iter().all(|entry| {
            b.lookup(entry.key)
                .is_some_and(|(value, _)| value == entry.value)
        }),
        // queries may repeat a key, so any matching term will do
        RecordKind::Query => a.iter().all(|entry| {
            b.iter().any(|other| {
                other.key == entry.key && other.value == entry.value && other.op == entry.op
            })
        }),
    }
}

/// Queries compare as sets of terms: a repeated term counts once.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        structurally_equal(self, other)
    }
}

impl Eq for Record {}
