//! Bracketed text form
//!
//! ```text
//! [Host h1] [Sender kernel] [Message disk\sfull]
//! Q [= Host h1] [N> Size 100] [T Sender]
//! ```
//!
//! A leading `Q` marks a query. Each term is `[KEY]`, `[KEY VALUE]`, or for
//! queries `[OP KEY]` / `[OP KEY VALUE]`; see [`Op::to_token`] for opcode
//! spelling. Inside a token `\` escapes `[`, `]` and itself, and introduces
//! `\s` (space), `\a \b \f \n \r \t \v`, caret (`\^X`, `\^?`), meta (`\M-x`,
//! `\M^X`) and three-digit octal (`\ooo`) escapes. An empty string is written
//! as `\000`; a decoded string ends at its first NUL.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use crate::config::PageConfig;
use crate::error::{RecordResult, TextError};
use crate::op::Op;
use crate::record::{Record, RecordKind};

/// Render `record` in the bracketed text form
pub fn to_text(record: &Record) -> String {
    let mut out = String::new();
    if record.is_query() {
        out.push('Q');
    }
    for entry in record {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push('[');
        if record.is_query() {
            out.push_str(&entry.op.to_token());
            out.push(' ');
        }
        escape_into(&mut out, entry.key);
        if let Some(value) = entry.value {
            out.push(' ');
            escape_into(&mut out, value);
        }
        out.push(']');
    }
    out
}

/// Parse the bracketed text form with the default page layout
pub fn from_text(text: &str) -> Result<Record, TextError> {
    parse(text, Record::new)
}

/// Parse the bracketed text form into pages with a custom layout
pub fn from_text_with_config(text: &str, config: PageConfig) -> RecordResult<Record> {
    config.validate()?;
    let record = parse(text, |kind| Record::from_valid_config(kind, config))?;
    Ok(record)
}

fn escape_into(out: &mut String, s: &str) {
    if s.is_empty() {
        out.push_str("\\000");
        return;
    }
    for byte in s.bytes() {
        escape_byte(out, byte);
    }
}

fn escape_byte(out: &mut String, byte: u8) {
    match byte {
        b'\\' | b'[' | b']' => {
            out.push('\\');
            out.push(byte as char);
        }
        b' ' => out.push_str("\\s"),
        b'\n' => out.push_str("\\n"),
        b'\t' => out.push_str("\\t"),
        b'\r' => out.push_str("\\r"),
        0x07 => out.push_str("\\a"),
        0x08 => out.push_str("\\b"),
        0x0b => out.push_str("\\v"),
        0x0c => out.push_str("\\f"),
        0x00..=0x1f => {
            out.push_str("\\^");
            out.push((byte + 0x40) as char);
        }
        0x7f => out.push_str("\\^?"),
        0x21..=0x7e => out.push(byte as char),
        _ => {
            let low = byte & 0x7f;
            match low {
                b'\\' | b'[' | b']' | b' ' => {
                    let _ = write!(out, "\\{byte:03o}");
                }
                0x21..=0x7e => {
                    out.push_str("\\M-");
                    out.push(low as char);
                }
                0x7f => out.push_str("\\M^?"),
                _ => {
                    out.push_str("\\M^");
                    out.push((low + 0x40) as char);
                }
            }
        }
    }
}

fn parse(text: &str, new_record: impl FnOnce(RecordKind) -> Record) -> Result<Record, TextError> {
    let bytes = text.as_bytes();
    let mut pos = skip_whitespace(bytes, 0);

    let kind = match (bytes.get(pos), bytes.get(pos + 1)) {
        (Some(b'Q'), None) => RecordKind::Query,
        (Some(b'Q'), Some(next)) if next.is_ascii_whitespace() || *next == b'[' => RecordKind::Query,
        _ => RecordKind::Data,
    };
    if kind == RecordKind::Query {
        pos += 1;
    }
    let mut record = new_record(kind);

    loop {
        pos = skip_whitespace(bytes, pos);
        match bytes.get(pos) {
            None => break,
            Some(b'[') => {}
            Some(&byte) => return Err(TextError::UnexpectedByte { offset: pos, byte }),
        }

        let start = pos;
        pos += 1;
        let mut tokens = Vec::with_capacity(3);
        loop {
            pos = skip_whitespace(bytes, pos);
            match bytes.get(pos) {
                None => return Err(TextError::UnterminatedTerm(start)),
                Some(b']') => {
                    pos += 1;
                    break;
                }
                Some(b'[') => return Err(TextError::NestedBracket(pos)),
                Some(_) => {
                    let (token, next) = read_token(bytes, pos)?;
                    tokens.push(token);
                    pos = next;
                }
            }
        }
        apply_term(&mut record, start, tokens)?;
    }
    Ok(record)
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
        pos += 1;
    }
    pos
}

fn read_token(bytes: &[u8], mut pos: usize) -> Result<(String, usize), TextError> {
    let start = pos;
    let mut out = Vec::new();
    while let Some(&byte) = bytes.get(pos) {
        match byte {
            b'[' | b']' => break,
            _ if byte.is_ascii_whitespace() => break,
            b'\\' => {
                let (decoded, next) = read_escape(bytes, pos)?;
                out.push(decoded);
                pos = next;
            }
            _ => {
                out.push(byte);
                pos += 1;
            }
        }
    }
    if let Some(nul) = out.iter().position(|&b| b == 0) {
        out.truncate(nul);
    }
    let token = String::from_utf8(out).map_err(|_| TextError::InvalidUtf8(start))?;
    Ok((token, pos))
}

/// Decode the escape starting at `bytes[pos] == b'\\'`
fn read_escape(bytes: &[u8], pos: usize) -> Result<(u8, usize), TextError> {
    let at = |i: usize| bytes.get(pos + i).copied();
    let bad = TextError::BadEscape(pos);

    let decoded = match at(1).ok_or(bad.clone())? {
        c @ (b'\\' | b'[' | b']') => (c, 2),
        b's' => (b' ', 2),
        b'n' => (b'\n', 2),
        b't' => (b'\t', 2),
        b'r' => (b'\r', 2),
        b'a' => (0x07, 2),
        b'b' => (0x08, 2),
        b'f' => (0x0c, 2),
        b'v' => (0x0b, 2),
        b'^' => (caret(at(2)).ok_or(bad)?, 3),
        b'M' => match (at(2), at(3)) {
            (Some(b'-'), Some(c @ 0x21..=0x7e)) => (c | 0x80, 4),
            (Some(b'^'), c) => (caret(c).ok_or(bad)? | 0x80, 4),
            _ => return Err(bad),
        },
        b'0'..=b'7' => {
            let mut value: u32 = 0;
            for i in 1..=3 {
                match at(i) {
                    Some(digit @ b'0'..=b'7') => value = value * 8 + u32::from(digit - b'0'),
                    _ => return Err(bad),
                }
            }
            (u8::try_from(value).map_err(|_| bad)?, 4)
        }
        _ => return Err(bad),
    };
    Ok((decoded.0, pos + decoded.1))
}

fn caret(byte: Option<u8>) -> Option<u8> {
    match byte? {
        b'?' => Some(0x7f),
        b @ 0x40..=0x5f => Some(b - 0x40),
        b @ b'a'..=b'z' => Some(b - 0x60),
        _ => None,
    }
}

fn apply_term(record: &mut Record, offset: usize, tokens: Vec<String>) -> Result<(), TextError> {
    let max = if record.is_query() { 3 } else { 2 };
    if tokens.is_empty() {
        return Err(TextError::EmptyTerm(offset));
    }
    if tokens.len() > max {
        return Err(TextError::TooManyTokens {
            offset,
            count: tokens.len(),
            max,
        });
    }

    let mut tokens = tokens.into_iter();
    let first = tokens.next().unwrap_or_default();
    let second = tokens.next();
    let third = tokens.next();

    if !record.is_query() {
        record.set(&first, second.as_deref(), Op::NULL);
        return Ok(());
    }

    match (second, third) {
        (Some(key), Some(value)) => {
            let op = Op::parse_token(&first).ok_or_else(|| TextError::UnknownOpcode {
                offset,
                token: first.clone(),
            })?;
            record.set(&key, Some(&value), op);
        }
        (Some(second), None) => match Op::parse_token(&first) {
            Some(op) => record.set(&second, None, op),
            None => record.set(&first, Some(&second), Op::EQUAL),
        },
        (None, _) => record.set(&first, None, Op::EQUAL),
    }
    Ok(())
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_text(self))
    }
}

impl FromStr for Record {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        from_text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecordError;

    #[test]
    fn test_data_to_text() {
        let mut record = Record::data();
        record.set("Host", Some("h1"), Op::NULL);
        record.set("Message", Some("disk full"), Op::NULL);
        record.set("flag", None, Op::NULL);
        assert_eq!(to_text(&record), "[Host h1] [Message disk\\sfull] [flag]");
    }

    #[test]
    fn test_query_to_text() {
        let mut query = Record::query();
        query.set("Size", Some("100"), Op::NUMERIC | Op::GREATER);
        query.set("Sender", None, Op::TRUE);
        assert_eq!(to_text(&query), "Q [N> Size 100] [T Sender]");
        assert_eq!(to_text(&Record::query()), "Q");
        assert_eq!(to_text(&Record::data()), "");
    }

    #[test]
    fn test_parse_data() {
        let record = from_text("  [Host h1]\n[Sender   kernel] [flag] ").unwrap();
        assert_eq!(record.kind(), RecordKind::Data);
        assert_eq!(record.get("Host"), Some("h1"));
        assert_eq!(record.get("Sender"), Some("kernel"));
        assert_eq!(record.lookup("flag"), Some((None, Op::NULL)));
    }

    #[test]
    fn test_parse_query() {
        let query = from_text("Q [N> Size 100] [Host h1] [T Sender] [Facility]").unwrap();
        assert!(query.is_query());
        assert_eq!(query.lookup("Size"), Some((Some("100"), Op::NUMERIC | Op::GREATER)));
        assert_eq!(query.lookup("Host"), Some((Some("h1"), Op::EQUAL)));
        assert_eq!(query.lookup("Sender"), Some((None, Op::TRUE)));
        assert_eq!(query.lookup("Facility"), Some((None, Op::EQUAL)));
        assert!(from_text("Q").unwrap().is_query());
        assert!(from_text("Q[= a b]").unwrap().is_query());
    }

    #[test]
    fn test_escapes_round_trip() {
        let mut record = Record::data();
        record.set("brackets", Some("[a] \\ b"), Op::NULL);
        record.set("controls", Some("tab\tbell\x07esc\x1bdel\x7f"), Op::NULL);
        record.set("unicode", Some("caf\u{e9} \u{2603}"), Op::NULL);
        record.set("empty", Some(""), Op::NULL);
        record.set("spaced key", Some("v"), Op::NULL);

        let text = to_text(&record);
        assert!(text.is_ascii());
        assert_eq!(from_text(&text).unwrap(), record);
    }

    #[test]
    fn test_decode_escape_forms() {
        let record = from_text(r"[k a\^Ab\101\s\]] [cafe caf\M-C\M-)]").unwrap();
        assert_eq!(record.get("k"), Some("a\x01bA ]"));
        assert_eq!(record.get("cafe"), Some("caf\u{e9}"));
        // 0xff alone is not UTF-8
        assert_eq!(from_text(r"[del \^?\M^?]"), Err(TextError::InvalidUtf8(5)));
        // a lone 0xe1 lead byte is not UTF-8 either
        assert!(from_text(r"[k \M-a]").is_err());
    }

    #[test]
    fn test_nul_terminates() {
        let record = from_text(r"[k abc\000def]").unwrap();
        assert_eq!(record.get("k"), Some("abc"));
    }

    #[test]
    fn test_malformed_input() {
        assert_eq!(from_text("[Host h1"), Err(TextError::UnterminatedTerm(0)));
        assert_eq!(from_text("[a [b]]"), Err(TextError::NestedBracket(3)));
        assert_eq!(from_text("[]"), Err(TextError::EmptyTerm(0)));
        assert_eq!(from_text("Host h1"), Err(TextError::UnexpectedByte { offset: 0, byte: b'H' }));
        assert_eq!(from_text(r"[k \q]"), Err(TextError::BadEscape(3)));
        assert_eq!(from_text(r"[k \8]"), Err(TextError::BadEscape(3)));
        assert_eq!(from_text(r"[k \477]"), Err(TextError::BadEscape(3)));
        assert_eq!(from_text(r"[k v\]"), Err(TextError::UnterminatedTerm(0)));
        assert!(matches!(from_text("[a b c]"), Err(TextError::TooManyTokens { count: 3, max: 2, .. })));
        assert!(matches!(from_text("Q [a b c d]"), Err(TextError::TooManyTokens { count: 4, .. })));
        assert!(matches!(from_text("Q [xx Host h1]"), Err(TextError::UnknownOpcode { .. })));
    }

    #[test]
    fn test_display_and_from_str() {
        let record: Record = "[Host h1]".parse().unwrap();
        assert_eq!(record.to_string(), "[Host h1]");
    }

    #[test]
    fn test_from_text_with_config() {
        let record = from_text_with_config("[a 1] [b 2] [c 3]", PageConfig::new(1, 64)).unwrap();
        assert_eq!(record.page_count(), 3);
        assert_eq!(record.count(), 3);

        let err = from_text_with_config("[a 1]", PageConfig::new(0, 64)).unwrap_err();
        assert!(matches!(err, RecordError::Config(_)));
        let err = from_text_with_config("[a", PageConfig::default()).unwrap_err();
        assert!(matches!(err, RecordError::Text(_)));
    }
}
