//! Flat key/value text codec.
//!
//! Pairs are written as `key|value` and joined with `||`. A backslash escapes
//! `|` and `\` inside keys and values.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::Chars;

/// Decoded message body.
pub type KvMap = BTreeMap<String, String>;

const SEPARATOR: char = '|';
const ESCAPE: char = '\\';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("segment '{0}' has no key/value separator")]
    MalformedSegment(String),
    #[error("message ends with a dangling escape")]
    DanglingEscape,
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,
}

/// Encode pairs in iteration order.
pub fn encode<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = String::new();
    for (key, value) in pairs {
        if !out.is_empty() {
            out.push_str("||");
        }
        escape_into(&mut out, key);
        out.push(SEPARATOR);
        escape_into(&mut out, value);
    }
    out
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        if c == SEPARATOR || c == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}

/// Decode a frame payload.
pub fn decode_bytes(payload: &[u8]) -> Result<KvMap, CodecError> {
    let text = std::str::from_utf8(payload).map_err(|_| CodecError::InvalidUtf8)?;
    decode(text)
}

/// Decode `key|value||key|value` text.
///
/// Empty input yields an empty map and empty segments are skipped. The first
/// unescaped `|` ends the key; the value runs until the next unescaped `||`,
/// so a lone `|` inside a value is kept. Later duplicates win.
///
/// A pair with an empty key starts with its separator, so `|||` at the start
/// of a pair is an empty key with an empty value, never an empty segment.
pub fn decode(text: &str) -> Result<KvMap, CodecError> {
    let mut map = KvMap::new();
    let mut chars = text.chars().peekable();

    while chars.peek().is_some() {
        let mut key = String::new();
        let mut raw_key_len = 0;
        let mut separated = false;
        while let Some(c) = chars.next() {
            match c {
                ESCAPE => {
                    key.push(chars.next().ok_or(CodecError::DanglingEscape)?);
                    raw_key_len += 2;
                }
                SEPARATOR if raw_key_len == 0 && at_empty_segment(&chars) => {
                    // Empty segment.
                    chars.next();
                }
                SEPARATOR => {
                    separated = true;
                    break;
                }
                other => {
                    key.push(other);
                    raw_key_len += 1;
                }
            }
        }
        if !separated {
            if raw_key_len == 0 {
                break;
            }
            return Err(CodecError::MalformedSegment(key));
        }

        let mut value = String::new();
        while let Some(c) = chars.next() {
            match c {
                ESCAPE => value.push(chars.next().ok_or(CodecError::DanglingEscape)?),
                SEPARATOR if chars.peek() == Some(&SEPARATOR) => {
                    chars.next();
                    break;
                }
                other => value.push(other),
            }
        }
        map.insert(key, value);
    }
    Ok(map)
}

/// Called after a pair-initial `|`: true when it is followed by exactly one
/// more `|`, i.e. `||` not continuing into an empty-key pair.
fn at_empty_segment(rest: &Peekable<Chars<'_>>) -> bool {
    let mut ahead = rest.clone();
    ahead.next() == Some(SEPARATOR) && ahead.next() != Some(SEPARATOR)
}
