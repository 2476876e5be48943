//! IRCv3 message tag escaping.
//!
//! Recognised escapes are `\\`, `\s`, `\r`, `\n` and `\:`. Any other
//! sequence, including a lone trailing backslash, is kept verbatim.

use std::fmt::{Result as FmtResult, Write};

use super::types::Tags;

/// Escape a tag value for serialization.
pub fn escape_tag_value(f: &mut dyn Write, value: &str) -> FmtResult {
    for c in value.chars() {
        match c {
            ';' => f.write_str("\\:")?,
            ' ' => f.write_str("\\s")?,
            '\\' => f.write_str("\\\\")?,
            '\r' => f.write_str("\\r")?,
            '\n' => f.write_str("\\n")?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Unescape a tag value from wire format.
pub fn unescape_tag_value(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut iter = value.chars().peekable();
    while let Some(c) = iter.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        let replacement = match iter.peek() {
            Some(':') => ';',
            Some('s') => ' ',
            Some('\\') => '\\',
            Some('r') => '\r',
            Some('n') => '\n',
            _ => {
                unescaped.push('\\');
                continue;
            }
        };
        iter.next();
        unescaped.push(replacement);
    }
    unescaped
}

/// Split a raw tag section (without `@`) into an unescaped map.
pub(crate) fn parse_tags(raw: &str) -> Tags {
    raw.split(';')
        .filter(|tag| !tag.is_empty())
        .map(|tag| match tag.split_once('=') {
            Some((key, value)) => (key.to_string(), unescape_tag_value(value)),
            None => (tag.to_string(), String::new()),
        })
        .collect()
}

/// Render a tag map as `key=value;key2` (without `@`).
pub(crate) fn write_tags(f: &mut dyn Write, tags: &Tags) -> FmtResult {
    for (i, (key, value)) in tags.iter().enumerate() {
        if i > 0 {
            f.write_char(';')?;
        }
        f.write_str(key)?;
        if !value.is_empty() {
            f.write_char('=')?;
            escape_tag_value(f, value)?;
        }
    }
    Ok(())
}
