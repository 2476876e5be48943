use std::str::FromStr;

use crate::error::ParseError;
use crate::prefix::Prefix;

use super::nom_parser::ScannedLine;
use super::tags::parse_tags;
use super::types::{Message, ParsedMessage};

/// Parse a single frame.
///
/// A trailing CR/LF is ignored. Failure rejects the whole line.
pub fn parse_line(line: &str) -> Result<ParsedMessage, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let scanned = ScannedLine::scan(line)?;

    Ok(ParsedMessage {
        raw: line.to_string(),
        message: Message {
            tags: scanned.tags.map(parse_tags),
            prefix: scanned.prefix.map(Prefix::parse),
            command: scanned.command.to_string(),
            params: scanned.params.into_iter().map(str::to_string).collect(),
        },
    })
}

/// Parse every CRLF-delimited frame in `buffer`, in order.
///
/// Exactly one callback fires per non-blank line. A final line without a
/// CRLF terminator is parsed like the others; blank lines are skipped.
pub fn parse_lines<M, E>(buffer: &str, mut on_message: M, mut on_error: E)
where
    M: FnMut(ParsedMessage),
    E: FnMut(ParseError),
{
    for line in buffer.split("\r\n").filter(|line| !line.is_empty()) {
        match parse_line(line) {
            Ok(message) => on_message(message),
            Err(error) => on_error(error),
        }
    }
}

impl FromStr for ParsedMessage {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_line(s)
    }
}

impl FromStr for Message {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_line(s).map(ParsedMessage::into_message)
    }
}
