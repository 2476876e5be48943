//! Nom-based line scanner.
//!
//! Splits a single line into borrowed tag, prefix, command and parameter
//! slices. Tags and prefix must be terminated by a space; the command may
//! end the line.

use nom::{
    bytes::complete::{take_till1, take_until, take_while},
    character::complete::char,
    combinator::verify,
    error::{context, VerboseError, VerboseErrorKind},
    sequence::preceded,
    IResult,
};

use crate::error::ParseError;

type ParseResult<I, O> = IResult<I, O, VerboseError<I>>;

fn spaces(input: &str) -> ParseResult<&str, &str> {
    take_while(|c: char| c == ' ')(input)
}

/// Parse IRCv3 message tags (the part after `@` and before the first space).
fn parse_tags(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing message tags",
        preceded(char('@'), take_until(" ")),
    )(input)
}

/// Parse the message prefix (the part after `:` and before the next space).
fn parse_prefix(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing message prefix",
        preceded(
            char(':'),
            verify(take_until(" "), |prefix: &str| !prefix.is_empty()),
        ),
    )(input)
}

fn parse_command(input: &str) -> ParseResult<&str, &str> {
    context("parsing message command", take_till1(|c: char| c == ' '))(input)
}

/// Scan the parameters following the command.
///
/// A parameter introduced by `:` swallows the rest of the line.
fn parse_params(mut rest: &str) -> Vec<&str> {
    let mut params = Vec::new();
    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }
        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing);
            break;
        }
        let end = rest.find(' ').unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }
    params
}

/// A line split into its components, borrowing from the input.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScannedLine<'a> {
    /// Raw tags string (without the leading `@`), if present.
    pub tags: Option<&'a str>,
    /// Raw prefix string (without the leading `:`), if present.
    pub prefix: Option<&'a str>,
    pub command: &'a str,
    pub params: Vec<&'a str>,
}

fn scan(input: &str) -> ParseResult<&str, ScannedLine<'_>> {
    let (input, tags) = if input.starts_with('@') {
        let (input, tags) = parse_tags(input)?;
        (input, Some(tags))
    } else {
        (input, None)
    };
    let (input, _) = spaces(input)?;

    let (input, prefix) = if input.starts_with(':') {
        let (input, prefix) = parse_prefix(input)?;
        (input, Some(prefix))
    } else {
        (input, None)
    };
    let (input, _) = spaces(input)?;

    let (input, command) = parse_command(input)?;
    let params = parse_params(input);

    Ok((
        "",
        ScannedLine {
            tags,
            prefix,
            command,
            params,
        },
    ))
}

impl<'a> ScannedLine<'a> {
    /// Scan a single line. The line must not contain CR or LF terminators.
    pub fn scan(line: &'a str) -> Result<Self, ParseError> {
        match scan(line) {
            Ok((_, scanned)) => Ok(scanned),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(describe(line, &e)),
            Err(nom::Err::Incomplete(_)) => {
                Err(ParseError::new(line, line.len(), "reading incomplete input"))
            }
        }
    }
}

fn describe(line: &str, e: &VerboseError<&str>) -> ParseError {
    let position = e
        .errors
        .first()
        .map(|(rest, _)| line.len() - rest.len())
        .unwrap_or(0);
    let context = e
        .errors
        .iter()
        .find_map(|(_, kind)| match kind {
            VerboseErrorKind::Context(ctx) => Some(*ctx),
            _ => None,
        })
        .unwrap_or("parsing message");
    ParseError::new(line, position, context)
}
