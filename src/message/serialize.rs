use std::fmt::Write;

use crate::error::ValidationError;

use super::tags::write_tags;
use super::types::Message;

fn validate(message: &Message) -> Result<(), ValidationError> {
    let command = &message.command;
    if command.is_empty() {
        return Err(ValidationError::EmptyCommand);
    }
    if command.starts_with(':') || command.contains([' ', '\r', '\n']) {
        return Err(ValidationError::InvalidCommand(command.clone()));
    }

    let params = &message.params;
    let middle = params.len().saturating_sub(1);

    if let Some(index) = params[..middle].iter().position(|p| p.contains(' ')) {
        return Err(ValidationError::SpaceInParam { index });
    }
    if let Some(index) = params.iter().position(|p| p.starts_with(':')) {
        return Err(ValidationError::LeadingColon { index });
    }
    for (index, param) in params.iter().enumerate() {
        if param.contains('\r') {
            return Err(ValidationError::CarriageReturn { index });
        }
        if param.contains('\n') {
            return Err(ValidationError::LineFeed { index });
        }
    }
    if let Some(index) = params[..middle].iter().position(String::is_empty) {
        return Err(ValidationError::EmptyParam { index });
    }
    Ok(())
}

/// Render a message as a single wire line, without the CRLF terminator.
///
/// The command is upper-cased. The last parameter gets a leading `:` only
/// when it contains a space or is empty.
pub fn serialize(message: &Message) -> Result<String, ValidationError> {
    validate(message)?;

    let mut out = String::with_capacity(64);
    if let Some(tags) = message.tags.as_ref().filter(|tags| !tags.is_empty()) {
        out.push('@');
        // Writing to a String cannot fail.
        let _ = write_tags(&mut out, tags);
        out.push(' ');
    }
    if let Some(prefix) = &message.prefix {
        let _ = write!(out, ":{} ", prefix);
    }
    out.push_str(&message.command.to_ascii_uppercase());

    write_params(&mut out, &message.params);
    Ok(out)
}

/// Append `params`, each preceded by a space. The last one is written as a
/// trailing parameter when it is empty, contains a space or starts with `:`.
///
/// Middle parameters are written as they are.
pub(crate) fn write_params(out: &mut String, params: &[String]) {
    if let Some((last, middle)) = params.split_last() {
        for param in middle {
            out.push(' ');
            out.push_str(param);
        }
        out.push(' ');
        if last.is_empty() || last.contains(' ') || last.starts_with(':') {
            out.push(':');
        }
        out.push_str(last);
    }
}

impl Message {
    /// Render this message as a wire line. See [`serialize`].
    pub fn serialize(&self) -> Result<String, ValidationError> {
        serialize(self)
    }
}
