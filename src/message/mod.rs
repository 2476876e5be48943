//! IRC wire-format messages: types, parsing and serialization.

mod nom_parser;
mod parse;
mod serialize;
pub mod tags;
mod types;

pub use self::parse::{parse_line, parse_lines};
pub use self::serialize::serialize;
pub(crate) use self::serialize::write_params;
pub use self::types::{Message, ParsedMessage, Tags};
