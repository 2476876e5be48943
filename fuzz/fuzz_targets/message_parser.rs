//! Fuzz target for chat line parsing
//!
//! Feeds arbitrary frames to the line splitter and makes sure every line
//! either parses or fails cleanly, and that whatever parses can be written
//! back out without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::str;

fuzz_target!(|data: &[u8]| {
    // Only fuzz valid UTF-8 strings to focus on protocol-level issues
    if let Ok(input) = str::from_utf8(data) {
        if input.is_empty() || input.len() > 8192 {
            return;
        }

        tws::parse_lines(
            input,
            |msg| {
                assert!(!msg.command.is_empty());
                let _ = msg.serialize();
            },
            |err| assert!(err.position <= err.input.len()),
        );
    }
});
