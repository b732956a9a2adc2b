//! Formatting helpers for wire diagnostics

use regex::Regex;

/// Characters stripped by the trim helpers when no set is given
pub const WHITESPACE: &[char] = &['\t', '\n', '\x0b', '\x0c', '\r', ' '];

/// Render raw bytes as `HEX | ASCII`, with `.` standing in for
/// non-printable bytes
pub fn hex_dump(bytes: &[u8]) -> String {
    let hex = bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ");
    let ascii: String = bytes
        .iter()
        .map(|b| {
            if b.is_ascii_graphic() || *b == b' ' {
                *b as char
            } else {
                '.'
            }
        })
        .collect();
    format!("{hex} | {ascii}")
}

pub fn ltrim<'a>(input: &'a str, chars: &[char]) -> &'a str {
    input.trim_start_matches(chars)
}

pub fn rtrim<'a>(input: &'a str, chars: &[char]) -> &'a str {
    input.trim_end_matches(chars)
}

pub fn trim<'a>(input: &'a str, chars: &[char]) -> &'a str {
    rtrim(ltrim(input, chars), chars)
}

/// Split on a separator pattern, dropping empty pieces
pub fn split(input: &str, separator: &Regex) -> Vec<String> {
    separator
        .split(input)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}
