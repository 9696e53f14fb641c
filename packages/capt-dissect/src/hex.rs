//! Hex dump parsing, for writing packets by hand.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum ParseHexError {
    #[error("Invalid hex digit {found:?} at position {position}.")]
    InvalidDigit { found: char, position: usize },

    #[error("Hex dump ends with an unpaired digit.")]
    OddLength,
}

/// Parses a hex dump such as `"A1 A1 08 00"` into bytes.
///
/// Digits are read in pairs. Whitespace, `:` and `-` may separate them but
/// may not split a pair.
pub fn parse_hex(dump: &str) -> Result<Vec<u8>, ParseHexError> {
    let mut bytes = Vec::with_capacity(dump.len() / 2);
    let mut high: Option<u8> = None;

    for (position, found) in dump.char_indices() {
        if matches!(found, ':' | '-') || found.is_whitespace() {
            if high.is_some() {
                return Err(ParseHexError::InvalidDigit { found, position });
            }
            continue;
        }

        let digit = found
            .to_digit(16)
            .ok_or(ParseHexError::InvalidDigit { found, position })? as u8;

        match high.take() {
            Some(high) => bytes.push(high << 4 | digit),
            None => high = Some(digit),
        }
    }

    if high.is_some() {
        return Err(ParseHexError::OddLength);
    }

    Ok(bytes)
}
