//! Identifier parser for pasted or scanned intake input
//!
//! Normalizes raw free-text into an ordered list of candidate identifiers.
//! Barcode scanners inject stray characters and partial lines, so anything
//! that is not a pure digit string is dropped silently rather than reported.

/// Parse raw input into an ordered list of valid identifiers
///
/// - Splits on line boundaries, trims each line
/// - Keeps only lines matching one-or-more decimal digits, nothing else
/// - Preserves input order and duplicates (no dedup)
///
/// Pure and deterministic; also used to drive the live "valid identifiers"
/// counter while the user edits the input buffer.
pub fn parse(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| is_identifier(line))
        .map(str::to_string)
        .collect()
}

/// True if the line is one or more ASCII decimal digits
fn is_identifier(line: &str) -> bool {
    !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit())
}
