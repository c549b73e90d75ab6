//! Spreadsheet column letters ("A", "B", ..., "Z", "AA", ...) and their
//! zero-based indices.
//!
//! Letters are a bijective base-26 number: 'A' is 1 and 'Z' is 26, there is no
//! zero digit.

const RADIX: i64 = 26;

/// Converts a column letter to its zero-based index. Case-insensitive.
///
/// Input is not validated: an empty string yields -1 and non-letters produce
/// an arbitrary index. Callers either check shape with [`is_column_letter`]
/// or bound-check the result against the header, as [`resolve`] does.
pub fn letter_to_index(letter: &str) -> i64 {
    let value = letter.chars().fold(0i64, |acc, ch| {
        let digit = ch.to_ascii_uppercase() as i64 - 'A' as i64 + 1;
        acc.saturating_mul(RADIX).saturating_add(digit)
    });
    value.saturating_sub(1)
}

/// Converts a zero-based column index back to its letter.
pub fn index_to_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % RADIX as usize;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / RADIX as usize;
    }
    letters.iter().rev().collect()
}

/// True for a non-empty run of ASCII letters.
pub fn is_column_letter(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic())
}

/// Resolves a column letter to the header name it points at.
///
/// Returns `None` for anything that does not name a column of this header.
pub fn resolve<'h>(letter: &str, header: &'h [String]) -> Option<&'h str> {
    let letter = letter.trim();
    if !is_column_letter(letter) {
        return None;
    }
    let index = usize::try_from(letter_to_index(letter)).ok()?;
    header.get(index).map(String::as_str)
}
