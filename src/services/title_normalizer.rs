//! Canonicalizes titles for substring matching between Plex and AniList.
//!
//! Lossy and ASCII-only by design: non-ASCII letters are stripped rather
//! than case-folded, matching the upstream behavior this crate reproduces.

/// Normalizes `s` for substring comparison: strips parenthesized
/// substrings, then any remaining non-alphanumeric character, then
/// lowercases what's left.
#[must_use]
pub fn normalize(s: &str) -> String {
    let without_parens = strip_parenthesized(s);

    let alphanumeric: String = without_parens
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    alphanumeric.trim().to_lowercase()
}

/// Removes every `(...)` span, including the parentheses themselves.
/// Unmatched closing parens are left in place; an unmatched opening paren
/// drops everything to the end of the string, matching a non-greedy
/// bracket-strip regex applied left to right.
fn strip_parenthesized(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                if depth > 0 {
                    depth -= 1;
                }
            }
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}
