//! Helpers for turning user-supplied search terms into safe query parameters.
//!
//! Queries are always parameterized; these helpers only shape the value that is
//! bound, so that `LIKE` metacharacters in a search term match literally.

use thiserror::Error;

/// Maximum length for a search term
pub const MAX_SEARCH_TERM_LENGTH: usize = 255;

/// Escape character used in every prefix `LIKE` clause
pub const LIKE_ESCAPE: char = '\\';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlSanitizeError {
  #[error("search term too long: {0} characters (max {max})", max = MAX_SEARCH_TERM_LENGTH)]
  TermTooLong(usize),
  #[error("search term contains a null byte")]
  NullByteInTerm,
}

/// Lowercase a free-text search term. "John" and "john" normalize to the same
/// value, which is both the cache key and the value matched against `name_lower`.
pub fn normalize_search_term(term: &str) -> String {
  term.to_lowercase()
}

/// Build a `LIKE` pattern matching values that start with `term`.
///
/// The term is lowercased, `%`, `_` and the escape character are escaped, and a
/// trailing `%` is appended. Use with `ESCAPE '\'`.
pub fn like_prefix_pattern(term: &str) -> Result<String, SqlSanitizeError> {
  if term.chars().count() > MAX_SEARCH_TERM_LENGTH {
    return Err(SqlSanitizeError::TermTooLong(term.chars().count()));
  }

  let mut pattern = String::with_capacity(term.len() + 4);
  for c in normalize_search_term(term).chars() {
    match c {
      '%' | '_' | LIKE_ESCAPE => {
        pattern.push(LIKE_ESCAPE);
        pattern.push(c);
      }
      '\0' => return Err(SqlSanitizeError::NullByteInTerm),
      _ => pattern.push(c),
    }
  }
  pattern.push('%');

  Ok(pattern)
}
