//! Object key normalization.
//!
//! Keys are flat names inside the container. A key contains only ASCII
//! letters, digits, `.` and `_`, is at most [`MAX_KEY_LENGTH`] characters
//! long, is never empty, and never ends in `.`.

use crate::traits::{StorageError, StorageResult};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Maximum length of an object key, in characters.
pub const MAX_KEY_LENGTH: usize = 50;

/// A validated storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '_'
}

impl ObjectKey {
    /// Map an arbitrary client-supplied filename to a key.
    ///
    /// Disallowed characters are dropped, trailing dots are stripped, and the
    /// result is cut to [`MAX_KEY_LENGTH`] characters (stripping any dots the
    /// cut exposes). Rejects names that end up empty.
    ///
    /// Truncation is silent: two filenames sharing their first 50 valid
    /// characters map to the same key, and the later upload overwrites the
    /// earlier one.
    pub fn sanitize(raw: &str) -> StorageResult<Self> {
        let mut key: String = raw.chars().filter(|c| is_key_char(*c)).collect();

        // Only ASCII survives the filter, so byte truncation is char-safe.
        let trimmed = key.trim_end_matches('.').len();
        key.truncate(trimmed.min(MAX_KEY_LENGTH));
        let trimmed = key.trim_end_matches('.').len();
        key.truncate(trimmed);

        if key.trim().is_empty() {
            return Err(StorageError::InvalidKey(format!(
                "File name '{}' contains no usable characters",
                raw.escape_debug()
            )));
        }

        Ok(ObjectKey(key))
    }

    /// Accept `raw` only if it already is a valid key.
    ///
    /// Equivalent to `sanitize(raw) == raw`; nothing is rewritten.
    pub fn parse(raw: &str) -> StorageResult<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_KEY_LENGTH
            && raw.chars().all(is_key_char)
            && !raw.ends_with('.');

        if valid {
            Ok(ObjectKey(raw.to_string()))
        } else {
            Err(StorageError::InvalidKey(format!(
                "'{}' is not a valid object key",
                raw.escape_debug()
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}
