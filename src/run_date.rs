use crate::error::{DailyFlowError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The logical date a run represents, used verbatim as a directory name.
///
/// The value is never parsed as a calendar date. Construction only rejects
/// strings that would escape or split a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunDate(String);

impl RunDate {
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = |reason: &str| DailyFlowError::InvalidRunDate {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        if value.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if value == "." || value == ".." {
            return Err(invalid("must not be a relative directory reference"));
        }
        if value.contains('/') || value.contains('\\') {
            return Err(invalid("must not contain a path separator"));
        }
        if value.contains('\0') {
            return Err(invalid("must not contain NUL bytes"));
        }

        Ok(Self(value.to_string()))
    }

    /// Today's local date in the scheduler's `YYYY-MM-DD` form.
    pub fn today() -> Self {
        Self(chrono::Local::now().format("%Y-%m-%d").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RunDate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
