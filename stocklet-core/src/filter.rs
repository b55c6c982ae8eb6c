use regex::{Regex, RegexBuilder};

use crate::error::AppError;

/// Case-insensitive substring filter built from user-supplied text.
///
/// The text is escaped before it becomes a pattern, so `"PT. A (Pusat)"`
/// matches literally. The same escaped pattern is used in memory and in
/// SQL through Postgres' `~*` operator.
#[derive(Debug, Clone)]
pub struct NameFilter {
    pattern: String,
    regex: Regex,
}

impl NameFilter {
    /// Returns `None` for missing or blank text.
    pub fn from_query(text: Option<&str>) -> Result<Option<Self>, AppError> {
        let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(None);
        };

        let pattern = regex::escape(text);
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| AppError::Validation(format!("Invalid search text: {}", e)))?;

        Ok(Some(Self { pattern, regex }))
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// Escaped pattern suitable for binding to a `~*` comparison.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}
