// Pattern Matching Utilities
// Wildcard matching of record field values, used for exclude rules

use serde::{Deserialize, Serialize};

use crate::core::record::FieldSource;

/// Check if a value matches a pattern (case-insensitive, `*` wildcard)
pub fn matches_pattern(value: &str, pattern: &str) -> bool {
    let value = value.to_lowercase();
    let pattern = pattern.to_lowercase();

    if !pattern.contains('*') {
        return value == pattern;
    }

    // At least two parts, since the pattern contains a wildcard
    let parts: Vec<&str> = pattern.split('*').collect();
    let first = parts[0];
    let last = parts[parts.len() - 1];
    let middle = &parts[1..parts.len() - 1];

    let Some(remaining) = value.strip_prefix(first) else {
        return false;
    };

    // Anchor the last segment at the end, match the middle ones in order
    let mut cursor = 0;
    for part in middle {
        match remaining[cursor..].find(part) {
            Some(pos) => cursor += pos + part.len(),
            None => return false,
        }
    }

    remaining.len() >= cursor + last.len() && remaining[cursor..].ends_with(last)
}

/// One exclude rule: records whose `field` matches `pattern` are dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPattern {
    pub field: String,
    pub pattern: String,
}

impl FieldPattern {
    pub fn new(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    /// A record without the field never matches
    pub fn matches<R: FieldSource + ?Sized>(&self, record: &R) -> bool {
        record
            .field(&self.field)
            .is_some_and(|value| matches_pattern(value, &self.pattern))
    }
}

/// Pattern matcher for record exclusions
#[derive(Debug, Clone, Default)]
pub struct FieldMatcher {
    rules: Vec<FieldPattern>,
}

impl FieldMatcher {
    pub fn new(rules: Vec<FieldPattern>) -> Self {
        Self { rules }
    }

    /// First rule excluding this record, if any
    pub fn excluded_by<R: FieldSource + ?Sized>(&self, record: &R) -> Option<&FieldPattern> {
        self.rules.iter().find(|rule| rule.matches(record))
    }

    pub fn should_exclude<R: FieldSource + ?Sized>(&self, record: &R) -> bool {
        self.excluded_by(record).is_some()
    }

    pub fn rules(&self) -> &[FieldPattern] {
        &self.rules
    }
}
