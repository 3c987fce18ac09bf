//! Error record domain model.
//!
//! An error record is one structured failure extracted from a test run's
//! output. Records are created fresh every iteration and never persisted.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Closed taxonomy of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BugType {
    /// Parser-level failure
    Syntax,
    /// Whitespace/indentation failure
    Indentation,
    /// Missing module or bad import path
    Import,
    /// Wrong type, undefined name, bad call
    TypeError,
    /// Style or lint violation
    Linting,
    /// Everything else, including failing assertions
    #[default]
    Logic,
}

impl BugType {
    /// All variants in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Syntax,
        Self::Indentation,
        Self::Import,
        Self::TypeError,
        Self::Linting,
        Self::Logic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Syntax => "SYNTAX",
            Self::Indentation => "INDENTATION",
            Self::Import => "IMPORT",
            Self::TypeError => "TYPE_ERROR",
            Self::Linting => "LINTING",
            Self::Logic => "LOGIC",
        }
    }

    /// Map an untrusted label onto the closed taxonomy.
    ///
    /// The label is trimmed and upper-cased first. Anything unrecognised
    /// becomes [`BugType::Logic`]; this never fails.
    pub fn coerce(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "SYNTAX" => Self::Syntax,
            "INDENTATION" => Self::Indentation,
            "IMPORT" => Self::Import,
            "TYPE_ERROR" => Self::TypeError,
            "LINTING" => Self::Linting,
            _ => Self::Logic,
        }
    }
}

impl fmt::Display for BugType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Deserialization goes through `coerce` so that a bad label from an
// external source can never produce a value outside the enum.
impl<'de> Deserialize<'de> for BugType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::coerce(&raw))
    }
}

/// A single structured failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Path as reported by the test output (usually relative to the repo root)
    pub file: String,

    /// 1-based line number, 0 when unknown
    pub line: u32,

    /// Failure family
    #[serde(rename = "type")]
    pub bug_type: BugType,

    /// Human readable description
    pub message: String,

    /// Optional extra context supplied by the producer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ErrorRecord {
    pub fn new(
        file: impl Into<String>,
        line: u32,
        bug_type: BugType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            line,
            bug_type,
            message: message.into(),
            context: None,
        }
    }

    /// Placeholder record used when a failing run yields nothing parseable.
    pub fn unparsed_failure(exit_code: i32) -> Self {
        Self::new(
            "unknown",
            0,
            BugType::Logic,
            format!(
                "Test runner exited with code {exit_code} but produced no parseable errors."
            ),
        )
    }

    /// Identity used when deduplicating classifier output.
    pub fn identity(&self) -> (&str, u32, BugType) {
        (self.file.as_str(), self.line, self.bug_type)
    }

    /// Copy of this record pointing at a different file.
    pub fn retargeted(&self, file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_known_labels() {
        assert_eq!(BugType::coerce("syntax"), BugType::Syntax);
        assert_eq!(BugType::coerce("  Type_Error "), BugType::TypeError);
        assert_eq!(BugType::coerce("INDENTATION"), BugType::Indentation);
    }

    #[test]
    fn test_coerce_unknown_label_is_logic() {
        assert_eq!(BugType::coerce("RUNTIME"), BugType::Logic);
        assert_eq!(BugType::coerce(""), BugType::Logic);
    }

    #[test]
    fn test_deserialize_coerces_type() {
        let json = r#"{"file": "a.py", "line": 3, "type": "SEGFAULT", "message": "boom"}"#;
        let record: ErrorRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.bug_type, BugType::Logic);
        assert_eq!(record.context, None);
    }

    #[test]
    fn test_negative_line_is_rejected() {
        let json = r#"{"file": "a.py", "line": -1, "type": "SYNTAX", "message": "x"}"#;
        assert!(serde_json::from_str::<ErrorRecord>(json).is_err());
    }

    #[test]
    fn test_serializes_type_field() {
        let record = ErrorRecord::new("a.py", 1, BugType::TypeError, "bad");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "TYPE_ERROR");
        assert!(value.get("context").is_none());
    }
}
