//! Deterministic, pattern-based log classification.
//!
//! One rule per failure family; each rule emits zero or more records and
//! the combined output is deduplicated by `(file, line, type)`.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use super::{dedup_records, ClassificationStrategy};
use crate::domain::models::{BugType, ErrorRecord};

/// How many lines after a `File "…", line N` frame the exception may appear.
const TRACEBACK_LOOKAHEAD: usize = 4;

/// How far past an assertion marker the assertion detail is searched.
const ASSERTION_LOOKAHEAD_BYTES: usize = 200;

static TRACEBACK_FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"File "([^"]+)", line (\d+)"#).expect("traceback frame pattern is valid")
});

static TRACEBACK_EXCEPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"((?:SyntaxError|IndentationError|ImportError|ModuleNotFoundError|TypeError|NameError): .*)",
    )
    .expect("exception pattern is valid")
});

static COMPILER_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([./\w-]+\.(?:js|ts|jsx|tsx)):(\d+):\d+").expect("compiler pattern is valid")
});

static ASSERTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([^:\n\s]+\.py):(\d+): Assertion\w*Error").expect("assertion pattern is valid")
});

static ASSERT_EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"assert (.+)").expect("assert pattern is valid"));

static WHERE_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\+\s+where .+ = (\w+)\(").expect("where pattern is valid")
});

static BUILD_TASK_FAILED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"> Task :(\S+) FAILED").expect("task pattern is valid"));

/// Always-available classifier built from fixed regex rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleClassifier;

impl RuleClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify `logs` into deduplicated records, in first-seen order.
    ///
    /// Pure function of its input; never panics on arbitrary text.
    pub fn classify(&self, logs: &str) -> Vec<ErrorRecord> {
        if logs.trim().is_empty() {
            return Vec::new();
        }

        let mut records = traceback_errors(logs);
        records.extend(compiler_errors(logs));
        records.extend(assertion_errors(logs));
        records.extend(build_task_errors(logs));
        dedup_records(records)
    }
}

#[async_trait]
impl ClassificationStrategy for RuleClassifier {
    fn name(&self) -> &'static str {
        "rules"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn classify(&self, logs: &str) -> Option<Vec<ErrorRecord>> {
        Some(Self::classify(self, logs))
    }
}

/// Map an exception line onto the taxonomy.
pub fn classify_exception(text: &str) -> BugType {
    let upper = text.to_uppercase();
    if upper.contains("SYNTAX") {
        BugType::Syntax
    } else if upper.contains("INDENTATION") {
        BugType::Indentation
    } else if upper.contains("IMPORT") || upper.contains("MODULE") {
        BugType::Import
    } else if upper.contains("TYPE") || upper.contains("NAME") {
        BugType::TypeError
    } else {
        BugType::Logic
    }
}

/// Interpreter tracebacks: a frame line followed shortly by an exception line.
fn traceback_errors(logs: &str) -> Vec<ErrorRecord> {
    let lines: Vec<&str> = logs.lines().collect();
    let mut records = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let Some(frame) = TRACEBACK_FRAME.captures(line) else {
            continue;
        };
        let Ok(line_no) = frame[2].parse::<u32>() else {
            continue;
        };

        let window_end = (idx + 1 + TRACEBACK_LOOKAHEAD).min(lines.len());
        for follower in &lines[idx + 1..window_end] {
            // A deeper frame owns whatever exception comes next.
            if TRACEBACK_FRAME.is_match(follower) {
                break;
            }
            if let Some(exception) = TRACEBACK_EXCEPTION.captures(follower) {
                let message = exception[1].trim().to_string();
                records.push(ErrorRecord::new(
                    &frame[1],
                    line_no,
                    classify_exception(&message),
                    message,
                ));
                break;
            }
        }
    }

    records
}

/// `path.ts:12:5` style locations from JS/TS toolchains.
fn compiler_errors(logs: &str) -> Vec<ErrorRecord> {
    COMPILER_LOCATION
        .captures_iter(logs)
        .filter_map(|caps| {
            let line = caps[2].parse::<u32>().ok()?;
            Some(ErrorRecord::new(
                &caps[1],
                line,
                BugType::Syntax,
                "JS/TS syntax or compilation error detected",
            ))
        })
        .collect()
}

/// pytest assertion failures, with the asserted expression and the source
/// function named by a `+ where` clause when present.
fn assertion_errors(logs: &str) -> Vec<ErrorRecord> {
    if !logs.contains("assert") && !logs.contains("AssertionError") {
        return Vec::new();
    }

    ASSERTION_MARKER
        .captures_iter(logs)
        .filter_map(|caps| {
            let marker = caps.get(0)?;
            let line = caps[2].parse::<u32>().ok()?;

            let block_start = logs[..marker.start()].rfind("___").unwrap_or(0);
            let block_end = floor_char_boundary(logs, marker.end() + ASSERTION_LOOKAHEAD_BYTES);
            let block = &logs[block_start..block_end];

            let assert_detail = ASSERT_EXPRESSION
                .find(block)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            let source_function = WHERE_CLAUSE.captures(block).map(|w| w[1].to_string());

            let mut message = format!("Assertion failed: {assert_detail}");
            if let Some(function) = source_function {
                message.push_str(&format!(" (source function: {function})"));
            }

            Some(ErrorRecord::new(
                caps[1].trim(),
                line,
                BugType::Logic,
                message,
            ))
        })
        .collect()
}

/// Gradle-style `> Task :name FAILED` summaries.
fn build_task_errors(logs: &str) -> Vec<ErrorRecord> {
    BUILD_TASK_FAILED
        .captures_iter(logs)
        .map(|caps| {
            ErrorRecord::new(
                &caps[1],
                0,
                BugType::Logic,
                format!("Gradle task failed: :{}", &caps[1]),
            )
        })
        .collect()
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut idx = index;
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
