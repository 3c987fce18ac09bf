//! Annotation fallback: append a structured fix request instead of editing.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::models::{BugType, ErrorRecord};

const BORDER_WIDTH: usize = 66;
const RULE_WIDTH: usize = 64;
const INSTRUCTION_WIDTH: usize = 60;
const CONTEXT_RADIUS: usize = 5;
const LOG_TAIL_LINES: usize = 5;

/// Header line that marks an annotation block.
pub const ANNOTATION_HEADER: &str = "# [AI-AGENT FIX REQUIRED — NO API KEY / AI FIX FAILED]";

// Matches exactly what `annotate` appends, including the two leading newlines,
// so stripping is the inverse of appending.
static ANNOTATION_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\n\n#={10,}\n# \[AI-AGENT FIX REQUIRED.*?\n#={10,}\n")
        .expect("annotation pattern is valid")
});

/// Remove every annotation block left behind by earlier passes.
pub fn strip_annotations(content: &str) -> String {
    ANNOTATION_BLOCK.replace_all(content, "").into_owned()
}

/// Step-by-step instruction for a human or agent, keyed by bug type.
pub fn instruction(error: &ErrorRecord) -> String {
    let line = error.line;
    let base = match error.bug_type {
        BugType::Syntax => format!(
            "Fix the syntax error at line {line}. Check for missing colons, parentheses, or quotes."
        ),
        BugType::Indentation => format!(
            "Correct the indentation at line {line}. Ensure consistent spaces (no mixed tabs/spaces)."
        ),
        BugType::Import => format!(
            "Resolve the import failure at line {line}. Install the missing package or fix the module path."
        ),
        BugType::TypeError => format!(
            "Fix the type mismatch at line {line}. Check variable types, None returns, and undefined references."
        ),
        BugType::Linting => format!(
            "Clean up the code style issue at line {line}. Remove unused imports or fix whitespace."
        ),
        BugType::Logic => format!(
            "Fix the logic error at line {line}. Review the failing assertion and ensure the correct output is produced."
        ),
    };

    if error.message.trim().is_empty() {
        base
    } else {
        format!("{base} Error: {}", error.message.trim())
    }
}

/// Short form used in commit messages.
pub fn short_description(bug_type: BugType) -> &'static str {
    match bug_type {
        BugType::Syntax => "fix the syntax error",
        BugType::Indentation => "align indentation",
        BugType::Import => "resolve missing import",
        BugType::TypeError => "fix type mismatch",
        BugType::Linting => "clean code style",
        BugType::Logic => "correct the logic",
    }
}

/// Deterministic annotator. Always available, never touches existing text.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotationFixer;

impl AnnotationFixer {
    pub fn new() -> Self {
        Self
    }

    /// `content` with an annotation block appended.
    ///
    /// The result always starts with `content` byte for byte.
    pub fn annotate(&self, error: &ErrorRecord, content: &str, logs: &str) -> String {
        let mut out = String::with_capacity(content.len() + 2048);
        out.push_str(content);
        out.push_str(&self.render_block(error, content, logs));
        out
    }

    fn render_block(&self, error: &ErrorRecord, content: &str, logs: &str) -> String {
        let border = format!("#{}", "=".repeat(BORDER_WIDTH));
        let rule = format!("# {}", "─".repeat(RULE_WIDTH));

        let mut lines = vec![
            String::new(),
            String::new(),
            border.clone(),
            ANNOTATION_HEADER.to_string(),
            rule.clone(),
            format!("#   Bug Type   : {}", error.bug_type),
            format!("#   File       : {}", error.file),
            format!("#   Line       : {}", error.line),
            format!("#   Error      : {}", single_line(&error.message)),
            rule.clone(),
            "#   INSTRUCTION:".to_string(),
        ];
        lines.extend(
            wrap(&instruction(error), INSTRUCTION_WIDTH)
                .into_iter()
                .map(|l| format!("#   {l}")),
        );

        lines.push(rule.clone());
        lines.push("#   CODE CONTEXT:".to_string());
        lines.extend(code_context(content, error.line));

        lines.push(rule);
        lines.push("#   TEST OUTPUT (tail):".to_string());
        lines.extend(log_tail(logs));
        lines.push(border);

        // Leading empty entries become the two separating newlines.
        let mut block = lines.join("\n");
        block.push('\n');
        block
    }
}

fn single_line(text: &str) -> String {
    text.lines().map(str::trim).collect::<Vec<_>>().join(" ")
}

fn code_context(content: &str, line: u32) -> Vec<String> {
    if content.is_empty() || line == 0 {
        return vec!["#   (no source context available)".to_string()];
    }

    let source: Vec<&str> = content.lines().collect();
    let target = line as usize;
    if target > source.len() {
        return vec!["#   (no source context available)".to_string()];
    }

    let first = target.saturating_sub(CONTEXT_RADIUS).max(1);
    let last = (target + CONTEXT_RADIUS).min(source.len());
    (first..=last)
        .map(|n| {
            let marker = if n == target { ">>>" } else { "   " };
            format!("#   {marker} {n:4} | {}", source[n - 1])
        })
        .collect()
}

fn log_tail(logs: &str) -> Vec<String> {
    let non_empty: Vec<&str> = logs.lines().filter(|l| !l.trim().is_empty()).collect();
    if non_empty.is_empty() {
        return vec!["#   (no log output)".to_string()];
    }
    non_empty[non_empty.len().saturating_sub(LOG_TAIL_LINES)..]
        .iter()
        .map(|l| format!("#   {}", l.trim_end()))
        .collect()
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
