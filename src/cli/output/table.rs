//! Table output for fix histories and classified errors using comfy-table.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use super::truncate;
use crate::domain::models::{ErrorRecord, FixRecord, FixStatus, JobStatus};

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// One row per fix attempt, in the order they were made.
    pub fn format_fixes(&self, fixes: &[FixRecord]) -> String {
        let mut table = self.create_base_table();
        table.set_header(bold_header(&["File", "Line", "Type", "Status", "Commit"]));

        for fix in fixes {
            let status_cell = if self.use_colors {
                Cell::new(fix.status).fg(fix_status_color(fix.status))
            } else {
                Cell::new(fix.status)
            };

            table.add_row(vec![
                Cell::new(truncate(&fix.file, 40)),
                Cell::new(fix.line),
                Cell::new(fix.bug_type),
                status_cell,
                Cell::new(truncate(fix.summary_line(), 70)),
            ]);
        }

        table.to_string()
    }

    pub fn format_errors(&self, errors: &[ErrorRecord]) -> String {
        let mut table = self.create_base_table();
        table.set_header(bold_header(&["File", "Line", "Type", "Message"]));

        for error in errors {
            table.add_row(vec![
                Cell::new(truncate(&error.file, 40)),
                Cell::new(error.line),
                Cell::new(error.bug_type),
                Cell::new(truncate(&error.message, 80)),
            ]);
        }

        table.to_string()
    }

    /// Status text, colored when the terminal allows it.
    pub fn format_job_status(&self, status: JobStatus) -> String {
        if !self.use_colors {
            return status.to_string();
        }
        let code = match status {
            JobStatus::Passed => "32",
            JobStatus::Finished => "33",
            JobStatus::Error => "31",
            JobStatus::Queued | JobStatus::Running | JobStatus::Fixing => "36",
        };
        format!("\x1b[{code}m{status}\x1b[0m")
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width);
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn bold_header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|title| Cell::new(title).add_attribute(Attribute::Bold))
        .collect()
}

/// Check whether the terminal supports colors
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

const fn fix_status_color(status: FixStatus) -> Color {
    match status {
        FixStatus::AiFixed => Color::Green,
        FixStatus::Annotated => Color::Yellow,
        FixStatus::Skipped => Color::DarkGrey,
    }
}
