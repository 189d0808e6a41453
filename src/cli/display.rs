//! Display formatting for CLI output
//!
//! SBIO pattern: Pure functions that format data for display

use serde::Serialize;

use crate::resource::ResourceDiff;

/// Pretty JSON for stdout, terminated by a newline
pub fn format_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut output = serde_json::to_string_pretty(value)?;
    output.push('\n');
    Ok(output)
}

/// Human readable before/after block for the log
pub fn format_diff(diff: &ResourceDiff) -> String {
    let mut output = String::new();
    output.push_str("--- before\n");
    for line in diff.before.lines() {
        output.push_str(&format!("-{}\n", line));
    }
    output.push_str("+++ after\n");
    for line in diff.after.lines() {
        output.push_str(&format!("+{}\n", line));
    }
    output
}
