//! Key-value-block ("markdown") codec.
//!
//! The serialized shape is a heading carrying the `[ID: ...]` marker plus
//! bold field lines; the parser is a line scanner that tolerates missing
//! bold markers, extra prose, and multi-line field values.

use crate::models::{ExecutionResult, Subtask};
use regex::Regex;
use std::sync::OnceLock;

pub(crate) fn subtask_to_markdown(task: &Subtask) -> String {
    format!(
        "### {} [ID: {}]\n**Description**: {}\n**Status**: {}\n",
        task.title, task.task_id, task.description, task.status
    )
}

pub(crate) fn result_to_markdown(result: &ExecutionResult) -> String {
    format!(
        "### RESULT [ID: {}]\n**Status**: {}\n**Output**: {}\n**Summary**: {}\n---",
        result.task_id, result.status, result.output, result.summary
    )
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Status,
    Output,
    Summary,
}

fn id_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[ID:\s*([^\]]+)\]").expect("id marker regex is valid"))
}

/// Match a field header line: optional `**`, a known field name, optional
/// closing `**`, then a colon. Returns the field and the rest of the line.
fn field_header(line: &str) -> Option<(Field, String)> {
    let trimmed = line.trim_start();
    let stripped = trimmed.strip_prefix("**").unwrap_or(trimmed);
    const FIELDS: [(&str, Field); 3] = [
        ("status", Field::Status),
        ("output", Field::Output),
        ("summary", Field::Summary),
    ];
    for (name, field) in FIELDS {
        let Some(head) = stripped.get(..name.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(name) {
            continue;
        }
        let rest = &stripped[name.len()..];
        let rest = rest.strip_prefix("**").unwrap_or(rest).trim_start();
        if let Some(value) = rest.strip_prefix(':') {
            return Some((field, value.trim().to_string()));
        }
    }
    None
}

pub(crate) fn parse_task_result(text: &str) -> Option<ExecutionResult> {
    let task_id = id_marker_regex()
        .captures(text)?
        .get(1)?
        .as_str()
        .trim()
        .to_string();

    let mut status: Option<String> = None;
    let mut output: Option<Vec<String>> = None;
    let mut summary: Option<Vec<String>> = None;
    let mut current: Option<Field> = None;

    for line in text.lines() {
        // A lone --- is the explicit end marker.
        if line.trim() == "---" {
            break;
        }
        if let Some((field, value)) = field_header(line) {
            match field {
                Field::Status => {
                    if status.is_none() {
                        status = Some(value);
                    }
                }
                Field::Output => output.get_or_insert_with(Vec::new).push(value),
                Field::Summary => summary.get_or_insert_with(Vec::new).push(value),
            }
            current = Some(field);
        } else {
            match current {
                // Status takes only the first line of its value.
                Some(Field::Status) | None => {}
                Some(Field::Output) => {
                    if let Some(buf) = output.as_mut() {
                        buf.push(line.to_string());
                    }
                }
                Some(Field::Summary) => {
                    if let Some(buf) = summary.as_mut() {
                        buf.push(line.to_string());
                    }
                }
            }
        }
    }

    ExecutionResult::from_parts(
        &task_id,
        &status?,
        &output?.join("\n"),
        &summary?.join("\n"),
    )
}
