//! Wire formats for subtasks and execution results.
//!
//! Serialization is the easy direction. Parsing has to survive raw LLM
//! output: [`parse_task_result`] first looks for a fenced block labeled with
//! a format name, then falls back to probing the raw text (and the first
//! unlabeled fence) with every parser. Probe order is fixed and documented
//! on [`TaskFormat::PROBE_ORDER`] so an ambiguous payload always resolves
//! the same way.

pub mod json;
pub mod markdown;
pub mod xml;
pub mod yaml;

use crate::models::{ExecutionResult, Subtask};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use subtask_manager_sdk::TaskPayload;

/// Wire format selector, shared by a whole manager instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskFormat {
    Json,
    Markdown,
    Yaml,
    Xml,
}

impl TaskFormat {
    /// Deterministic order in which parsers are probed when the input does
    /// not self-identify. Structured data first, then the text formats.
    pub const PROBE_ORDER: [TaskFormat; 4] = [
        TaskFormat::Json,
        TaskFormat::Markdown,
        TaskFormat::Yaml,
        TaskFormat::Xml,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskFormat::Json => "json",
            TaskFormat::Markdown => "markdown",
            TaskFormat::Yaml => "yaml",
            TaskFormat::Xml => "xml",
        }
    }
}

impl Default for TaskFormat {
    fn default() -> Self {
        TaskFormat::Json
    }
}

impl fmt::Display for TaskFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(TaskFormat::Json),
            "markdown" | "md" => Ok(TaskFormat::Markdown),
            "yaml" | "yml" => Ok(TaskFormat::Yaml),
            "xml" => Ok(TaskFormat::Xml),
            other => Err(format!("unknown task format: {other}")),
        }
    }
}

/// Wrap textual output in a fenced block labeled with the format name, so a
/// consumer can self-identify the encoding.
fn wrap_hint(text: String, format: TaskFormat) -> String {
    format!("```{}\n{}\n```", format.as_str(), text)
}

/// Serialize one subtask. JSON yields structured data; the text formats
/// yield a string, fenced when `type_hint` is set.
pub fn format_subtask(task: &Subtask, format: TaskFormat, type_hint: bool) -> TaskPayload {
    match format {
        TaskFormat::Json => TaskPayload::Structured(json::subtask_to_value(task)),
        TaskFormat::Markdown => text_payload(markdown::subtask_to_markdown(task), format, type_hint),
        TaskFormat::Yaml => text_payload(yaml::subtask_to_yaml(task), format, type_hint),
        TaskFormat::Xml => text_payload(xml::subtask_to_xml(task, 0), format, type_hint),
    }
}

/// Serialize an ordered list of subtasks.
pub fn format_subtasks(tasks: &[Subtask], format: TaskFormat, type_hint: bool) -> TaskPayload {
    match format {
        TaskFormat::Json => TaskPayload::Structured(serde_json::Value::Array(
            tasks.iter().map(json::subtask_to_value).collect(),
        )),
        TaskFormat::Markdown => text_payload(
            tasks
                .iter()
                .map(markdown::subtask_to_markdown)
                .collect::<Vec<_>>()
                .join("\n"),
            format,
            type_hint,
        ),
        TaskFormat::Yaml => text_payload(
            tasks
                .iter()
                .map(yaml::subtask_to_yaml)
                .collect::<Vec<_>>()
                .join("\n"),
            format,
            type_hint,
        ),
        TaskFormat::Xml => {
            let inner = tasks
                .iter()
                .map(|t| xml::subtask_to_xml(t, 1))
                .collect::<Vec<_>>()
                .join("\n");
            text_payload(format!("<subtasks>\n{inner}\n</subtasks>"), format, type_hint)
        }
    }
}

/// Serialize an execution result.
pub fn format_task_result(
    result: &ExecutionResult,
    format: TaskFormat,
    type_hint: bool,
) -> TaskPayload {
    match format {
        TaskFormat::Json => TaskPayload::Structured(json::result_to_value(result)),
        TaskFormat::Markdown => {
            text_payload(markdown::result_to_markdown(result), format, type_hint)
        }
        TaskFormat::Yaml => text_payload(yaml::result_to_yaml(result), format, type_hint),
        TaskFormat::Xml => text_payload(xml::result_to_xml(result), format, type_hint),
    }
}

fn text_payload(text: String, format: TaskFormat, type_hint: bool) -> TaskPayload {
    if type_hint {
        TaskPayload::Text(wrap_hint(text, format))
    } else {
        TaskPayload::Text(text)
    }
}

fn parse_with(format: TaskFormat, text: &str) -> Option<ExecutionResult> {
    match format {
        TaskFormat::Json => json::parse_task_result(text),
        TaskFormat::Markdown => markdown::parse_task_result(text),
        TaskFormat::Yaml => yaml::parse_task_result(text),
        TaskFormat::Xml => xml::parse_task_result(text),
    }
}

/// Extract the contents of the first fenced block labeled `label`.
fn extract_fenced_block(text: &str, label: &str) -> Option<String> {
    let marker = format!("```{label}");
    let start = text.find(&marker)? + marker.len();
    let rest = &text[start..];
    // The label must end the fence line, otherwise ```json would also match
    // a ```jsonc fence.
    let mut chars = rest.chars();
    match chars.next() {
        Some('\n') => {}
        Some('\r') if chars.next() == Some('\n') => {}
        _ => return None,
    }
    let body_start = start + (rest.len() - chars.as_str().len());
    let body = &text[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim().to_string())
}

/// Extract the first fenced block regardless of its label (the label line,
/// if any, is dropped).
fn extract_any_fenced_block(text: &str) -> Option<String> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let body_start = rest.find('\n')? + 1;
    let body = &rest[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim().to_string())
}

/// Parse a worker's free-text reply into an [`ExecutionResult`].
///
/// Never panics; anything unrecoverable yields `None`.
pub fn parse_task_result(raw: &str) -> Option<ExecutionResult> {
    parse_task_result_preferring(raw, None)
}

/// Like [`parse_task_result`], but probes `preferred` first when set. The
/// manager passes its configured format here so a worker replying in kind is
/// matched before the generic scan.
pub fn parse_task_result_preferring(
    raw: &str,
    preferred: impl Into<Option<TaskFormat>>,
) -> Option<ExecutionResult> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let order = probe_order(preferred.into());

    // 1. Self-identified fenced blocks win.
    for format in &order {
        if let Some(block) = extract_fenced_block(raw, format.as_str()) {
            if let Some(result) = parse_with(*format, &block) {
                return Some(result);
            }
        }
    }

    // 2. Probe the raw text directly.
    for format in &order {
        if let Some(result) = parse_with(*format, trimmed) {
            return Some(result);
        }
    }

    // 3. Last resort: an unlabeled (or unknown-labeled) fence.
    if let Some(block) = extract_any_fenced_block(raw) {
        for format in &order {
            if let Some(result) = parse_with(*format, &block) {
                return Some(result);
            }
        }
    }

    None
}

fn probe_order(preferred: Option<TaskFormat>) -> Vec<TaskFormat> {
    match preferred {
        None => TaskFormat::PROBE_ORDER.to_vec(),
        Some(first) => {
            let mut order = vec![first];
            order.extend(TaskFormat::PROBE_ORDER.iter().copied().filter(|f| *f != first));
            order
        }
    }
}
