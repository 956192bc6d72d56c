//! Tag-delimited ("xml") codec.
//!
//! Values are escaped on the way out and unescaped on the way in; this is a
//! simple tag format, not a full XML implementation. Parsing requires the
//! outer tag with its id attribute plus all three inner tags.

use crate::models::{ExecutionResult, Subtask};
use regex::Regex;
use std::sync::OnceLock;

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn unescape(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
}

pub(crate) fn subtask_to_xml(task: &Subtask, indent: usize) -> String {
    let pad = " ".repeat(indent * 4);
    let pad2 = " ".repeat((indent + 1) * 4);
    format!(
        "{pad}<task id=\"{}\">\n{pad2}<title>{}</title>\n{pad2}<description>{}</description>\n{pad2}<status>{}</status>\n{pad}</task>",
        escape(&task.task_id),
        escape(&task.title),
        escape(&task.description),
        escape(task.status.as_str()),
    )
}

pub(crate) fn result_to_xml(result: &ExecutionResult) -> String {
    format!(
        "<task_result task_id=\"{}\">\n    <status>{}</status>\n    <output>{}</output>\n    <summary>{}</summary>\n</task_result>",
        escape(&result.task_id),
        escape(result.status.as_str()),
        escape(&result.output),
        escape(&result.summary),
    )
}

fn outer_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<task_result\b[^>]*\btask_id\s*=\s*"([^"]*)"[^>]*>(.*?)</task_result>"#)
            .expect("task_result regex is valid")
    })
}

fn inner_regex(tag: &'static str) -> Regex {
    // Built per call; the three tags are fixed and the text is small.
    Regex::new(&format!(r"(?s)<{tag}>(.*?)</{tag}>")).expect("inner tag regex is valid")
}

pub(crate) fn parse_task_result(text: &str) -> Option<ExecutionResult> {
    let captures = outer_regex().captures(text)?;
    let task_id = unescape(captures.get(1)?.as_str());
    let body = captures.get(2)?.as_str();

    let status = unescape(inner_regex("status").captures(body)?.get(1)?.as_str());
    let output = unescape(inner_regex("output").captures(body)?.get(1)?.as_str());
    let summary = unescape(inner_regex("summary").captures(body)?.get(1)?.as_str());

    ExecutionResult::from_parts(&task_id, &status, &output, &summary)
}
