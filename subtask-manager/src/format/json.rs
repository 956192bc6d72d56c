//! JSON codec: the canonical, lossless encoding.
//!
//! Parsing tries strict JSON first, then a permissive pass that rewrites
//! Python-literal dicts (single quotes, `True`/`False`/`None`) into JSON
//! before retrying.

use crate::models::{ExecutionResult, Subtask};
use serde_json::{json, Value};

pub(crate) fn subtask_to_value(task: &Subtask) -> Value {
    json!({
        "task_id": task.task_id,
        "title": task.title,
        "description": task.description,
        "status": task.status.as_str(),
    })
}

pub(crate) fn result_to_value(result: &ExecutionResult) -> Value {
    json!({
        "task_id": result.task_id,
        "status": result.status.as_str(),
        "output": result.output,
        "summary": result.summary,
    })
}

pub(crate) fn parse_task_result(text: &str) -> Option<ExecutionResult> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => serde_json::from_str(&normalize_literal(text)).ok()?,
    };
    ExecutionResult::from_value(&value)
}

/// Rewrite a Python-literal-style dict into JSON: single-quoted strings
/// become double-quoted (with embedded quotes escaped) and the bare
/// constants map to their JSON spellings. Text inside double-quoted strings
/// is left untouched.
fn normalize_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut plain = String::new();
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                flush_plain(&mut plain, &mut out);
                out.push('"');
                while let Some(c2) = chars.next() {
                    out.push(c2);
                    match c2 {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                out.push(escaped);
                            }
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '\'' => {
                flush_plain(&mut plain, &mut out);
                out.push('"');
                while let Some(c2) = chars.next() {
                    match c2 {
                        '\\' => match chars.next() {
                            // \' inside a single-quoted literal is a plain quote
                            Some('\'') => out.push('\''),
                            Some(other) => {
                                out.push('\\');
                                out.push(other);
                            }
                            None => break,
                        },
                        '\'' => break,
                        '"' => out.push_str("\\\""),
                        other => out.push(other),
                    }
                }
                out.push('"');
            }
            other => plain.push(other),
        }
    }
    flush_plain(&mut plain, &mut out);
    out
}

fn flush_plain(plain: &mut String, out: &mut String) {
    if plain.is_empty() {
        return;
    }
    let replaced = plain
        .replace("True", "true")
        .replace("False", "false")
        .replace("None", "null");
    out.push_str(&replaced);
    plain.clear();
}
