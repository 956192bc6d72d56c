//! Indented-mapping ("yaml") codec.
//!
//! The serialized shape is a single-key mapping keyed by the task id. The
//! parser also accepts a flat mapping that carries `task_id` as a field,
//! since workers frequently flatten the wrapper.

use crate::models::{ExecutionResult, Subtask};
use serde_yaml::{Mapping, Value as YamlValue};

pub(crate) fn subtask_to_yaml(task: &Subtask) -> String {
    let mut body = Mapping::new();
    body.insert("title".into(), task.title.clone().into());
    body.insert("description".into(), task.description.clone().into());
    body.insert("status".into(), task.status.as_str().into());

    let mut doc = Mapping::new();
    doc.insert(YamlValue::String(task.task_id.clone()), YamlValue::Mapping(body));
    serde_yaml::to_string(&doc).unwrap_or_default()
}

pub(crate) fn result_to_yaml(result: &ExecutionResult) -> String {
    let mut body = Mapping::new();
    body.insert("task_id".into(), result.task_id.clone().into());
    body.insert("status".into(), result.status.as_str().into());
    body.insert("output".into(), result.output.clone().into());
    body.insert("summary".into(), result.summary.clone().into());

    let mut doc = Mapping::new();
    doc.insert(YamlValue::String(result.task_id.clone()), YamlValue::Mapping(body));
    serde_yaml::to_string(&doc).unwrap_or_default()
}

fn yaml_key_to_string(key: &YamlValue) -> Option<String> {
    match key {
        YamlValue::String(s) => Some(s.clone()),
        // Unquoted numeric keys parse as numbers; tolerate them.
        YamlValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn parse_task_result(text: &str) -> Option<ExecutionResult> {
    let value: YamlValue = serde_yaml::from_str(text).ok()?;
    let map = value.as_mapping()?;

    // Flat mapping with an explicit task_id field.
    if map.iter().any(|(k, _)| k.as_str() == Some("task_id")) {
        let json = serde_json::to_value(map).ok()?;
        return ExecutionResult::from_value(&json);
    }

    // Single-key wrapper: the key supplies the id when the body omits it.
    if map.len() == 1 {
        let (key, body) = map.iter().next()?;
        let task_id = yaml_key_to_string(key)?;
        body.as_mapping()?;
        let mut json = serde_json::to_value(body).ok()?;
        let obj = json.as_object_mut()?;
        if !obj.contains_key("task_id") {
            obj.insert("task_id".to_string(), serde_json::Value::String(task_id));
        }
        return ExecutionResult::from_value(&json);
    }

    None
}
