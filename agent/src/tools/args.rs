//! Typed access to untrusted tool arguments.

use serde_json::{Map, Value};

use crate::tools::ToolError;

pub(crate) fn required_str<'a>(
    tool: &str,
    args: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, ToolError> {
    optional_str(tool, args, key)?.ok_or_else(|| ToolError::InvalidArguments {
        tool: tool.to_string(),
        message: format!("missing required argument `{key}`"),
    })
}

pub(crate) fn optional_str<'a>(
    tool: &str,
    args: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a str>, ToolError> {
    match args.get(key) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(other) => Err(type_error(tool, key, "a string", other)),
    }
}

/// Read an optional list of strings.
pub(crate) fn optional_str_list(
    tool: &str,
    args: &Map<String, Value>,
    key: &str,
) -> Result<Vec<String>, ToolError> {
    let items = match args.get(key) {
        None => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => return Err(type_error(tool, key, "an array of strings", other)),
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(value) => Ok(value.clone()),
            other => Err(type_error(tool, key, "an array of strings", other)),
        })
        .collect()
}

fn type_error(tool: &str, key: &str, expected: &str, got: &Value) -> ToolError {
    ToolError::InvalidArguments {
        tool: tool.to_string(),
        message: format!("`{key}` must be {expected}, got {got}"),
    }
}
