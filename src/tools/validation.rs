//! Tool argument validation against JSON schemas.
//!
//! Validates that arguments from the conversation engine conform to the
//! tool's declared JSON schema before any side effect happens. Checks
//! required fields, type constraints, `enum` membership and `minLength`,
//! then fills in declared `default` values.
//!
//! # Examples
//!
//! ```
//! use quarry::tools::validation::validate_tool_args;
//!
//! let schema = serde_json::json!({
//!     "type": "object",
//!     "properties": {
//!         "query": { "type": "string", "minLength": 1 },
//!         "depth": { "type": "string", "enum": ["basic", "advanced"], "default": "advanced" }
//!     },
//!     "required": ["query"]
//! });
//!
//! let args = validate_tool_args("extreme_search", r#"{"query": "rust"}"#, &schema).unwrap();
//! assert_eq!(args["depth"], "advanced");
//! ```

use crate::error::ToolError;

/// Validate tool arguments JSON against a JSON schema.
///
/// Parses `args_json` as JSON, then validates against `schema`:
/// - All fields listed in `"required"` must be present
/// - Field types must match those declared in `"properties"`
/// - String fields honour `"enum"` and `"minLength"`
/// - Absent fields with a `"default"` are filled in
/// - Extra fields not in the schema are allowed (open schema)
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] if:
/// - `args_json` is not valid JSON or not an object
/// - A required field is missing
/// - A field has the wrong type, is outside its enum, or is too short
pub fn validate_tool_args(
    tool_name: &str,
    args_json: &str,
    schema: &serde_json::Value,
) -> Result<serde_json::Value, ToolError> {
    let raw = if args_json.trim().is_empty() { "{}" } else { args_json };
    let mut value: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
        ToolError::InvalidArguments(format!("tool '{tool_name}': invalid JSON arguments: {e}"))
    })?;

    let schema_type = schema.get("type").and_then(|t| t.as_str()).unwrap_or("");
    if schema_type != "object" {
        return Ok(value);
    }

    let type_name = json_type_name(&value);
    let Some(obj) = value.as_object_mut() else {
        return Err(ToolError::InvalidArguments(format!(
            "tool '{tool_name}': expected object arguments, got {type_name}"
        )));
    };

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for req_field in required {
            if let Some(field_name) = req_field.as_str()
                && !obj.contains_key(field_name)
            {
                return Err(ToolError::InvalidArguments(format!(
                    "tool '{tool_name}': missing required field '{field_name}'"
                )));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (key, val) in obj.iter() {
            if let Some(prop_schema) = properties.get(key) {
                validate_field(tool_name, key, val, prop_schema)?;
            }
        }

        for (key, prop_schema) in properties {
            if !obj.contains_key(key)
                && let Some(default) = prop_schema.get("default")
            {
                obj.insert(key.clone(), default.clone());
            }
        }
    }

    Ok(value)
}

/// Validate one field's value against its property schema.
fn validate_field(
    tool_name: &str,
    field_name: &str,
    value: &serde_json::Value,
    prop_schema: &serde_json::Value,
) -> Result<(), ToolError> {
    if let Some(expected_type) = prop_schema.get("type").and_then(|t| t.as_str()) {
        let matches = match expected_type {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "integer" => value.is_i64() || value.is_u64(),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            "null" => value.is_null(),
            _ => true,
        };
        if !matches {
            return Err(ToolError::InvalidArguments(format!(
                "tool '{tool_name}': field '{field_name}' expected {expected_type}, got {}",
                json_type_name(value)
            )));
        }
    }

    if let Some(allowed) = prop_schema.get("enum").and_then(|e| e.as_array())
        && !allowed.contains(value)
    {
        let options: Vec<String> = allowed.iter().map(ToString::to_string).collect();
        return Err(ToolError::InvalidArguments(format!(
            "tool '{tool_name}': field '{field_name}' must be one of {}, got {value}",
            options.join(", ")
        )));
    }

    if let Some(min) = prop_schema.get("minLength").and_then(|m| m.as_u64())
        && let Some(s) = value.as_str()
        && (s.chars().count() as u64) < min
    {
        return Err(ToolError::InvalidArguments(format!(
            "tool '{tool_name}': field '{field_name}' must be at least {min} characters"
        )));
    }

    Ok(())
}

/// Get a human-readable name for a JSON value's type.
fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else {
                "number"
            }
        }
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
