//! Parameter validation against a tool's declared schema
//!
//! Runs before confirmation and execution: fills declared defaults, coerces
//! obviously mistyped scalars, then checks required fields, types and enums.

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{OrcaError, OrcaResult};
use crate::tools::types::ToolSchema;

/// Validate and normalize call arguments in place
pub fn validate_arguments(
    schema: &ToolSchema,
    arguments: &mut HashMap<String, Value>,
) -> OrcaResult<()> {
    let empty = Map::new();
    let properties = schema
        .parameters
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    apply_defaults(properties, arguments);
    sanitize(properties, arguments);

    if let Some(required) = schema.parameters.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if arguments.get(field).is_none_or(Value::is_null) {
                return Err(OrcaError::validation_field(
                    field,
                    format!("Missing required parameter '{}' for {}", field, schema.name),
                ));
            }
        }
    }

    for (name, value) in arguments.iter() {
        let Some(spec) = properties.get(name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        if let Some(expected) = spec.get("type").and_then(Value::as_str) {
            if !type_matches(expected, value) {
                return Err(OrcaError::validation_field(
                    name,
                    format!(
                        "Parameter '{}' must be of type {}, got {}",
                        name,
                        expected,
                        type_name(value)
                    ),
                ));
            }
        }
        if let Some(allowed) = spec.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                return Err(OrcaError::validation_field(
                    name,
                    format!("Parameter '{}' must be one of {}", name, Value::from(allowed.clone())),
                ));
            }
        }
    }

    Ok(())
}

fn apply_defaults(properties: &Map<String, Value>, arguments: &mut HashMap<String, Value>) {
    for (name, spec) in properties {
        let Some(default) = spec.get("default") else {
            continue;
        };
        if arguments.get(name).is_none_or(Value::is_null) {
            arguments.insert(name.clone(), default.clone());
        }
    }
}

fn sanitize(properties: &Map<String, Value>, arguments: &mut HashMap<String, Value>) {
    for (name, value) in arguments.iter_mut() {
        if let Value::String(s) = value {
            if s.contains('\0') {
                *s = s.replace('\0', "");
            }
        }

        let Some(expected) = properties
            .get(name)
            .and_then(|spec| spec.get("type"))
            .and_then(Value::as_str)
        else {
            continue;
        };
        if let Some(coerced) = coerce(expected, value) {
            *value = coerced;
        }
    }
}

fn coerce(expected: &str, value: &Value) -> Option<Value> {
    let Value::String(s) = value else {
        return None;
    };
    let s = s.trim();
    match expected {
        "integer" => s.parse::<i64>().ok().map(Value::from),
        "number" => s
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Value::from),
        "boolean" => match s {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
