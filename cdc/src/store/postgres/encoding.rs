//! Text encoding of JSON values for type-cast statement parameters.
//!
//! Every parameter is sent as text and cast to the column's declared type, so the server
//! parses the value with that type's input function.

use serde_json::Value;

/// Encodes `value` for a column of type `column_type` (as printed by `format_type`).
///
/// Returns `None` for JSON `null`, which binds as SQL `NULL`.
pub fn encode_text(value: &Value, column_type: &str) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(value) => Some(value.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) => Some(text.clone()),
        Value::Array(elements) if is_array_type(column_type) => Some(array_literal(elements)),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn is_array_type(column_type: &str) -> bool {
    column_type.ends_with("[]")
}

/// Renders a Postgres array literal such as `{1,"a b",NULL,{2,3}}`.
fn array_literal(elements: &[Value]) -> String {
    let mut literal = String::from("{");
    for (i, element) in elements.iter().enumerate() {
        if i > 0 {
            literal.push(',');
        }
        match element {
            Value::Null => literal.push_str("NULL"),
            Value::Bool(value) => literal.push_str(if *value { "true" } else { "false" }),
            Value::Number(number) => literal.push_str(&number.to_string()),
            Value::String(text) => push_quoted(&mut literal, text),
            Value::Array(nested) => literal.push_str(&array_literal(nested)),
            Value::Object(_) => push_quoted(&mut literal, &element.to_string()),
        }
    }
    literal.push('}');

    literal
}

fn push_quoted(literal: &mut String, text: &str) {
    literal.push('"');
    for ch in text.chars() {
        if ch == '"' || ch == '\\' {
            literal.push('\\');
        }
        literal.push(ch);
    }
    literal.push('"');
}
