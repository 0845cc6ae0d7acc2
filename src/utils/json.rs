use serde_json::Value;

/// A JSON field that may be left out of a partial update.
#[derive(Debug, PartialEq, Eq)]
pub enum OptionalString {
    Omitted,
    String(String),
}

impl OptionalString {
    pub fn into_option(self) -> Option<String> {
        match self {
            OptionalString::Omitted => None,
            OptionalString::String(value) => Some(value),
        }
    }
}

/// Classifies `body[field]`. `null` is rejected because it is neither "leave unchanged" nor text.
pub fn classify_optional_string(body: &Value, field: &str) -> Result<OptionalString, String> {
    match body.get(field) {
        None => Ok(OptionalString::Omitted),
        Some(Value::String(s)) => Ok(OptionalString::String(s.to_owned())),
        Some(Value::Null) => Err(format!("{field} must be a string, not null")),
        Some(other) => Err(format!("{field}: expected string, got {other}")),
    }
}
