use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Mercado Pago is inconsistent about ids: payment ids are JSON numbers, preference ids and references are strings.
/// Both are accepted and normalised to strings.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where D: Deserializer<'de> {
    let value = Value::deserialize(deserializer)?;
    value_to_id(&value).ok_or_else(|| serde::de::Error::custom(format!("expected a string or number, got {value}")))
}

pub fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where D: Deserializer<'de> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_id))
}

/// Renders a JSON scalar as an identifier. Empty strings, nulls, and structured values yield `None`.
pub fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::value_to_id;

    #[test]
    fn ids_from_json() {
        assert_eq!(value_to_id(&json!(123456789)).as_deref(), Some("123456789"));
        assert_eq!(value_to_id(&json!(" abc ")).as_deref(), Some("abc"));
        assert_eq!(value_to_id(&json!("")), None);
        assert_eq!(value_to_id(&json!(null)), None);
        assert_eq!(value_to_id(&json!({"id": 1})), None);
    }
}
