//! Reading ICD API entities.

use serde_json::Value;

/// A plain string, or the `@value` of a language-tagged string
/// (`{"@language": "en", "@value": "Cholera"}`).
pub fn lang_value(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(map) => map.get("@value").and_then(Value::as_str),
        _ => None,
    }
}

pub fn text<'a>(entity: &'a Value, key: &str) -> Option<&'a str> {
    entity.get(key).and_then(lang_value)
}

/// Drop the `<em class='found'>` highlighting search results carry.
pub fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
