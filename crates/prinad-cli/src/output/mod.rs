pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Flatten nested objects into dotted keys, one row per record.
/// Arrays stay as JSON text.
pub(crate) fn flatten(value: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    flatten_into("", value, &mut out);
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Map<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(&name, val, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), other.clone());
        }
    }
}

pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested_result() {
        let flat = flatten(&json!({
            "contract_id": "C-1",
            "rating": { "code": "B1", "band": { "lower": "25" } },
            "explanation": []
        }));
        assert_eq!(flat["rating.code"], json!("B1"));
        assert_eq!(flat["rating.band.lower"], json!("25"));
        assert_eq!(flat["explanation"], json!([]));
    }

    #[test]
    fn test_scalar_text() {
        assert_eq!(scalar_text(&json!("4636.6875")), "4636.6875");
        assert_eq!(scalar_text(&json!(null)), "");
        assert_eq!(scalar_text(&json!(true)), "true");
    }
}
