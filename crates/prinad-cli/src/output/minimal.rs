use serde_json::Value;

use super::scalar_text;

/// Headline figure of each command, in priority order.
const PRIORITY_KEYS: [&str; 10] = [
    "final_score",
    "ecl_final",
    "total_provision",
    "k_pd_fl",
    "new_stage",
    "recovery_rate",
    "weighted_recovery_rate",
    "total_penalty",
    "code",
    "stage",
];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    let body = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Some(records) = body.as_object().and_then(|m| m.get("results")).and_then(Value::as_array) {
        for record in records {
            let id = record.get("contract_id").map(scalar_text).unwrap_or_default();
            let inner = record.get("result").unwrap_or(record);
            println!("{}\t{}", id, headline(inner));
        }
        return;
    }

    println!("{}", headline(body));
}

fn headline(value: &Value) -> String {
    if let Value::Object(map) = value {
        for key in PRIORITY_KEYS {
            if let Some(val) = map.get(key).filter(|v| !v.is_null()) {
                return scalar_text(val);
            }
        }
        if let Some((key, val)) = map.iter().next() {
            return format!("{}: {}", key, scalar_text(val));
        }
    }
    scalar_text(value)
}
