use colored::Colorize;
use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{flatten, scalar_text};

/// Format output as a table using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(records) = ["results", "contracts", "events"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_array))
            {
                print_records(records);
                for (key, val) in map.iter().filter(|(_, v)| !v.is_array()) {
                    println!("{}: {}", key, scalar_text(val));
                }
            } else if let Some(result) = map.get("result") {
                print_fields(result);
                print_envelope_notes(map);
            } else {
                print_fields(value);
            }
        }
        Value::Array(arr) => print_records(arr),
        _ => println!("{}", value),
    }
}

fn print_fields(value: &Value) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in flatten(value) {
        builder.push_record([key.clone(), cell(&key, &val, value)]);
    }
    println!("{}", Table::from(builder));
}

fn print_records(records: &[Value]) {
    let rows: Vec<Map<String, Value>> = records.iter().map(flatten).collect();
    let Some(first) = rows.first() else {
        println!("(empty)");
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(headers.clone());
    for (row, record) in rows.iter().zip(records) {
        let cells: Vec<String> = headers
            .iter()
            .map(|h| row.get(h).map(|v| cell(h, v, record)).unwrap_or_default())
            .collect();
        builder.push_record(cells);
    }
    println!("{}", Table::from(builder));
}

fn print_envelope_notes(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\n{}", "Warnings:".yellow().bold());
            for w in warnings {
                println!("  - {}", scalar_text(w));
            }
        }
    }
    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

/// Rating codes are painted with the band colour when one is present.
fn cell(key: &str, value: &Value, record: &Value) -> String {
    let text = scalar_text(value);
    if !(key.ends_with("rating_code") || key.ends_with("rating.code")) {
        return text;
    }
    let color = record
        .pointer("/rating/color")
        .or_else(|| record.pointer("/result/rating/color"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    match color {
        "green" => text.green().to_string(),
        "yellow" => text.yellow().to_string(),
        "orange" => text.truecolor(255, 165, 0).to_string(),
        "red" => text.red().to_string(),
        "black" => text.white().on_black().to_string(),
        _ => text,
    }
}
