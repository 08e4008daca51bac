use serde_json::Value;
use std::io;

use super::{flatten, scalar_text};

/// Write output as CSV to stdout.
///
/// Envelopes with a `result` object become two-column `field,value` rows.
/// Record lists (`results`, `contracts`, `events`, or a bare array) become
/// one row per record with dotted headers.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match value {
        Value::Object(map) => {
            if let Some(records) = ["results", "contracts", "events"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_array))
            {
                write_records(&mut wtr, records);
            } else {
                let body = map.get("result").unwrap_or(value);
                let _ = wtr.write_record(["field", "value"]);
                for (key, val) in flatten(body) {
                    let _ = wtr.write_record([key.as_str(), &scalar_text(&val)]);
                }
            }
        }
        Value::Array(arr) => write_records(&mut wtr, arr),
        _ => {
            let _ = wtr.write_record([&scalar_text(value)]);
        }
    }

    let _ = wtr.flush();
}

fn write_records(wtr: &mut csv::Writer<io::StdoutLock<'_>>, records: &[Value]) {
    let rows: Vec<_> = records.iter().map(flatten).collect();
    let Some(first) = rows.first() else {
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let _ = wtr.write_record(&headers);
    for row in &rows {
        let cells: Vec<String> = headers
            .iter()
            .map(|h| row.get(h).map(scalar_text).unwrap_or_default())
            .collect();
        let _ = wtr.write_record(&cells);
    }
}
