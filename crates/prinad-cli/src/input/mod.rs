pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Read the command payload from `--input <file>` or, failing that, piped stdin.
pub fn read_input<T: DeserializeOwned>(path: Option<&str>) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        file::read_json(path)
    } else if let Some(data) = stdin::read_stdin()? {
        Ok(serde_json::from_value(data)?)
    } else {
        Err("--input <file.json> or stdin required".into())
    }
}
