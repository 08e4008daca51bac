use std::path::Path;

use prinad_core::PrinadConfig;

use crate::input::file;

/// Load `--config` (JSON, or YAML by extension). No path means defaults.
pub fn load(path: Option<&str>) -> Result<PrinadConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(PrinadConfig::default());
    };
    let (resolved, contents) = file::read_text(path)?;
    let config = parse(&resolved, &contents)
        .map_err(|e| format!("Invalid config '{}': {}", resolved.display(), e))?;
    tracing::info!(path = %resolved.display(), "configuration loaded");
    Ok(config)
}

fn parse(path: &Path, contents: &str) -> Result<PrinadConfig, Box<dyn std::error::Error>> {
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let config: PrinadConfig = if is_yaml {
        serde_yaml::from_str(contents)?
    } else {
        serde_json::from_str(contents)?
    };
    config.validate()?;
    Ok(config)
}
