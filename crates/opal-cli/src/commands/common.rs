//! Shared helpers for CLI commands.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use opal_compile::CompilerConfig;
use opal_ir::Operator;

fn extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Load an operator from a JSON or YAML file.
pub fn load_operator(path: &str) -> Result<Operator> {
    if !Path::new(path).exists() {
        anyhow::bail!("File not found: {path}");
    }

    let source =
        fs::read_to_string(path).with_context(|| format!("Failed to read file: {path}"))?;

    let op: Operator = match extension(path).as_str() {
        "yaml" | "yml" => serde_yaml_ng::from_str(&source)
            .with_context(|| format!("Failed to parse YAML operator: {path}"))?,
        _ => serde_json::from_str(&source)
            .with_context(|| format!("Failed to parse JSON operator: {path}"))?,
    };
    debug!("Loaded operator with {} nodes from {}", op.size(), path);
    Ok(op)
}

/// Save an operator as JSON or YAML, chosen by extension.
pub fn save_operator(op: &Operator, path: &str) -> Result<()> {
    let content = match extension(path).as_str() {
        "yaml" | "yml" => serde_yaml_ng::to_string(op)?,
        _ => serde_json::to_string_pretty(op)?,
    };
    fs::write(path, content).with_context(|| format!("Failed to write file: {path}"))?;
    Ok(())
}

/// Write text to a file, or stdout if no path is given.
pub fn write_output(content: &str, path: Option<&str>) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, content).with_context(|| format!("Failed to write file: {path}"))
        }
        None => {
            println!("{content}");
            Ok(())
        }
    }
}

/// Load the compiler configuration: file (if given), then environment.
pub fn load_config(path: Option<&str>) -> Result<CompilerConfig> {
    let config = CompilerConfig::load(path.map(Path::new)).with_context(|| match path {
        Some(path) => format!("Failed to load configuration from {path}"),
        None => "Failed to load configuration from environment".to_string(),
    })?;
    debug!(
        "Configuration: max_iter={}, max_steps={}, verify_input={}",
        config.max_iter, config.max_steps, config.verify_input
    );
    Ok(config)
}

/// Check an output format name.
pub fn check_format(format: &str) -> Result<()> {
    match format {
        "table" | "json" => Ok(()),
        other => anyhow::bail!("Unknown format: '{other}'. Available: table, json"),
    }
}
