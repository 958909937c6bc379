//! Canonicalize command implementation.

use anyhow::{Context, Result};
use console::style;
use tracing::debug;

use opal_compile::{Canonicalizer, term_shapes};

use super::common::{load_config, load_operator, save_operator, write_output};

/// Execute the canonicalize command.
pub fn execute(
    input: &str,
    output: Option<&str>,
    config: Option<&str>,
    trace: Option<&str>,
) -> Result<()> {
    eprintln!(
        "{} Canonicalizing {}",
        style("→").cyan().bold(),
        style(input).green()
    );

    let op = load_operator(input)?;
    eprintln!("  Loaded: {} nodes", op.size());

    let config = load_config(config)?;
    let canonicalizer = Canonicalizer::with_config(config)?;

    let result = canonicalizer
        .canonicalize_traced(&op)
        .with_context(|| format!("Failed to canonicalize {input}"))?;
    debug!("Traversal: {:?}", result.traversal.path());

    eprintln!("{} Canonicalization complete", style("✓").green().bold());
    eprintln!(
        "  Result: {} terms, {} steps",
        term_shapes(&result.model)?.len(),
        result.traversal.total_steps()
    );

    if let Some(trace_path) = trace {
        let log = serde_json::to_string_pretty(&result.traversal)?;
        write_output(&log, Some(trace_path))?;
        eprintln!("  Trace:  {}", style(trace_path).green());
    }

    match output {
        Some(path) => {
            save_operator(&result.model, path)?;
            eprintln!("  Output: {}", style(path).green());
        }
        None => write_output(&serde_json::to_string_pretty(&result.model)?, None)?,
    }

    Ok(())
}
