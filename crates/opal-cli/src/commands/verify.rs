//! Verify command implementation.

use anyhow::Result;
use console::style;
use tracing::debug;

use opal_compile::passes::CanonicalFormVerifier;

use super::common::{load_config, load_operator};

/// Execute the verify command.
pub fn execute(input: &str, config: Option<&str>) -> Result<()> {
    let op = load_operator(input)?;
    let config = load_config(config)?;
    let verifier = CanonicalFormVerifier::new(config.max_iter);
    debug!("Checking invariants: {:?}", verifier.invariant_names());

    let violations = verifier.violations(&op)?;
    if violations.is_empty() {
        println!(
            "{} {} is in canonical form",
            style("✓").green().bold(),
            style(input).green()
        );
        return Ok(());
    }

    println!(
        "{} {} violates {} invariant(s):",
        style("✗").red().bold(),
        style(input).green(),
        violations.len()
    );
    for (name, err) in &violations {
        println!("  {:<24} {}", style(name).yellow(), err);
    }

    anyhow::bail!("{input} is not in canonical form")
}
