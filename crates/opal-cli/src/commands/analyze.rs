//! Index and dims command implementations.

use anyhow::Result;
use console::style;
use serde_json::json;

use opal_compile::{HilbertSpace, TermIndex, canonicalize, hilbert_space_dims, term_indices};

use super::common::{check_format, load_operator};

/// Execute the index command.
///
/// The operator is canonicalized first so every term has a key.
pub fn execute_index(input: &str, format: &str) -> Result<()> {
    check_format(format)?;

    let op = load_operator(input)?;
    let canonical = canonicalize(&op)?;
    let indices = term_indices(&canonical)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&indices)?),
        _ => print_index_table(input, &indices),
    }

    Ok(())
}

fn print_index_table(input: &str, indices: &[TermIndex]) {
    println!(
        "{} {} ({} terms)",
        style("Term index:").bold(),
        style(input).green(),
        indices.len()
    );
    println!();
    for (i, index) in indices.iter().enumerate() {
        println!("  {:>4}  {}", style(i).dim(), index);
    }
}

/// Execute the dims command.
pub fn execute_dims(input: &str, format: &str) -> Result<()> {
    check_format(format)?;

    let op = load_operator(input)?;
    let dims = hilbert_space_dims(&op)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&dims_json(&dims))?),
        _ => {
            println!(
                "{} {}",
                style("Hilbert space:").bold(),
                style(input).green()
            );
            println!();
            println!("  Registers: {}", style(dims.n_qreg).yellow());
            println!("  Modes:     {}", style(dims.n_qmode).yellow());
        }
    }

    Ok(())
}

fn dims_json(dims: &HilbertSpace) -> serde_json::Value {
    json!({
        "n_qreg": dims.n_qreg,
        "n_qmode": dims.n_qmode,
    })
}
