//! Opal Command-Line Interface
//!
//! The main entry point for the Opal CLI tool. Operators are read from JSON
//! or YAML files in their serde representation, e.g.
//!
//! ```text
//! {"Mul": [{"Pauli": "X"}, {"Pauli": "Y"}]}
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{analyze, canonicalize, graph, verify, version};

/// Opal - canonical forms for symbolic quantum operators
#[derive(Parser)]
#[command(name = "opal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite an operator into canonical form
    Canonicalize {
        /// Input file (JSON or YAML)
        #[arg(short, long)]
        input: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Compiler configuration (YAML)
        #[arg(short, long)]
        config: Option<String>,

        /// Write the traversal log as JSON to this file
        #[arg(long)]
        trace: Option<String>,
    },

    /// Show the term index of every canonical term
    Index {
        /// Input file (JSON or YAML)
        #[arg(short, long)]
        input: String,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Show the registers and modes an operator acts on
    Dims {
        /// Input file (JSON or YAML)
        #[arg(short, long)]
        input: String,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Check an operator against the canonical-form invariants
    Verify {
        /// Input file (JSON or YAML)
        #[arg(short, long)]
        input: String,

        /// Compiler configuration (YAML)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Print the pipeline flow graph in DOT format
    Graph {
        /// Show the core canonicalization graph instead of the compile graph
        #[arg(long)]
        core: bool,

        /// Compiler configuration (YAML)
        #[arg(short, long)]
        config: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Execute command
    let result = match cli.command {
        Commands::Canonicalize {
            input,
            output,
            config,
            trace,
        } => canonicalize::execute(
            &input,
            output.as_deref(),
            config.as_deref(),
            trace.as_deref(),
        ),

        Commands::Index { input, format } => analyze::execute_index(&input, &format),

        Commands::Dims { input, format } => analyze::execute_dims(&input, &format),

        Commands::Verify { input, config } => verify::execute(&input, config.as_deref()),

        Commands::Graph {
            core,
            config,
            output,
        } => graph::execute(core, config.as_deref(), output.as_deref()),

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
