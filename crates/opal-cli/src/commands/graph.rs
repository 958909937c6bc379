//! Graph command implementation.

use anyhow::Result;
use tracing::debug;

use opal_compile::{compile_graph, core_graph};

use super::common::{load_config, write_output};

/// Execute the graph command.
pub fn execute(core: bool, config: Option<&str>, output: Option<&str>) -> Result<()> {
    let config = load_config(config)?;

    let dot = if core {
        let graph = core_graph(&config)?;
        debug!("Core graph with {} nodes", graph.len());
        graph.to_dot()
    } else {
        let graph = compile_graph(&config)?;
        debug!("Compile graph with {} nodes", graph.len());
        graph.to_dot()
    };

    write_output(&dot, output)
}
