//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - canonical forms for symbolic quantum operators",
        style("Opal").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  opal-ir       Operator and scalar expression trees");
    println!("  opal-compile  Rewrite passes, flow graphs and canonicalization");
    println!("  opal-cli      Command-line interface");
    println!();
    println!("Repository: {}", style(env!("CARGO_PKG_REPOSITORY")).underlined());
    println!("License:    {}", style(env!("CARGO_PKG_LICENSE")).dim());
}
