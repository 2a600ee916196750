//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - Azure Quantum job submission from the command line",
        style("qazure").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  qazure-hal             Credentials, environments, targets and job types");
    println!("  qazure-client          Workspace connection and job orchestration");
    println!("  qazure-adapter-azure   Azure Quantum REST workspace");
    println!("  qazure-adapter-mock    In-memory mock workspace");
    println!("  qazure-cli             Command-line session");
    println!();
    println!("License: {}", style(env!("CARGO_PKG_LICENSE")).dim());
}
