/// printload - Quote-collection load simulator for the ProxyPrint service.
///
/// Generates synthetic print requests, collects competing budgets from
/// print shops, submits the winning quote and measures the service under
/// concurrent simulated users.
mod cli;
mod config;
mod error;
mod http;
mod models;
mod output;
mod simulator;
mod workflow;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "printload=info",
        1 => "printload=debug",
        _ => "printload=trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = cli.run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
