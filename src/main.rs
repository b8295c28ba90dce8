use clap::Parser;

use payoff::cli::{Cli, run};

#[tokio::main]
async fn main() {
    payoff::telemetry::init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
