use std::process::ExitCode;

use clap::Parser;
use policyassistant_lib::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    policyassistant_lib::init_tracing();

    match policyassistant_lib::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = %e.code, error = %e, "Policy assistant stopped");
            ExitCode::FAILURE
        }
    }
}
