use std::process::ExitCode;

use memlayout_lib::cli::Cli;
use memlayout_lib::{cli, config, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();
    tracing::debug!("{} v{}", config::APP_NAME, config::APP_VERSION);

    match cli::run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
