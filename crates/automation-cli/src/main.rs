use automation_cli::run_cli;
use tracing::error;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(e) = run_cli().await {
        error!("{e}");
        std::process::exit(e.exit_code());
    }
}
