use github_identity_cli::run_cli;
use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        if e.should_log() {
            error!("CLI error: {}", e);
        }
        eprintln!("Error: {}", e);

        // 1 settings, 2 configuration, 3 authentication
        std::process::exit(e.exit_code());
    }
}
