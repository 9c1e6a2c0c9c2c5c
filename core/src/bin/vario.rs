/// Vario CLI
///
/// Runs action lists and evaluates expressions against JSON state files,
/// for debugging schemas outside a renderer.

use vario_core::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
