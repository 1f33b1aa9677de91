use clap::Parser;

use raefill::cli::{self, Cli};

fn main() {
    let args = Cli::parse();
    raefill::init_tracing();

    tracing::info!("{} starting v{}", raefill::config::APP_NAME, raefill::config::APP_VERSION);

    if let Err(e) = cli::run(args) {
        tracing::error!(error = %e, "Run failed");
        eprintln!("error: {}", e.user_message());
        std::process::exit(1);
    }
}
