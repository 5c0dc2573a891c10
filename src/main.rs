use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = gmail_responder::cli::Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = gmail_responder::run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise `-v` raises the crate's level.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,gmail_responder={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
