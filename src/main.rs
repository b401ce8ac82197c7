mod cli;
mod client;
mod db;
mod error;
mod filter;
mod mapper;
mod models;
mod reconciler;
mod settings;
mod sync;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    dotenv::dotenv().ok();
    init_tracing();

    if let Err(e) = cli::sync::run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
