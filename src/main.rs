//! firmscrape - concurrent forum scrapers for firmware attachments.
//!
//! Runs the interactive command interpreter; scraper cycles are started
//! from there with `start`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    let default_filter = if firmscrape::cli::is_verbose() {
        "firmscrape=debug"
    } else {
        "firmscrape=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    firmscrape::cli::run()
}
