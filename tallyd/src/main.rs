//! Tally Daemon
//!
//! Stock count reconciliation service.
//!
//! # Usage
//!
//! ```bash
//! # Start against the in-memory demo ledger
//! cargo run -p tallyd
//!
//! # Start against a remote inventory server
//! TALLY_LEDGER=http TALLY_LEDGER_URL=https://erp.example.com cargo run -p tallyd
//! ```
//!
//! # Environment Variables
//!
//! - `TALLY_ENV`: Environment (test, development, production)
//! - `TALLY_API_HOST`: API host (default: 0.0.0.0)
//! - `TALLY_API_PORT`: API port (default: 8080)
//! - `TALLY_LEDGER`: Ledger implementation (memory, http)
//! - `TALLY_LEDGER_URL`: Inventory server base URL
//! - `TALLY_LEDGER_SESSION`: Session cookie for the inventory server
//! - `TALLY_LEDGER_TIMEOUT_SECS`: Per-request timeout (default: 10)
//! - `TALLY_PAGE_SIZE`: Positions per page (default: 500)
//! - `TALLY_NOTIFY_MS`: Notification duration (default: 2500)
//! - `TALLY_SEARCH_DEBOUNCE_MS`: Product search debounce (default: 350)
//! - `TALLY_ROLLBACK_ON_FAILURE`: Revert rejected counts (default: true)
//! - `TALLY_ALLOW_NEGATIVE_COUNTS`: Accept negative counts (default: false)

use tallyd::{Config, Daemon};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("tallyd=info".parse()?))
        .init();

    let config = Config::from_env()?;
    info!(
        ledger = %config.ledger.kind,
        ledger_url = config.ledger.url.as_deref().unwrap_or("-"),
        page_size = config.session.page_size,
        rollback_on_failure = config.session.rollback_on_failure,
        allow_negative = config.session.allow_negative_counts,
        api = %format!("{}:{}", config.api.host, config.api.port),
        "Tally configuration loaded"
    );

    Daemon::from_config(config)?.run().await?;
    Ok(())
}
