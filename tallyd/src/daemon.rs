//! Daemon: Main runtime orchestrator.
//!
//! The Daemon ties together all components:
//! - Stock ledger (in-memory or remote)
//! - Reconciliation controller
//! - Notifier (outcome reporting)
//! - API Server (HTTP endpoints)
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Construct the ledger adapter
//! 3. Initial load of positions and locations
//! 4. Start API server
//! 5. Main loop (log notifications)
//! 6. Graceful shutdown on SIGINT

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tally_connectors::HttpLedgerClient;
use tally_ledger::{InMemoryLedger, StockLedgerService};

use crate::api::{create_router, ApiState};
use crate::config::{Config, LedgerKind};
use crate::controller::Controller;
use crate::error::{ControllerError, ControllerResult};
use crate::notify::{Notifier, Severity};

// =============================================================================
// Daemon
// =============================================================================

/// The tally daemon.
pub struct Daemon {
    /// Configuration
    config: Config,
    /// Reconciliation controller
    controller: Arc<Controller>,
    /// Stops the API server
    shutdown: CancellationToken,
}

impl Daemon {
    /// Create a daemon over the ledger selected by `config`.
    pub fn from_config(config: Config) -> ControllerResult<Self> {
        let ledger: Arc<dyn StockLedgerService> = match config.ledger.kind {
            LedgerKind::Memory => Arc::new(InMemoryLedger::demo()),
            LedgerKind::Http => {
                let url = config.ledger.url.clone().ok_or_else(|| {
                    ControllerError::Config("TALLY_LEDGER_URL is required".to_string())
                })?;
                let mut client = HttpLedgerClient::new(url).with_timeout(config.ledger.timeout);
                if let Some(session_id) = &config.ledger.session_id {
                    client = client.with_session(session_id)?;
                }
                Arc::new(client)
            },
        };
        Ok(Self::new(config, ledger))
    }

    /// Create a daemon with a provided ledger.
    pub fn new(config: Config, ledger: Arc<dyn StockLedgerService>) -> Self {
        let notifier = Notifier::new(config.session.notify_duration);
        let controller = Arc::new(Controller::new(ledger, notifier, config.session.clone()));
        Self {
            config,
            controller,
            shutdown: CancellationToken::new(),
        }
    }

    /// The controller driven by this daemon.
    pub fn controller(&self) -> Arc<Controller> {
        Arc::clone(&self.controller)
    }

    /// Run the daemon.
    ///
    /// This method blocks until shutdown is requested (SIGINT).
    pub async fn run(self) -> ControllerResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            ledger = %self.config.ledger.kind,
            "Starting tally daemon"
        );

        // 1. Initial load; failures are already reported and retried by the operator
        if let Err(e) = self.controller.load_all().await {
            warn!(error = %e, "Initial load failed");
        }
        if let Err(e) = self.controller.load_locations().await {
            warn!(error = %e, "Initial location load failed");
        }

        // 2. Start API server
        let api_addr = self.start_api_server().await?;
        info!(%api_addr, "API server started");

        // 3. Main loop
        let mut notifications = self.controller.notifier().subscribe();
        loop {
            tokio::select! {
                received = notifications.recv() => match received {
                    Ok(note) => match note.severity {
                        Severity::Error => warn!(message = %note.message, "Operator notified"),
                        _ => debug!(message = %note.message, "Operator notified"),
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Notification log lagged");
                    },
                    Err(RecvError::Closed) => break,
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        // 4. Graceful shutdown
        self.shutdown();
        Ok(())
    }

    /// Bind the API listener and serve it in the background.
    pub async fn start_api_server(&self) -> ControllerResult<SocketAddr> {
        let state = Arc::new(ApiState {
            controller: self.controller(),
        });
        let router = create_router(state);

        let addr = format!("{}:{}", self.config.api.host, self.config.api.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            ControllerError::Config(format!("Failed to bind to {}: {}", addr, e))
        })?;
        let local_addr = listener.local_addr()?;

        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
            {
                error!(error = %e, "API server error");
            }
        });

        Ok(local_addr)
    }

    /// Stop the API server.
    pub fn shutdown(&self) {
        info!("Shutting down");
        self.shutdown.cancel();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionPhase;

    #[tokio::test]
    async fn test_memory_daemon_loads_demo_data() {
        let daemon = Daemon::from_config(Config::test()).unwrap();
        let controller = daemon.controller();

        controller.load_all().await.unwrap();
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Ready);
        assert_eq!(snapshot.progress.total, 4);
    }

    #[tokio::test]
    async fn test_http_daemon_requires_url() {
        let mut config = Config::test();
        config.ledger.kind = LedgerKind::Http;

        let err = Daemon::from_config(config).err().unwrap();
        assert!(matches!(err, ControllerError::Config(_)));
    }

    #[tokio::test]
    async fn test_api_server_binds_ephemeral_port() {
        let daemon = Daemon::from_config(Config::test()).unwrap();
        let addr = daemon.start_api_server().await.unwrap();
        assert_ne!(addr.port(), 0);
        daemon.shutdown();
    }
}
