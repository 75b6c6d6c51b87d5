//! HTTP server lifecycle: startup, optional auto-migration and graceful shutdown.

use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use crate::api::routes::create_router;
use crate::config::{Environment, Settings};
use crate::db::{establish_async_connection_pool, run_pending_migrations};
use crate::state::AppState;

pub struct Server {
    settings: Settings,
    environment: Environment,
}

impl Server {
    pub fn new(settings: Settings, environment: Environment) -> Self {
        Self {
            settings,
            environment,
        }
    }

    /// Serves the category API until Ctrl+C or SIGTERM.
    ///
    /// Fails before accepting traffic if auto-migration, the connection
    /// pool or the listener bind fails.
    pub async fn run(self) -> anyhow::Result<()> {
        self.log_startup();
        let Settings {
            server,
            database,
            hierarchy,
            ..
        } = self.settings;

        if database.auto_migrate {
            let applied = run_pending_migrations(&database.url).await?;
            info!(count = applied.len(), versions = ?applied, "Applied pending migrations");
        }

        let pool = establish_async_connection_pool(&database).await?;
        let router = create_router(
            AppState::new(pool, &hierarchy),
            Duration::from_secs(server.request_timeout),
        );

        let address = server.address();
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("cannot listen on {address}"))?;
        info!(%address, "Catalog API listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server terminated abnormally")?;

        info!("Catalog API stopped");
        Ok(())
    }

    fn log_startup(&self) {
        let Settings {
            application,
            server,
            database,
            hierarchy,
            ..
        } = &self.settings;

        info!(
            name = %application.name,
            version = %application.version,
            environment = %self.environment,
            "Starting catalog service"
        );
        // database.url is left out; it usually embeds a password
        info!(
            server.host = %server.host,
            server.port = server.port,
            server.request_timeout_secs = server.request_timeout,
            server.keep_alive_secs = server.keep_alive_timeout,
            db.max_connections = database.max_connections,
            db.min_connections = database.min_connections,
            db.auto_migrate = database.auto_migrate,
            hierarchy.max_batch_size = hierarchy.max_batch_size,
            "Effective settings"
        );
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let source = tokio::select! {
        _ = ctrl_c => "ctrl-c",
        _ = terminate => "SIGTERM",
    };
    info!(signal = source, "Shutdown requested, draining connections");
}
