use std::sync::Arc;
use tokio::sync::broadcast;

use super::api::{router, AppState};
use super::ServerConfig;
use crate::cache::CacheContext;
use crate::db::DatabaseBackend;

pub struct Daemon {
  config: ServerConfig,
  backend: Arc<dyn DatabaseBackend>,
  caches: Arc<CacheContext>,
  shutdown_tx: broadcast::Sender<()>,
}

impl Daemon {
  pub fn new(config: ServerConfig, backend: Arc<dyn DatabaseBackend>) -> Self {
    let (shutdown_tx, _) = broadcast::channel(1);
    let caches = Arc::new(CacheContext::new(&config.cache));
    Self {
      config,
      backend,
      caches,
      shutdown_tx,
    }
  }

  pub fn caches(&self) -> Arc<CacheContext> {
    self.caches.clone()
  }

  /// Trigger graceful shutdown
  pub fn shutdown(&self) {
    tracing::info!("Initiating graceful shutdown...");
    let _ = self.shutdown_tx.send(());
  }

  pub async fn run(&self) -> Result<(), anyhow::Error> {
    tracing::info!("Initializing database schema...");
    self.backend.init_schema().await?;

    let janitor = self.caches.spawn_janitor(self.shutdown_tx.subscribe());

    let state = AppState::new(self.backend.clone(), self.caches.clone());
    let app = router(state, &self.config.server.cors_origins);

    let addr = self.config.address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Roster HTTP API on http://{}", addr);

    let mut shutdown_rx = self.shutdown_tx.subscribe();
    let served = axum::serve(listener, app.into_make_service())
      .with_graceful_shutdown(async move {
        let _ = shutdown_rx.recv().await;
        tracing::info!("HTTP server shutting down");
      })
      .await;

    if let Some(handle) = janitor {
      handle.abort();
    }
    self.caches.close();

    if let Err(e) = &served {
      tracing::error!("HTTP server error: {}", e);
    }
    served?;
    Ok(())
  }
}
