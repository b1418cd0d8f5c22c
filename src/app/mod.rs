//! Application setup and runtime.

use crate::{
  db::{RequestReader, RequestWriter, SqliteStore},
  http,
  notify::NotificationHub,
  writer::{WriteQueue, DEFAULT_QUEUE_CAPACITY, DEFAULT_WRITE_TIMEOUT},
};
use clap::Parser;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Command line and environment configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "httpspy", version, about = "Record every HTTP request and watch them arrive live")]
pub struct Config {
  /// Address the HTTP listener binds to.
  #[arg(long, env = "HTTPSPY_ADDR", default_value = "0.0.0.0:6969")]
  pub addr: SocketAddr,

  /// sqlx SQLite URL of the request log.
  #[arg(long, env = "HTTPSPY_DATABASE", default_value = "sqlite://httpspy.db")]
  pub database: String,

  /// Jobs the write queue buffers before submitters wait.
  #[arg(long, env = "HTTPSPY_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
  pub queue_capacity: usize,

  /// Seconds a handler waits for its write to be applied.
  #[arg(long, env = "HTTPSPY_WRITE_TIMEOUT_SECS", default_value_t = DEFAULT_WRITE_TIMEOUT.as_secs())]
  pub write_timeout_secs: u64,
}

impl Config {
  pub fn write_timeout(&self) -> Duration {
    Duration::from_secs(self.write_timeout_secs)
  }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
  pub reader: Arc<dyn RequestReader>,
  pub writes: WriteQueue,
  pub hub: NotificationHub,
  pub shutdown: CancellationToken,
}

impl AppState {
  /// Wire a store into the hub and a freshly spawned write queue.
  ///
  /// The returned handle completes once the write queue has stopped.
  pub fn new<S>(
    store: S,
    shutdown: CancellationToken,
    queue_capacity: usize,
    write_timeout: Duration,
  ) -> (Self, JoinHandle<()>)
  where
    S: RequestReader + RequestWriter + Clone,
  {
    let hub = NotificationHub::new();
    let (writes, handle) = WriteQueue::spawn(
      store.clone(),
      hub.clone(),
      shutdown.clone(),
      queue_capacity,
      write_timeout,
    );
    let state = AppState {
      reader: Arc::new(store),
      writes,
      hub,
      shutdown,
    };
    (state, handle)
  }
}

/// Open the request log and serve HTTP until interrupted.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
  crate::util::init_tracing();

  let store = SqliteStore::connect(&config.database).await?;
  store.ensure_schema().await?;
  let stored = store.query_all().await?.len();
  info!("{} request(s) stored in {}", stored, config.database);

  let shutdown = CancellationToken::new();
  let (state, writer) = AppState::new(
    store.clone(),
    shutdown.clone(),
    config.queue_capacity,
    config.write_timeout(),
  );
  let app = http::build_router(state);

  let listener = tokio::net::TcpListener::bind(config.addr).await?;
  let addr = listener.local_addr()?;
  info!("watch page:      http://{}/watch", addr);
  info!("captured list:   GET http://{}/requests", addr);
  info!("capture anything else at http://{}/", addr);

  tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

  let stop = shutdown.clone();
  let served = axum::serve(listener, app)
    .with_graceful_shutdown(async move { stop.cancelled().await })
    .await;
  shutdown.cancel();

  if let Err(e) = writer.await {
    error!("write queue task failed: {e}");
  }
  store.close().await;
  info!("httpspy stopped");
  served?;
  Ok(())
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
  tokio::select! {
    res = tokio::signal::ctrl_c() => {
      if let Err(e) = res {
        error!("failed to listen for ctrl-c: {e}");
        return;
      }
      info!("interrupt received, shutting down");
      shutdown.cancel();
    }
    _ = shutdown.cancelled() => {}
  }
}
