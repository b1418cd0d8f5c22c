//! Single-writer queue in front of the request log.
//!
//! SQLite does not tolerate concurrent writers, so every mutation goes through
//! one worker task. Callers enqueue a job carrying a oneshot reply slot and
//! wait on it. Jobs run in submission order; a broadcast follows every
//! successful job.

use crate::{
  db::RequestWriter,
  error::{StorageError, WriteError},
  models::request::captured_request::CapturedRequest,
  notify::NotificationHub,
};
use std::time::Duration;
use tokio::{
  sync::{mpsc, oneshot},
  task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

enum WriteJob {
  Insert {
    record: CapturedRequest,
    reply: oneshot::Sender<Result<i64, StorageError>>,
  },
  Clear {
    reply: oneshot::Sender<Result<u64, StorageError>>,
  },
}

/// Handle for submitting jobs to the writer task.
#[derive(Clone)]
pub struct WriteQueue {
  tx: mpsc::Sender<WriteJob>,
  timeout: Duration,
}

impl WriteQueue {
  /// Start the writer task. It runs until `shutdown` fires, then finishes the
  /// jobs already queued and exits.
  pub fn spawn<W: RequestWriter>(
    writer: W,
    hub: NotificationHub,
    shutdown: CancellationToken,
    capacity: usize,
    timeout: Duration,
  ) -> (WriteQueue, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = tokio::spawn(run(writer, hub, shutdown, rx));
    (WriteQueue { tx, timeout }, handle)
  }

  /// Persist `record` and return its assigned id.
  pub async fn submit(&self, record: CapturedRequest) -> Result<i64, WriteError> {
    let (reply, rx) = oneshot::channel();
    self.send(WriteJob::Insert { record, reply }, rx).await
  }

  /// Delete every record, returning how many were removed.
  pub async fn clear(&self) -> Result<u64, WriteError> {
    let (reply, rx) = oneshot::channel();
    self.send(WriteJob::Clear { reply }, rx).await
  }

  async fn send<T>(
    &self,
    job: WriteJob,
    rx: oneshot::Receiver<Result<T, StorageError>>,
  ) -> Result<T, WriteError> {
    let wait = async {
      self.tx.send(job).await.map_err(|_| WriteError::Closed)?;
      rx.await.map_err(|_| WriteError::Closed)?.map_err(WriteError::from)
    };
    tokio::time::timeout(self.timeout, wait)
      .await
      .map_err(|_| WriteError::Timeout(self.timeout))?
  }
}

async fn run<W: RequestWriter>(
  writer: W,
  hub: NotificationHub,
  shutdown: CancellationToken,
  mut rx: mpsc::Receiver<WriteJob>,
) {
  loop {
    tokio::select! {
      biased;
      _ = shutdown.cancelled() => break,
      job = rx.recv() => match job {
        Some(job) => apply(&writer, &hub, job).await,
        None => return,
      },
    }
  }

  rx.close();
  let mut drained = 0usize;
  while let Some(job) = rx.recv().await {
    apply(&writer, &hub, job).await;
    drained += 1;
  }
  info!(drained, "write queue stopped");
}

async fn apply<W: RequestWriter>(writer: &W, hub: &NotificationHub, job: WriteJob) {
  match job {
    WriteJob::Insert { record, reply } => {
      let res = writer.insert(&record).await;
      finish(hub, res, reply, "insert");
    }
    WriteJob::Clear { reply } => {
      let res = writer.delete_all().await;
      finish(hub, res, reply, "clear");
    }
  }
}

fn finish<T: std::fmt::Debug>(
  hub: &NotificationHub,
  res: Result<T, StorageError>,
  reply: oneshot::Sender<Result<T, StorageError>>,
  op: &'static str,
) {
  match &res {
    Ok(v) => debug!(op, result = ?v, "write applied"),
    Err(e) => error!(op, "write failed: {e}"),
  }
  let ok = res.is_ok();
  if reply.send(res).is_err() {
    debug!(op, "caller stopped waiting for write result");
  }
  if ok {
    hub.broadcast();
  }
}
