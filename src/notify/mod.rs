//! Fan-out of "the request list changed" signals to live-stream subscribers.
//!
//! Each subscriber owns a single-slot inbox. Broadcasting never blocks: if an
//! inbox already holds an undelivered signal the new one is merged into it.

use rand::Rng;
use std::{
  collections::HashMap,
  sync::{Arc, PoisonError, RwLock},
};
use tokio::sync::mpsc;
use tracing::debug;

/// Opaque handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(u64);

type Registry = HashMap<Token, mpsc::Sender<()>>;

/// Registry of live subscribers. Cheap to clone; clones share the registry.
#[derive(Clone, Default)]
pub struct NotificationHub {
  subscribers: Arc<RwLock<Registry>>,
}

impl NotificationHub {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a subscriber. Its inbox starts with one pending signal so the
  /// client refreshes immediately.
  pub fn subscribe(&self) -> Subscription {
    let (tx, rx) = mpsc::channel(1);
    let _ = tx.try_send(());

    let mut subscribers = self
      .subscribers
      .write()
      .unwrap_or_else(PoisonError::into_inner);
    let mut rng = rand::thread_rng();
    let token = loop {
      let candidate = Token(rng.gen());
      if !subscribers.contains_key(&candidate) {
        break candidate;
      }
    };
    subscribers.insert(token, tx);
    debug!(token = token.0, subscribers = subscribers.len(), "subscribed");

    Subscription {
      token,
      rx,
      hub: self.clone(),
    }
  }

  /// Remove and close a subscriber's inbox. Returns false if `token` was not live.
  pub fn unsubscribe(&self, token: Token) -> bool {
    let mut subscribers = self
      .subscribers
      .write()
      .unwrap_or_else(PoisonError::into_inner);
    let removed = subscribers.remove(&token).is_some();
    if removed {
      debug!(token = token.0, subscribers = subscribers.len(), "unsubscribed");
    }
    removed
  }

  /// Signal every current subscriber without waiting on any of them.
  pub fn broadcast(&self) {
    let subscribers = self
      .subscribers
      .read()
      .unwrap_or_else(PoisonError::into_inner);
    for tx in subscribers.values() {
      // Full means a signal is already pending; closed means the subscriber is leaving.
      let _ = tx.try_send(());
    }
  }

  pub fn subscriber_count(&self) -> usize {
    self
      .subscribers
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .len()
  }
}

/// A live subscription. Dropping it unsubscribes.
pub struct Subscription {
  token: Token,
  rx: mpsc::Receiver<()>,
  hub: NotificationHub,
}

impl Subscription {
  pub fn token(&self) -> Token {
    self.token
  }

  /// Wait for the next signal. Returns `None` once the hub has closed the inbox.
  pub async fn recv(&mut self) -> Option<()> {
    self.rx.recv().await
  }

  /// Take a pending signal without waiting.
  pub fn try_recv(&mut self) -> Option<()> {
    self.rx.try_recv().ok()
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.hub.unsubscribe(self.token);
  }
}
