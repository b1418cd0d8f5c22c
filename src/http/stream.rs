//! Server-sent "something changed" stream for the watch page.

use crate::app::AppState;
use axum::{
  extract::State,
  response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use std::{convert::Infallible, time::Duration};
use tracing::debug;

/// Emit `data: updated` whenever the request list changes.
///
/// The stream ends on server shutdown. When it ends, or the client goes away
/// and the response is dropped, the subscription is released.
pub async fn sse_update(
  State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
  let subscription = state.hub.subscribe();
  debug!(subscribers = state.hub.subscriber_count(), "stream client connected");

  let events = stream::unfold(
    (subscription, state.shutdown),
    |(mut subscription, shutdown)| async move {
      let signal = tokio::select! {
        signal = subscription.recv() => signal,
        _ = shutdown.cancelled() => None,
      };
      signal.map(|()| {
        let event = Event::default().data("updated");
        (Ok::<_, Infallible>(event), (subscription, shutdown))
      })
    },
  );

  Sse::new(events).keep_alive(
    KeepAlive::new()
      .interval(Duration::from_secs(15))
      .text("keep-alive"),
  )
}
