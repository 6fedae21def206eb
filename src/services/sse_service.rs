//! Bridges fanout subscriptions onto SSE responses.

use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::dto::sse::ServerEvent;

/// Convert a fanout subscription into an SSE response, sending `init` as the
/// first frame and forwarding every published event until the client
/// disconnects.
///
/// A disconnect only tears down this subscription; in-flight engine
/// operations and armed timers are process state and keep running.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    init: ServerEvent,
    code: u32,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from the broadcast hub and pushes into the mpsc
    tokio::spawn(async move {
        if tx.send(Ok(to_frame(init))).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_frame(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => {
                            // Skip lagged messages but keep the stream alive;
                            // the client can re-pull the snapshot endpoint.
                            continue;
                        }
                    }
                }
            }
        }

        info!(code, "event stream disconnected");
    });

    // response stream reads from the mpsc; when the client disconnects axum
    // drops this stream and the forwarder stops on tx.closed()
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_frame(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}
