//! Turns a streaming response body into an [`EventFeed`].

use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;

use futures_util::{Stream, StreamExt, stream};
use reportflow_event_stream::{EventFeed, SseDecoder, StreamError};

/// Decodes `text/event-stream` chunks as they arrive.
///
/// A body error, or no bytes at all for `idle`, yields one
/// [`StreamError::Connection`]; the consumer treats that as a dropped
/// connection. The feed ends when the body ends.
pub(crate) fn sse_feed<S, B, E>(body: S, idle: Duration) -> EventFeed
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let state = (Box::pin(body), SseDecoder::new(), VecDeque::new());

    Box::pin(stream::unfold(
        state,
        move |(mut body, mut decoder, mut pending)| async move {
            loop {
                if let Some(record) = pending.pop_front() {
                    return Some((Ok(record), (body, decoder, pending)));
                }
                let Ok(item) = tokio::time::timeout(idle, body.next()).await else {
                    let err = StreamError::Connection(format!(
                        "no data for {}s",
                        idle.as_secs_f64()
                    ));
                    return Some((Err(err), (body, decoder, pending)));
                };
                match item {
                    Some(Ok(bytes)) => match decoder.push(bytes.as_ref()) {
                        Ok(records) => pending.extend(records),
                        Err(e) => return Some((Err(e), (body, decoder, pending))),
                    },
                    Some(Err(e)) => {
                        let err = StreamError::Connection(e.to_string());
                        return Some((Err(err), (body, decoder, pending)));
                    }
                    None => return None,
                }
            }
        },
    ))
}
