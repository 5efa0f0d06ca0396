//! Forwards generation fragments to an HTTP response body as they arrive
//!
//! Nothing is buffered: each fragment is handed to the body as soon as the
//! upstream yields it. An upstream error ends the body with an error, which
//! aborts the chunked transfer so the client cannot mistake a failed answer
//! for a complete one.

use axum::body::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::core::GenerationStream;
use crate::error::Error;

/// Relay configuration for one response
#[derive(Debug, Clone, Copy)]
pub struct StreamRelay {
    request_id: Uuid,
}

impl StreamRelay {
    pub fn new(request_id: Uuid) -> Self {
        StreamRelay { request_id }
    }

    /// Wrap `fragments` as a body stream
    pub fn relay(&self, fragments: GenerationStream) -> RelayStream {
        RelayStream {
            inner: fragments,
            request_id: self.request_id,
            bytes_sent: 0,
            finished: false,
        }
    }
}

/// Body stream produced by [`StreamRelay::relay`]
pub struct RelayStream {
    inner: GenerationStream,
    request_id: Uuid,
    bytes_sent: usize,
    finished: bool,
}

impl RelayStream {
    /// Whether the upstream ran to completion or failed
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Stream for RelayStream {
    type Item = Result<Bytes, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(fragment)) if fragment.is_empty() => continue,
                Some(Ok(fragment)) => {
                    this.bytes_sent += fragment.len();
                    return Poll::Ready(Some(Ok(Bytes::from(fragment))));
                }
                Some(Err(e)) => {
                    this.finished = true;
                    error!(
                        request_id = %this.request_id,
                        stage = "generation",
                        error = %e,
                        bytes_sent = this.bytes_sent,
                        "Upstream failed mid-stream, aborting response"
                    );
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    this.finished = true;
                    debug!(
                        request_id = %this.request_id,
                        bytes_sent = this.bytes_sent,
                        "Response stream complete"
                    );
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        if !self.finished {
            info!(
                request_id = %self.request_id,
                bytes_sent = self.bytes_sent,
                "Client disconnected, cancelling generation"
            );
            self.inner.close();
        }
    }
}
