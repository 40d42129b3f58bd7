//! Accept-in (controller-side) WebSocket transport.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, Stream};
use pin_project::pin_project;
use serde_json::Value;

use crate::TransportError;

/// One already-upgraded agent connection.
///
/// Built from the [`axum::extract::ws::WebSocket`] handed to the `/ws`
/// handler after the upgrade and the bearer-token check both succeed.
#[pin_project]
pub struct ServerTransport {
    #[pin]
    inner: WebSocket,
}

impl ServerTransport {
    /// Wrap an already-upgraded socket.
    pub fn new(inner: WebSocket) -> Self {
        Self { inner }
    }

    /// Close the underlying socket with `code`, e.g. [`crate::CLOSE_EVICTED`]
    /// or [`crate::CLOSE_AUTH_FAILED`], and a human-readable `reason`.
    pub async fn close(mut self, code: u16, reason: &str) {
        let frame = axum::extract::ws::CloseFrame {
            code,
            reason: reason.to_owned().into(),
        };
        let _ = self.inner.send(Message::Close(Some(frame))).await;
    }
}

impl Stream for ServerTransport {
    type Item = Result<Value, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            return match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(Message::Text(text)))) => {
                    Poll::Ready(Some(serde_json::from_str(&text).map_err(TransportError::from)))
                }
                Poll::Ready(Some(Ok(Message::Close(frame)))) => {
                    Poll::Ready(Some(Err(TransportError::Closed(frame.map(|f| f.code)))))
                }
                Poll::Ready(Some(Ok(_))) => continue,
                Poll::Ready(Some(Err(e))) => {
                    Poll::Ready(Some(Err(TransportError::Socket(Box::new(e)))))
                }
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            };
        }
    }
}

impl Sink<Value> for ServerTransport {
    type Error = TransportError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project()
            .inner
            .poll_ready(cx)
            .map_err(|e| TransportError::Socket(Box::new(e)))
    }

    fn start_send(self: Pin<&mut Self>, item: Value) -> Result<(), Self::Error> {
        let text = serde_json::to_string(&item)?;
        self.project()
            .inner
            .start_send(Message::Text(text))
            .map_err(|e| TransportError::Socket(Box::new(e)))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project()
            .inner
            .poll_flush(cx)
            .map_err(|e| TransportError::Socket(Box::new(e)))
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project()
            .inner
            .poll_close(cx)
            .map_err(|e| TransportError::Socket(Box::new(e)))
    }
}
