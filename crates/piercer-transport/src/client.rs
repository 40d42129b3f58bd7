//! Connect-out (agent-side) WebSocket transport.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Sink, Stream};
use pin_project::pin_project;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, Message},
    MaybeTlsStream, WebSocketStream,
};

use crate::TransportError;

/// A WebSocket connection dialed out to a controller.
#[pin_project]
pub struct ClientTransport {
    #[pin]
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

/// Dial `url`, presenting `headers` on the upgrade request.
///
/// Used by the agent supervisor to open (and, after a drop, re-open) its one
/// connection to the controller; each attempt re-sends the same header set
/// (bearer token, agent id, current installed-model list).
pub async fn connect(
    url: &str,
    headers: impl IntoIterator<Item = (&'static str, String)>,
) -> Result<ClientTransport, TransportError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| TransportError::Socket(Box::new(e)))?;
    let req_headers = request.headers_mut();
    for (name, value) in headers {
        let value = value
            .parse()
            .map_err(|e: http::header::InvalidHeaderValue| TransportError::Socket(Box::new(e)))?;
        req_headers.insert(name, value);
    }

    let (inner, _response) = connect_async(request)
        .await
        .map_err(|e| TransportError::Socket(Box::new(e)))?;
    Ok(ClientTransport { inner })
}

impl Stream for ClientTransport {
    type Item = Result<Value, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            return match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(Message::Text(text)))) => {
                    Poll::Ready(Some(serde_json::from_str(&text).map_err(TransportError::from)))
                }
                Poll::Ready(Some(Ok(Message::Close(frame)))) => {
                    Poll::Ready(Some(Err(TransportError::Closed(frame.map(|f| f.code.into())))))
                }
                // Ping/Pong/Binary frames carry no RPC content; skip them.
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

impl Sink<Value> for ClientTransport {
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
