//! Newline-delimited JSON framing over a worker's stdio.
//!
//! A worker is an opaque child process; the pool and the worker agree on
//! nothing beyond "one JSON value per line", the same framing
//! [`piercer_transport`](../piercer_transport) speaks over a WebSocket, just
//! carried over a pipe instead.

use futures::{Sink, Stream, StreamExt as _};
use piercer_async_utils::SinkExt as _;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};

/// A failure reading or writing a worker's stdio framing.
#[derive(Debug, thiserror::Error)]
pub enum StdioError {
    /// The underlying line framing failed: an I/O error, or a line past the
    /// codec's length limit.
    #[error("stdio framing error")]
    Codec(#[from] LinesCodecError),
    /// A line was not valid JSON, or a value could not be serialized.
    #[error("malformed JSON on worker stdio")]
    Json(#[from] serde_json::Error),
}

/// Decode one JSON value per line read from `stdout`.
pub fn reader<R>(stdout: R) -> impl Stream<Item = Result<Value, StdioError>> + Unpin + Send
where
    R: AsyncRead + Unpin + Send,
{
    FramedRead::new(stdout, LinesCodec::new()).map(|line| {
        let line = line?;
        serde_json::from_str(&line).map_err(StdioError::from)
    })
}

/// Encode one JSON value per line written to `stdin`.
pub fn writer<W>(stdin: W) -> impl Sink<Value, Error = StdioError> + Unpin + Send
where
    W: AsyncWrite + Unpin + Send,
{
    FramedWrite::new(stdin, LinesCodec::new())
        .with_fn(|value: Value| serde_json::to_string(&value).map_err(StdioError::from))
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use futures::SinkExt as _;
    use serde_json::json;

    #[tokio::test]
    async fn a_value_written_comes_back_out_the_other_end() {
        let (client, server) = tokio::io::duplex(4096);

        let mut tx = writer(client);
        let mut rx = reader(server);

        tx.send(json!({"hello": "world"})).await.unwrap();
        let value = rx.next().await.unwrap().unwrap();
        assert_eq!(value, json!({"hello": "world"}));
    }
}
