//! Keeps one connection to the controller alive, reconnecting with backoff
//! when it drops, and honoring the close codes that say not to.

use std::{error::Error as _, sync::Arc, time::Duration};

use futures::StreamExt as _;
use piercer_config::AgentConfig;
use piercer_rpc::{MethodRegistry, Peer, PeerError};
use piercer_transport::{TransportError, CLOSE_AUTH_FAILED, CLOSE_EVICTED};

use crate::{models::scan_installed_models, sink::ForwardingSink};

/// Consecutive failed connection attempts before the supervisor gives up.
const MAX_ATTEMPTS: u32 = 10;

/// Why the supervisor stopped trying to stay connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A newer connection for this agent id replaced this one; must not reconnect.
    Evicted,
    /// The controller rejected this agent's bearer token; must not reconnect.
    AuthRejected,
    /// Too many consecutive attempts failed to even establish a connection.
    GaveUp,
}

impl Outcome {
    /// The process exit code this outcome should produce.
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Evicted => 0,
            Outcome::AuthRejected | Outcome::GaveUp => 1,
        }
    }
}

/// Dial `config.controller_url` in a loop, running a fresh [`Peer`] built
/// from `build_methods()` over each connection, until eviction, an auth
/// rejection, or too many failed attempts ends the loop.
pub async fn run(
    config: &AgentConfig,
    agent_id: &str,
    build_methods: impl Fn() -> MethodRegistry,
    sink: Arc<ForwardingSink>,
) -> Outcome {
    let mut attempt = 0u32;
    loop {
        let installed = scan_installed_models(&config.models_dir);
        let headers = vec![
            ("authorization", format!("Bearer {}", config.agent_secret_key)),
            ("agent-id", agent_id.to_owned()),
            ("agent-name", config.agent_name.clone()),
            ("agent-installed-models", installed.join(",")),
        ];

        let transport = match piercer_transport::connect(&config.controller_url, headers).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, attempt, "could not connect to controller");
                attempt += 1;
                if attempt >= MAX_ATTEMPTS {
                    return Outcome::GaveUp;
                }
                tokio::time::sleep(backoff(attempt)).await;
                continue;
            }
        };
        attempt = 0;
        tracing::info!("connected to controller");

        let (peer, handle) = Peer::new(build_methods());
        sink.set_handle(Some(handle));
        let (write_half, read_half) = transport.split();
        let result = peer.run(read_half.fuse(), write_half).await;
        sink.set_handle(None);

        if let Err(e) = &result {
            match close_code(e) {
                Some(CLOSE_EVICTED) => return Outcome::Evicted,
                Some(CLOSE_AUTH_FAILED) => return Outcome::AuthRejected,
                _ => tracing::warn!(error = %e, "connection to controller ended"),
            }
        }

        attempt += 1;
        if attempt >= MAX_ATTEMPTS {
            return Outcome::GaveUp;
        }
        tokio::time::sleep(backoff(attempt)).await;
    }
}

/// `min(1000 * 2^n, 60000)` milliseconds, capped at `n = 9` so it never
/// overflows before the cap kicks in anyway.
fn backoff(attempt: u32) -> Duration {
    let millis = 1000u64.saturating_mul(1u64 << attempt.min(9));
    Duration::from_millis(millis.min(60_000))
}

/// Recover the WebSocket close code a [`PeerError::ReadFailed`] carries, if
/// its source was a [`TransportError::Closed`].
fn close_code(err: &PeerError) -> Option<u16> {
    let PeerError::ReadFailed(source) = err else {
        return None;
    };
    let transport_err: &TransportError = (source.as_ref() as &(dyn std::error::Error + 'static)).downcast_ref()?;
    match transport_err {
        TransportError::Closed(code) => *code,
        _ => None,
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        assert_eq!(backoff(0), Duration::from_millis(1000));
        assert_eq!(backoff(1), Duration::from_millis(2000));
        assert_eq!(backoff(6), Duration::from_millis(64_000).min(Duration::from_millis(60_000)));
        assert_eq!(backoff(20), Duration::from_millis(60_000));
    }

    #[test]
    fn evicted_exits_cleanly_but_auth_rejection_does_not() {
        assert_eq!(Outcome::Evicted.exit_code(), 0);
        assert_eq!(Outcome::AuthRejected.exit_code(), 1);
        assert_eq!(Outcome::GaveUp.exit_code(), 1);
    }
}
