//! Miscellaneous straightforward error structs for particular situations.

use thiserror::Error;

use crate::{ErrorKind, HasKind};

/// A JSON-RPC response arrived whose `id` does not match any request this
/// peer has outstanding.
///
/// Not fatal to the connection: a late or duplicate response should be
/// dropped rather than torn down the transport.
#[derive(Clone, Debug, Error)]
#[error("no pending request with id {0:?}")]
#[non_exhaustive]
pub struct UnknownRequestId(pub String);

impl HasKind for UnknownRequestId {
    fn kind(&self) -> ErrorKind {
        ErrorKind::RpcProtocol
    }
}
