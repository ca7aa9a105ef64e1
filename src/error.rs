use std::time::Duration;

use thiserror::Error;

use crate::types::NodeId;

#[derive(Error, Debug)]
pub enum ElectionError {
    /// The term or vote could not be made durable, the node must stop taking part in elections
    #[error("persistent state store failed: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("vote requested by unknown candidate {0}")]
    UnknownCandidate(NodeId),

    #[error("invalid term {0} in vote request")]
    InvalidTerm(u64),

    /// The term space is used up, no further election can be started
    #[error("term {0} cannot be incremented")]
    TermExhausted(u64),

    #[error("mailbox closed")]
    Shutdown,
}

impl ElectionError {
    /// Fatal errors end the node's participation, the others only reject a single call
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ElectionError::Storage(_) | ElectionError::Config(_) | ElectionError::TermExhausted(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decoding error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("vote request to {0} timed out")]
    Timeout(NodeId),

    #[error("peer {0} is unreachable")]
    Unreachable(NodeId),

    #[error("peer {peer} refused the request: {reason}")]
    Refused { peer: NodeId, reason: String },

    #[error("peer {0} dropped the request without answering")]
    Closed(NodeId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("election timeout range is empty ({min:?} > {max:?})")]
    EmptyElectionTimeout { min: Duration, max: Duration },

    #[error("election timeout must be greater than zero")]
    ZeroElectionTimeout,

    #[error("rpc timeout must be greater than zero")]
    ZeroRpcTimeout,

    #[error("node {0} is listed among its own peers")]
    SelfInPeers(NodeId),

    #[error("peer {0} is listed more than once")]
    DuplicatePeer(NodeId),
}
