pub mod heartbeat;
pub mod poll_state;
pub mod request_vote;

use std::fmt::{self, Debug, Formatter};

use crate::messages::heartbeat::Heartbeat;
use crate::messages::poll_state::PollStateRequest;
use crate::messages::request_vote::RequestVoteRequest;

/// Everything the election actor of a node can receive.
/// The mailbox serializes them, so the term, vote and role are only ever touched by one task.
pub enum RaftMessage {
    RequestVoteRequest(RequestVoteRequest),
    Heartbeat(Heartbeat),
    /// the replication layer lost contact with a quorum, the leader must step down
    StepDown,
    PollStateRequest(PollStateRequest),
}

impl Debug for RaftMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestVoteRequest(request) => request.fmt(f),
            Self::Heartbeat(heartbeat) => heartbeat.fmt(f),
            Self::StepDown => "Step down".fmt(f),
            Self::PollStateRequest(_) => "Poll state request".fmt(f),
        }
    }
}

impl From<RequestVoteRequest> for RaftMessage {
    fn from(value: RequestVoteRequest) -> Self {
        Self::RequestVoteRequest(value)
    }
}

impl From<Heartbeat> for RaftMessage {
    fn from(value: Heartbeat) -> Self {
        Self::Heartbeat(value)
    }
}

impl From<PollStateRequest> for RaftMessage {
    fn from(value: PollStateRequest) -> Self {
        Self::PollStateRequest(value)
    }
}
