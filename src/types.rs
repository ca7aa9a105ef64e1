use std::fmt::{self, Display, Formatter};

use tokio::sync::oneshot;

use crate::error::ElectionError;
use crate::messages::request_vote::RequestVoteReply;

pub type NodeId = u64;

/// What a node answers to a `RequestVote`: a reply, or the reason the call was refused outright
pub type VoteResult = Result<RequestVoteReply, ElectionError>;

pub type VoteReplySender = oneshot::Sender<VoteResult>;

/// Role of a node in the current term.
/// Only `CommonState` assigns it, every other component reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Role::Follower => write!(f, "follower"),
            Role::Candidate => write!(f, "candidate"),
            Role::Leader => write!(f, "leader"),
        }
    }
}
