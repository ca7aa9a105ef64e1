use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};

use crate::log_position::LogPosition;
use crate::types::{NodeId, VoteReplySender};

/// Arguments of the `RequestVote` call, one instance per outbound attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestVoteArgs {
    pub term: u64,
    pub candidate_id: NodeId,
    pub last_log_index: u64,
    pub last_log_term: u64,
}

impl RequestVoteArgs {
    pub fn new(term: u64, candidate_id: NodeId, last_log: LogPosition) -> Self {
        Self {
            term,
            candidate_id,
            last_log_index: last_log.index,
            last_log_term: last_log.term,
        }
    }

    pub fn last_log_position(&self) -> LogPosition {
        LogPosition::new(self.last_log_index, self.last_log_term)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestVoteReply {
    pub term: u64,
    pub vote_granted: bool,
}

/// A vote request delivered to the node's mailbox, answered through `reply_to`
pub struct RequestVoteRequest {
    pub args: RequestVoteArgs,
    pub reply_to: VoteReplySender,
}

impl Debug for RequestVoteRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestVoteRequest")
            .field("term", &self.args.term)
            .field("candidate_id", &self.args.candidate_id)
            .field("last_log_index", &self.args.last_log_index)
            .field("last_log_term", &self.args.last_log_term)
            .finish_non_exhaustive()
    }
}
