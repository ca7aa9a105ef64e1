use std::fmt::{Debug, Formatter};

use tokio::sync::oneshot;

use crate::types::{NodeId, Role};

pub struct PollStateRequest {
    pub reply_to: oneshot::Sender<NodeStatus>,
}

impl Debug for PollStateRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollStateRequest").finish_non_exhaustive()
    }
}

/// Snapshot of a node's election state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStatus {
    pub id: NodeId,
    pub role: Role,
    pub term: u64,
    pub voted_for: Option<NodeId>,
    pub leader_id: Option<NodeId>,
    pub stale_rejections: u64,
}
