use crate::types::NodeId;

/// Sent by the replication layer whenever a valid AppendEntries or heartbeat is received
/// from the leader of `term`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub term: u64,
    pub leader_id: NodeId,
}
