use tokio::sync::mpsc;

use crate::types::NodeId;

/// Notified by the election core on role changes,
/// lets the replication layer start or stop heartbeats and command acceptance.
pub trait RoleObserver: Send + 'static {
    fn on_become_leader(&mut self, term: u64);

    /// Called on every move into follower and whenever a higher term is adopted
    fn on_become_follower(&mut self, term: u64);
}

pub struct NoopObserver;

impl RoleObserver for NoopObserver {
    fn on_become_leader(&mut self, _term: u64) {}

    fn on_become_follower(&mut self, _term: u64) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChange {
    BecameLeader { term: u64 },
    BecameFollower { term: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleEvent {
    pub node: NodeId,
    pub change: RoleChange,
}

/// Forwards role changes of one node to a channel shared by the whole cluster
pub struct ChannelObserver {
    node: NodeId,
    events: mpsc::UnboundedSender<RoleEvent>,
}

impl ChannelObserver {
    pub fn new(node: NodeId, events: mpsc::UnboundedSender<RoleEvent>) -> Self {
        Self { node, events }
    }

    fn emit(&self, change: RoleChange) {
        // nobody listening anymore is not our problem
        let _ = self.events.send(RoleEvent { node: self.node, change });
    }
}

impl RoleObserver for ChannelObserver {
    fn on_become_leader(&mut self, term: u64) {
        self.emit(RoleChange::BecameLeader { term });
    }

    fn on_become_follower(&mut self, term: u64) {
        self.emit(RoleChange::BecameFollower { term });
    }
}
