use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::NodeId;

pub const DEFAULT_ELECTION_TIMEOUT: RangeInclusive<Duration> = Duration::from_millis(150)..=Duration::from_millis(300);

pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_millis(50);

/// period of the heartbeats sent by the simulated replication layer,
/// well below the minimum election timeout so that a couple can get lost
pub const DEFAULT_HEARTBEAT_PERIOD: Duration = Duration::from_millis(50);

/// Static configuration of one node of a fixed-membership cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionConfig {
    pub node_id: NodeId,
    pub peers: Vec<NodeId>,
    pub election_timeout: RangeInclusive<Duration>,
    pub rpc_timeout: Duration,
}

impl ElectionConfig {
    pub fn new(node_id: NodeId, peers: Vec<NodeId>) -> Self {
        Self {
            node_id,
            peers,
            election_timeout: DEFAULT_ELECTION_TIMEOUT,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
        }
    }

    pub fn with_election_timeout(mut self, election_timeout: RangeInclusive<Duration>) -> Self {
        self.election_timeout = election_timeout;
        self
    }

    pub fn with_rpc_timeout(mut self, rpc_timeout: Duration) -> Self {
        self.rpc_timeout = rpc_timeout;
        self
    }

    /// Number of voters, this node included
    pub fn cluster_size(&self) -> usize {
        self.peers.len() + 1
    }

    pub fn is_peer(&self, id: NodeId) -> bool {
        self.peers.contains(&id)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = (*self.election_timeout.start(), *self.election_timeout.end());
        if min > max {
            return Err(ConfigError::EmptyElectionTimeout { min, max });
        }
        if min.is_zero() {
            return Err(ConfigError::ZeroElectionTimeout);
        }
        if self.rpc_timeout.is_zero() {
            return Err(ConfigError::ZeroRpcTimeout);
        }

        let mut seen = BTreeSet::new();
        for peer in &self.peers {
            if *peer == self.node_id {
                return Err(ConfigError::SelfInPeers(*peer));
            }
            if !seen.insert(*peer) {
                return Err(ConfigError::DuplicatePeer(*peer));
            }
        }

        if self.rpc_timeout >= min {
            tracing::warn!(
                "rpc timeout {:?} is not shorter than the minimum election timeout {:?}",
                self.rpc_timeout,
                min
            );
        }

        Ok(())
    }
}
