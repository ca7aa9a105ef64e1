use std::collections::{BTreeMap, BTreeSet};

use actum::actor_ref::ActorRef;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::TransportError;
use crate::messages::heartbeat::Heartbeat;
use crate::messages::request_vote::{RequestVoteArgs, RequestVoteReply, RequestVoteRequest};
use crate::messages::RaftMessage;
use crate::types::NodeId;

/// Delivers vote requests to peers.
///
/// The election core does not retry: a failed or timed out call simply counts as a vote not granted.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send_request_vote(&self, peer: NodeId, args: RequestVoteArgs) -> Result<RequestVoteReply, TransportError>;
}

/// In-process transport that hands requests straight to the peers' mailboxes.
///
/// Links can be cut with `isolate` to simulate partitions.
#[derive(Default)]
pub struct ActorTransport {
    peers: Mutex<BTreeMap<NodeId, ActorRef<RaftMessage>>>,
    isolated: Mutex<BTreeSet<NodeId>>,
}

impl ActorTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_peer(&self, id: NodeId, peer_ref: ActorRef<RaftMessage>) {
        tracing::trace!("🙆 Peer {} added", id);
        self.peers.lock().insert(id, peer_ref);
    }

    /// Drops every message sent to or from `id` until `reconnect` is called
    pub fn isolate(&self, id: NodeId) {
        tracing::debug!("isolating node {}", id);
        self.isolated.lock().insert(id);
    }

    pub fn reconnect(&self, id: NodeId) {
        tracing::debug!("reconnecting node {}", id);
        self.isolated.lock().remove(&id);
    }

    pub fn is_isolated(&self, id: NodeId) -> bool {
        self.isolated.lock().contains(&id)
    }

    fn link(&self, from: NodeId, to: NodeId) -> Option<ActorRef<RaftMessage>> {
        if self.is_isolated(from) || self.is_isolated(to) {
            return None;
        }
        self.peers.lock().get(&to).cloned()
    }

    /// Delivers a heartbeat of `heartbeat.leader_id` to every other registered node,
    /// stands in for the replication layer
    pub fn broadcast_heartbeat(&self, heartbeat: Heartbeat) {
        let ids: Vec<NodeId> = self.peers.lock().keys().copied().collect();
        for id in ids.into_iter().filter(|id| *id != heartbeat.leader_id) {
            if let Some(mut peer_ref) = self.link(heartbeat.leader_id, id) {
                let _ = peer_ref.try_send(heartbeat.into());
            }
        }
    }
}

#[async_trait]
impl Transport for ActorTransport {
    async fn send_request_vote(&self, peer: NodeId, args: RequestVoteArgs) -> Result<RequestVoteReply, TransportError> {
        let Some(mut peer_ref) = self.link(args.candidate_id, peer) else {
            return Err(TransportError::Unreachable(peer));
        };

        let (reply_to, reply) = oneshot::channel();
        peer_ref
            .try_send(RequestVoteRequest { args, reply_to }.into())
            .map_err(|_| TransportError::Unreachable(peer))?;

        match reply.await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => Err(TransportError::Refused {
                peer,
                reason: e.to_string(),
            }),
            Err(_) => Err(TransportError::Closed(peer)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ElectionError;
    use assert_matches::assert_matches;
    use futures::StreamExt;
    use futures_channel::mpsc;
    use std::sync::Arc;

    fn args(candidate_id: NodeId) -> RequestVoteArgs {
        RequestVoteArgs {
            term: 1,
            candidate_id,
            last_log_index: 0,
            last_log_term: 0,
        }
    }

    #[tokio::test]
    async fn request_reaches_peer_and_reply_comes_back() {
        let (tx, mut rx) = mpsc::channel::<RaftMessage>(10);
        let transport = Arc::new(ActorTransport::new());
        transport.add_peer(2, ActorRef::new(tx));

        let sender = Arc::clone(&transport);
        let call = tokio::spawn(async move { sender.send_request_vote(2, args(1)).await });

        let Some(RaftMessage::RequestVoteRequest(request)) = rx.next().await else {
            panic!("expected a vote request");
        };
        assert_eq!(request.args.candidate_id, 1);
        let _ = request.reply_to.send(Ok(RequestVoteReply {
            term: 1,
            vote_granted: true,
        }));

        assert_eq!(
            call.await.unwrap(),
            Ok(RequestVoteReply {
                term: 1,
                vote_granted: true
            })
        );
    }

    #[tokio::test]
    async fn refused_request_carries_the_reason() {
        let (tx, mut rx) = mpsc::channel::<RaftMessage>(10);
        let transport = Arc::new(ActorTransport::new());
        transport.add_peer(2, ActorRef::new(tx));

        let sender = Arc::clone(&transport);
        let call = tokio::spawn(async move { sender.send_request_vote(2, args(9)).await });

        let Some(RaftMessage::RequestVoteRequest(request)) = rx.next().await else {
            panic!("expected a vote request");
        };
        let _ = request.reply_to.send(Err(ElectionError::UnknownCandidate(9)));

        assert_matches!(call.await.unwrap(), Err(TransportError::Refused { peer: 2, .. }));
    }

    #[tokio::test]
    async fn dropped_request_is_closed() {
        let (tx, mut rx) = mpsc::channel::<RaftMessage>(10);
        let transport = Arc::new(ActorTransport::new());
        transport.add_peer(2, ActorRef::new(tx));

        let sender = Arc::clone(&transport);
        let call = tokio::spawn(async move { sender.send_request_vote(2, args(1)).await });

        let request = rx.next().await.expect("expected a vote request");
        drop(request);

        assert_eq!(call.await.unwrap(), Err(TransportError::Closed(2)));
    }

    #[tokio::test]
    async fn unknown_peer_is_unreachable() {
        let transport = ActorTransport::new();
        assert_eq!(
            transport.send_request_vote(7, args(1)).await,
            Err(TransportError::Unreachable(7))
        );
    }

    #[tokio::test]
    async fn isolated_candidate_cannot_reach_anyone() {
        let (tx, _rx) = mpsc::channel::<RaftMessage>(10);
        let transport = ActorTransport::new();
        transport.add_peer(2, ActorRef::new(tx));

        transport.isolate(1);
        assert_eq!(
            transport.send_request_vote(2, args(1)).await,
            Err(TransportError::Unreachable(2))
        );
        assert!(transport.is_isolated(1));
    }

    #[test]
    fn heartbeats_skip_the_leader_and_isolated_nodes() {
        let (tx1, mut rx1) = mpsc::channel::<RaftMessage>(10);
        let (tx2, mut rx2) = mpsc::channel::<RaftMessage>(10);
        let (tx3, mut rx3) = mpsc::channel::<RaftMessage>(10);
        let transport = ActorTransport::new();
        transport.add_peer(1, ActorRef::new(tx1));
        transport.add_peer(2, ActorRef::new(tx2));
        transport.add_peer(3, ActorRef::new(tx3));
        transport.isolate(3);

        transport.broadcast_heartbeat(Heartbeat { term: 2, leader_id: 1 });

        assert!(rx1.try_next().is_err(), "the leader does not receive its own heartbeat");
        let Ok(Some(RaftMessage::Heartbeat(heartbeat))) = rx2.try_next() else {
            panic!("expected a heartbeat");
        };
        assert_eq!(heartbeat, Heartbeat { term: 2, leader_id: 1 });
        assert!(rx3.try_next().is_err(), "isolated nodes receive nothing");
    }
}
