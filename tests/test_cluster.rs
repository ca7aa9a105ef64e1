#![allow(dead_code)]

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use actum::actor_ref::ActorRef;
use oxidized_ballot::config::DEFAULT_HEARTBEAT_PERIOD;
use oxidized_ballot::prelude::*;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// A cluster of election actors wired through an `ActorTransport`,
/// with the heartbeat relay standing in for log replication
pub struct TestCluster {
    pub servers: Vec<Server>,
    pub transport: Arc<ActorTransport>,
    pub events: mpsc::UnboundedReceiver<RoleEvent>,
    relay: JoinHandle<()>,
}

impl TestCluster {
    pub fn spawn(n_servers: usize, election_timeout: Option<RangeInclusive<Duration>>) -> Self {
        init_tracing();

        let transport = Arc::new(ActorTransport::new());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let servers = spawn_election_servers(n_servers, election_timeout, Arc::clone(&transport), events_tx);
        let (relay, events) = spawn_heartbeat_relay(events_rx, Arc::clone(&transport), DEFAULT_HEARTBEAT_PERIOD);

        Self {
            servers,
            transport,
            events,
            relay,
        }
    }

    /// Next `(node, term)` to win an election, `None` if nobody wins within `within`
    pub async fn next_leader(&mut self, within: Duration) -> Option<(NodeId, u64)> {
        let events = &mut self.events;
        timeout(within, async move {
            while let Some(event) = events.recv().await {
                if let RoleChange::BecameLeader { term } = event.change {
                    return Some((event.node, term));
                }
            }
            None
        })
        .await
        .ok()
        .flatten()
    }

    /// Next leader elected in a term greater than `term`
    pub async fn leader_after(&mut self, term: u64, within: Duration) -> Option<(NodeId, u64)> {
        let events = &mut self.events;
        timeout(within, async move {
            while let Some(event) = events.recv().await {
                match event.change {
                    RoleChange::BecameLeader { term: won } if won > term => return Some((event.node, won)),
                    _ => {}
                }
            }
            None
        })
        .await
        .ok()
        .flatten()
    }

    /// Polls the cluster until exactly one node leads and every other node follows it in the same term
    pub async fn wait_for_stable_leader(&self, within: Duration) -> Option<NodeStatus> {
        timeout(within, async {
            loop {
                let statuses = self.statuses().await;
                let mut leaders = statuses.iter().filter(|status| status.role == Role::Leader);
                if let (Some(leader), None) = (leaders.next(), leaders.next()) {
                    let followed = statuses.iter().filter(|status| status.id != leader.id).all(|status| {
                        status.role == Role::Follower && status.term == leader.term && status.leader_id == Some(leader.id)
                    });
                    if followed {
                        return *leader;
                    }
                }
                sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .ok()
    }

    /// Every event received within `within`
    pub async fn collect_events(&mut self, within: Duration) -> Vec<RoleEvent> {
        let mut collected = Vec::new();
        let _ = timeout(within, async {
            while let Some(event) = self.events.recv().await {
                collected.push(event);
            }
        })
        .await;
        collected
    }

    pub fn server(&self, id: NodeId) -> &Server {
        self.servers
            .iter()
            .find(|server| server.server_id == id)
            .expect("no server with that id")
    }

    pub async fn status(&self, id: NodeId) -> NodeStatus {
        poll_state(&self.server(id).server_ref).await.expect("server stopped")
    }

    pub async fn statuses(&self) -> Vec<NodeStatus> {
        poll_all(&self.servers)
            .await
            .into_iter()
            .map(|status| status.expect("server stopped"))
            .collect()
    }

    pub async fn shutdown(self) {
        tracing::debug!("dropping actor guards");
        for server in self.servers {
            drop(server.guard);
            let _ = server.handle.await;
        }
        self.relay.abort();
    }
}

/// Sends a vote request straight to a node's mailbox and waits for the answer.
///
/// The outer error means the node dropped the request without answering.
pub async fn request_vote(
    server_ref: &ActorRef<RaftMessage>,
    args: RequestVoteArgs,
) -> Result<Result<RequestVoteReply, ElectionError>, oneshot::error::RecvError> {
    let mut server_ref = server_ref.clone();
    let (reply_to, reply) = oneshot::channel();
    let _ = server_ref.try_send(RequestVoteRequest { args, reply_to }.into());
    reply.await
}
