use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use actum::drop_guard::ActorDropGuard;
use actum::prelude::*;
use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info_span, Instrument};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::{ElectionConfig, DEFAULT_ELECTION_TIMEOUT};
use crate::log_position::{LogInspector, LogPosition};
use crate::messages::heartbeat::Heartbeat;
use crate::messages::poll_state::{NodeStatus, PollStateRequest};
use crate::messages::RaftMessage;
use crate::observer::{ChannelObserver, RoleChange, RoleEvent, RoleObserver};
use crate::server::raft_server;
use crate::storage::{MemStore, StateStore};
use crate::transport::{ActorTransport, Transport};
use crate::types::NodeId;

pub struct Server {
    pub server_id: NodeId,
    pub server_ref: ActorRef<RaftMessage>,
    /// dropping it stops the actor, which is how a crash is simulated
    pub guard: ActorDropGuard,
    pub handle: JoinHandle<()>,
}

/// Spawns the election actor of one node on the current runtime
pub fn spawn_election_server<S, L, O, T>(config: ElectionConfig, store: S, log: L, observer: O, transport: Arc<T>) -> Server
where
    S: StateStore,
    L: LogInspector,
    O: RoleObserver,
    T: Transport,
{
    let id = config.node_id;
    let actor = actum::<RaftMessage, _, _>(move |cell, _me| async move {
        raft_server(cell, config, store, log, observer, transport).await
    });
    let handle = tokio::spawn(actor.task.run_task().instrument(info_span!("server", id)));

    Server {
        server_id: id,
        server_ref: actor.m_ref,
        guard: actor.guard,
        handle,
    }
}

/// Spawns a cluster of `n_servers` nodes with ids `0..n_servers`, all starting from term 0 with empty logs.
///
/// Every node reports its role changes on `events`.
pub fn spawn_election_servers(
    n_servers: usize,
    election_timeout: Option<RangeInclusive<Duration>>,
    transport: Arc<ActorTransport>,
    events: mpsc::UnboundedSender<RoleEvent>,
) -> Vec<Server> {
    let ids: Vec<NodeId> = (0..n_servers as NodeId).collect();
    let election_timeout = election_timeout.unwrap_or(DEFAULT_ELECTION_TIMEOUT);

    let servers: Vec<Server> = ids
        .iter()
        .map(|&id| {
            let peers = ids.iter().copied().filter(|peer| *peer != id).collect();
            let config = ElectionConfig::new(id, peers).with_election_timeout(election_timeout.clone());
            spawn_election_server(
                config,
                MemStore::default(),
                LogPosition::default(),
                ChannelObserver::new(id, events.clone()),
                Arc::clone(&transport),
            )
        })
        .collect();

    register_servers(&transport, &servers);
    servers
}

pub fn register_servers(transport: &ActorTransport, servers: &[Server]) {
    for server in servers {
        transport.add_peer(server.server_id, server.server_ref.clone());
    }
    tracing::debug!("{} servers registered", servers.len());
}

/// Asks a node for its state, `None` if the node is not running anymore
pub async fn poll_state(server_ref: &ActorRef<RaftMessage>) -> Option<NodeStatus> {
    let mut server_ref = server_ref.clone();
    let (reply_to, status) = oneshot::channel();
    server_ref.try_send(PollStateRequest { reply_to }.into()).ok()?;
    status.await.ok()
}

/// Polls every node concurrently, results are in the same order as `servers`
pub async fn poll_all(servers: &[Server]) -> Vec<Option<NodeStatus>> {
    join_all(servers.iter().map(|server| poll_state(&server.server_ref))).await
}

/// Stands in for the replication layer: every node that becomes leader sends heartbeats
/// through `transport` every `period`, until it reports becoming a follower.
///
/// The events are forwarded unchanged to the returned receiver.
/// The relay stops when every sender of `events` is gone.
pub fn spawn_heartbeat_relay(
    mut events: mpsc::UnboundedReceiver<RoleEvent>,
    transport: Arc<ActorTransport>,
    period: Duration,
) -> (JoinHandle<()>, mpsc::UnboundedReceiver<RoleEvent>) {
    let (forward, forwarded) = mpsc::unbounded_channel();

    let handle = tokio::spawn(
        async move {
            let mut heartbeats = BTreeMap::<NodeId, JoinHandle<()>>::new();

            while let Some(event) = events.recv().await {
                tracing::debug!(node = event.node, change = ?event.change);

                if let Some(previous) = heartbeats.remove(&event.node) {
                    previous.abort();
                }
                if let RoleChange::BecameLeader { term } = event.change {
                    let heartbeat = Heartbeat {
                        term,
                        leader_id: event.node,
                    };
                    heartbeats.insert(event.node, spawn_heartbeats(heartbeat, Arc::clone(&transport), period));
                }

                let _ = forward.send(event);
            }

            for (_, task) in heartbeats {
                task.abort();
            }
        }
        .instrument(info_span!("heartbeat relay")),
    );

    (handle, forwarded)
}

fn spawn_heartbeats(heartbeat: Heartbeat, transport: Arc<ActorTransport>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            transport.broadcast_heartbeat(heartbeat);
        }
    })
}

/// Logs to stdout, filtered by `RUST_LOG` (info by default).
/// Does nothing if a global subscriber is already installed, so every test can call it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_line_number(true)
        .try_init();
}

/// Logs to `dir/name.log` through a background writer, the returned guard flushes it on drop
pub fn init_file_logs(dir: &Path, name: &str) -> std::io::Result<WorkerGuard> {
    fs::create_dir_all(dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("{}.log", name)))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .try_init();

    Ok(guard)
}
