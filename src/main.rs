use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use oxidized_ballot::config::DEFAULT_HEARTBEAT_PERIOD;
use oxidized_ballot::prelude::*;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

const SERVER_COUNT: usize = 5;

/// Waits for the next node to win an election, skipping every other event
async fn next_leader(events: &mut mpsc::UnboundedReceiver<RoleEvent>) -> Option<(NodeId, u64)> {
    while let Some(event) = events.recv().await {
        if let RoleChange::BecameLeader { term } = event.change {
            return Some((event.node, term));
        }
    }
    None
}

#[tokio::main]
async fn main() {
    // Note: guard must remain in scope
    let _log_guard = match std::env::var_os("RAFT_LOG_DIR") {
        Some(dir) => match init_file_logs(&PathBuf::from(dir), "simulation") {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("cannot open the log file: {}", e);
                return;
            }
        },
        None => {
            init_tracing();
            None
        }
    };

    let transport = Arc::new(ActorTransport::new());
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let mut servers = spawn_election_servers(SERVER_COUNT, None, Arc::clone(&transport), events_tx);
    let (relay, mut events) = spawn_heartbeat_relay(events_rx, Arc::clone(&transport), DEFAULT_HEARTBEAT_PERIOD);

    let Ok(Some((leader, term))) = timeout(Duration::from_secs(5), next_leader(&mut events)).await else {
        tracing::error!("no leader elected");
        return;
    };
    tracing::info!("node {} is the leader of term {}", leader, term);

    sleep(Duration::from_secs(1)).await;

    tracing::info!("crashing node {}", leader);
    // the relay does not know about crashes, cut the links so its heartbeats stop too
    transport.isolate(leader);
    let position = servers.iter().position(|server| server.server_id == leader);
    if let Some(crashed) = position.map(|i| servers.remove(i)) {
        drop(crashed.guard);
        let _ = crashed.handle.await;
    }

    match timeout(Duration::from_secs(5), next_leader(&mut events)).await {
        Ok(Some((leader, term))) => tracing::info!("node {} took over in term {}", leader, term),
        _ => tracing::error!("no leader elected after the crash"),
    }

    for status in poll_all(&servers).await.into_iter().flatten() {
        tracing::info!(
            "node {}: {} of term {}, voted for {:?}",
            status.id,
            status.role,
            status.term,
            status.voted_for
        );
    }

    for server in servers {
        drop(server.guard);
        let _ = server.handle.await;
    }
    let _ = relay.await;
}
