use std::sync::Arc;
use std::time::Duration;

use oxidized_ballot::config::DEFAULT_HEARTBEAT_PERIOD;
use oxidized_ballot::prelude::*;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

#[tokio::test]
async fn shortest_timeout_wins() {
    init_tracing();

    let transport = Arc::new(ActorTransport::new());
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let fast = ElectionConfig::new(1, vec![2]).with_election_timeout(Duration::from_millis(100)..=Duration::from_millis(101));
    let slow = ElectionConfig::new(2, vec![1]).with_election_timeout(Duration::from_millis(500)..=Duration::from_millis(501));
    let servers = vec![
        spawn_election_server(
            fast,
            MemStore::default(),
            LogPosition::default(),
            ChannelObserver::new(1, events_tx.clone()),
            Arc::clone(&transport),
        ),
        spawn_election_server(
            slow,
            MemStore::default(),
            LogPosition::default(),
            ChannelObserver::new(2, events_tx),
            Arc::clone(&transport),
        ),
    ];
    register_servers(&transport, &servers);
    let (relay, mut events) = spawn_heartbeat_relay(events_rx, Arc::clone(&transport), DEFAULT_HEARTBEAT_PERIOD);

    let first_leader = timeout(Duration::from_secs(1), async {
        while let Some(event) = events.recv().await {
            if let RoleChange::BecameLeader { .. } = event.change {
                return Some(event);
            }
            // node 2 adopting term 1 when asked for its vote
            assert_eq!(
                event,
                RoleEvent {
                    node: 2,
                    change: RoleChange::BecameFollower { term: 1 }
                }
            );
        }
        None
    })
    .await
    .expect("node 1 should win before node 2 times out");
    assert_eq!(
        first_leader,
        Some(RoleEvent {
            node: 1,
            change: RoleChange::BecameLeader { term: 1 }
        })
    );

    // well past the slow timeout, the heartbeats must have kept node 2 quiet
    sleep(Duration::from_millis(700)).await;

    let leader = poll_state(&servers[0].server_ref).await.unwrap();
    assert_eq!(leader.role, Role::Leader);
    assert_eq!(leader.term, 1);

    let follower = poll_state(&servers[1].server_ref).await.unwrap();
    assert_eq!(follower.role, Role::Follower);
    assert_eq!(follower.term, 1);
    assert_eq!(follower.voted_for, Some(1));
    assert_eq!(follower.leader_id, Some(1));

    for server in servers {
        drop(server.guard);
        let _ = server.handle.await;
    }
    relay.abort();
}

#[tokio::test]
async fn lone_candidate_keeps_retrying() {
    init_tracing();

    let transport = Arc::new(ActorTransport::new());
    let store = MemStore::default();
    let config = ElectionConfig::new(1, vec![2, 3]).with_election_timeout(Duration::from_millis(50)..=Duration::from_millis(60));
    let server = spawn_election_server(config, store.clone(), LogPosition::default(), NoopObserver, Arc::clone(&transport));
    register_servers(&transport, std::slice::from_ref(&server));

    // peers 2 and 3 do not exist, every election fails and a new one starts
    sleep(Duration::from_millis(400)).await;

    let status = poll_state(&server.server_ref).await.unwrap();
    assert_eq!(status.role, Role::Candidate);
    assert!(status.term >= 3, "only reached term {}", status.term);
    assert_eq!(store.state().voted_for, Some(1));

    drop(server.guard);
    let _ = server.handle.await;
}
