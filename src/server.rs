use std::sync::Arc;

use actum::actor_bounds::ActorBounds;
use tracing::{info_span, Instrument};

use crate::candidate::candidate_behavior;
use crate::common_state::CommonState;
use crate::config::ElectionConfig;
use crate::error::ElectionError;
use crate::follower::follower_behavior;
use crate::leader::leader_behavior;
use crate::log_position::LogInspector;
use crate::messages::RaftMessage;
use crate::observer::RoleObserver;
use crate::storage::StateStore;
use crate::transport::Transport;
use crate::types::Role;

/// Body of the election actor of one node.
///
/// Recovers the persisted term and vote, then runs the behavior of the current role
/// until the mailbox is closed or the node hits an error it cannot recover from.
pub async fn raft_server<AB, S, L, O, T>(
    mut cell: AB,
    config: ElectionConfig,
    store: S,
    log: L,
    observer: O,
    transport: Arc<T>,
) -> AB
where
    AB: ActorBounds<RaftMessage>,
    S: StateStore,
    L: LogInspector,
    O: RoleObserver,
    T: Transport,
{
    let mut common_state = match CommonState::recover(config, store, log, observer).await {
        Ok(common_state) => common_state,
        Err(e) => {
            tracing::error!("cannot start: {}", e);
            return cell;
        }
    };

    loop {
        let result = match common_state.role() {
            Role::Follower => {
                follower_behavior(&mut cell, &mut common_state)
                    .instrument(info_span!("follower"))
                    .await
            }
            Role::Candidate => {
                let term = common_state.current_term();
                candidate_behavior(&mut cell, &mut common_state, &transport)
                    .instrument(info_span!("candidate", term))
                    .await
            }
            Role::Leader => {
                leader_behavior(&mut cell, &mut common_state)
                    .instrument(info_span!("leader👑"))
                    .await
            }
        };

        match result {
            Ok(()) => {}
            Err(ElectionError::Shutdown) => {
                tracing::info!("mailbox closed, stopping");
                break;
            }
            Err(e) => {
                tracing::error!(state = ?common_state, "halting: {}", e);
                break;
            }
        }
    }

    cell
}
