use actum::actor_bounds::ActorBounds;

use crate::common_message_handling::handle_message;
use crate::common_state::CommonState;
use crate::error::ElectionError;
use crate::log_position::LogInspector;
use crate::messages::RaftMessage;
use crate::observer::RoleObserver;
use crate::storage::StateStore;
use crate::types::Role;

/// Behavior of the Raft server in leader state.
///
/// Heartbeats are the replication layer's business, which was told through `on_become_leader`;
/// the election timer is not watched at all while leading.
/// Returns when a higher term is discovered or the replication layer asks to step down.
pub async fn leader_behavior<AB, S, L, O>(
    cell: &mut AB,
    common_state: &mut CommonState<S, L, O>,
) -> Result<(), ElectionError>
where
    AB: ActorBounds<RaftMessage>,
    S: StateStore,
    L: LogInspector,
    O: RoleObserver,
{
    tracing::info!("elected leader of term {}", common_state.current_term());

    loop {
        let Some(message) = cell.recv().await.message() else {
            return Err(ElectionError::Shutdown);
        };

        tracing::trace!(message = ?message);

        handle_message(common_state, message).await?;

        if common_state.role() != Role::Leader {
            return Ok(());
        }
    }
}
