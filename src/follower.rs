use actum::actor_bounds::ActorBounds;
use tokio::time::timeout_at;

use crate::common_message_handling::handle_message;
use crate::common_state::CommonState;
use crate::error::ElectionError;
use crate::log_position::LogInspector;
use crate::messages::RaftMessage;
use crate::observer::RoleObserver;
use crate::storage::StateStore;
use crate::types::Role;

/// Behavior of the Raft server in follower state.
///
/// Returns once the node stops being a follower, which normally happens
/// when the election timer fires and a new election is started.
pub async fn follower_behavior<AB, S, L, O>(
    cell: &mut AB,
    common_state: &mut CommonState<S, L, O>,
) -> Result<(), ElectionError>
where
    AB: ActorBounds<RaftMessage>,
    S: StateStore,
    L: LogInspector,
    O: RoleObserver,
{
    loop {
        // the deadline is read again every time, handlers reset it on heartbeats and granted votes
        let Ok(message) = timeout_at(common_state.election_timer.deadline(), cell.recv()).await else {
            tracing::debug!("election timeout");
            return common_state.become_candidate().await;
        };
        let Some(message) = message.message() else {
            return Err(ElectionError::Shutdown);
        };

        tracing::trace!(message = ?message);

        handle_message(common_state, message).await?;

        if common_state.role() != Role::Follower {
            return Ok(());
        }
    }
}
