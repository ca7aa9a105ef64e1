use std::sync::Arc;
use std::time::Duration;

use actum::actor_bounds::ActorBounds;
use itertools::Itertools;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, timeout};
use tracing::Instrument;

use crate::common_message_handling::handle_message;
use crate::common_state::CommonState;
use crate::error::{ElectionError, TransportError};
use crate::log_position::LogInspector;
use crate::messages::request_vote::{RequestVoteArgs, RequestVoteReply};
use crate::messages::RaftMessage;
use crate::observer::RoleObserver;
use crate::storage::StateStore;
use crate::tally::{TallyOutcome, VoteTally};
use crate::transport::Transport;
use crate::types::{NodeId, Role};

type PendingVotes = JoinSet<(NodeId, Result<RequestVoteReply, TransportError>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionProgress {
    Ongoing,
    Won,
    /// a peer knows a higher term, we are a follower again
    SteppedDown,
}

/// Behavior of the Raft server in candidate state, for the election of the current term.
///
/// The term was already incremented and the self vote persisted by `become_candidate`.
/// Returns once the election is won, lost to a higher term or another leader,
/// or timed out, in which case the next election has already been started.
pub async fn candidate_behavior<AB, S, L, O, T>(
    cell: &mut AB,
    common_state: &mut CommonState<S, L, O>,
    transport: &Arc<T>,
) -> Result<(), ElectionError>
where
    AB: ActorBounds<RaftMessage>,
    S: StateStore,
    L: LogInspector,
    O: RoleObserver,
    T: Transport,
{
    let term = common_state.current_term();
    let mut tally = VoteTally::new(term, common_state.me(), common_state.config().cluster_size());

    if tally.outcome() == TallyOutcome::Won {
        tracing::debug!("no peers to ask, own vote is a majority");
        common_state.become_leader();
        return Ok(());
    }

    let args = RequestVoteArgs::new(term, common_state.me(), common_state.last_log_position());
    tracing::debug!(
        "requesting votes from [{}] with last log {:?}",
        common_state.config().peers.iter().join(", "),
        args.last_log_position()
    );
    // dropping the join set when this function returns aborts the calls of an abandoned term
    let mut pending_votes = request_votes(
        transport,
        &common_state.config().peers,
        args,
        common_state.config().rpc_timeout,
    );

    loop {
        let deadline = common_state.election_timer.deadline();

        tokio::select! {
            message = cell.recv() => {
                let Some(message) = message.message() else {
                    return Err(ElectionError::Shutdown);
                };
                tracing::trace!(message = ?message);

                handle_message(common_state, message).await?;
                if common_state.role() != Role::Candidate {
                    return Ok(());
                }
            },
            Some(joined) = pending_votes.join_next() => {
                let (peer, result) = match joined {
                    Ok(vote) => vote,
                    Err(e) => {
                        tracing::warn!("vote request task failed: {}", e);
                        continue;
                    }
                };

                match result {
                    Ok(reply) => {
                        match handle_vote_reply(common_state, &mut tally, peer, reply).await? {
                            ElectionProgress::Ongoing => {}
                            ElectionProgress::Won | ElectionProgress::SteppedDown => return Ok(()),
                        }
                    }
                    Err(e) => {
                        tracing::debug!("no vote from {}: {}", peer, e);
                        if tally.record_failure(peer) == TallyOutcome::Lost {
                            tracing::debug!("election of term {} cannot be won anymore", term);
                        }
                    }
                }
            },
            _ = sleep_until(deadline) => {
                tracing::debug!("election timeout, {} votes out of {}", tally.granted(), common_state.config().cluster_size());
                // split vote, try again in a new term
                return common_state.become_candidate().await;
            },
        }
    }
}

/// Sends a vote request to every peer in parallel, each call with its own timeout
fn request_votes<T>(transport: &Arc<T>, peers: &[NodeId], args: RequestVoteArgs, rpc_timeout: Duration) -> PendingVotes
where
    T: Transport,
{
    let mut pending_votes = JoinSet::new();

    for &peer in peers {
        let transport = Arc::clone(transport);
        pending_votes.spawn(
            async move {
                let result = match timeout(rpc_timeout, transport.send_request_vote(peer, args)).await {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout(peer)),
                };
                (peer, result)
            }
            .in_current_span(),
        );
    }

    pending_votes
}

/// Counts a vote reply, checked against the state at the time it is received
#[tracing::instrument(level = "trace", skip(common_state, tally))]
pub async fn handle_vote_reply<S, L, O>(
    common_state: &mut CommonState<S, L, O>,
    tally: &mut VoteTally,
    from: NodeId,
    reply: RequestVoteReply,
) -> Result<ElectionProgress, ElectionError>
where
    S: StateStore,
    L: LogInspector,
    O: RoleObserver,
{
    if reply.term > common_state.current_term() {
        tracing::debug!("{} is at term {}, abandoning the election", from, reply.term);
        tally.record_higher_term(from, reply.term);
        common_state.observe_term(reply.term).await?;
        return Ok(ElectionProgress::SteppedDown);
    }

    // don't count votes with terms different than the current one, nor after the election is over
    if common_state.role() != Role::Candidate
        || reply.term != common_state.current_term()
        || tally.term() != common_state.current_term()
    {
        tracing::trace!("stale vote reply from {} for term {}, ignoring", from, reply.term);
        return Ok(ElectionProgress::Ongoing);
    }

    match tally.record_vote(from, reply.vote_granted) {
        TallyOutcome::Won => {
            tracing::debug!("{} votes, majority reached", tally.granted());
            common_state.become_leader();
            Ok(ElectionProgress::Won)
        }
        TallyOutcome::Lost => {
            tracing::debug!("too many votes against, waiting for the next election");
            Ok(ElectionProgress::Ongoing)
        }
        TallyOutcome::Pending => Ok(ElectionProgress::Ongoing),
    }
}
