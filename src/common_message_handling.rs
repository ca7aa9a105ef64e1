use crate::common_state::CommonState;
use crate::error::ElectionError;
use crate::log_position::LogInspector;
use crate::messages::heartbeat::Heartbeat;
use crate::messages::poll_state::PollStateRequest;
use crate::messages::request_vote::{RequestVoteArgs, RequestVoteReply, RequestVoteRequest};
use crate::messages::RaftMessage;
use crate::observer::RoleObserver;
use crate::storage::StateStore;
use crate::types::Role;

/// Decides whether to grant a vote, the receiving side of `RequestVote`.
///
/// A higher term is adopted (and persisted) before anything else is checked,
/// so the reply always carries our term after the request has been seen.
/// Invalid requests are rejected without touching the state.
#[tracing::instrument(level = "debug", skip(common_state))]
pub async fn handle_vote_request<S, L, O>(
    common_state: &mut CommonState<S, L, O>,
    args: &RequestVoteArgs,
) -> Result<RequestVoteReply, ElectionError>
where
    S: StateStore,
    L: LogInspector,
    O: RoleObserver,
{
    if args.term == 0 {
        return Err(ElectionError::InvalidTerm(args.term));
    }
    if !common_state.config().is_peer(args.candidate_id) {
        return Err(ElectionError::UnknownCandidate(args.candidate_id));
    }

    if args.term < common_state.current_term() {
        tracing::trace!(
            "request term = {} < current term = {}: ignoring",
            args.term,
            common_state.current_term()
        );
        common_state.note_stale_rejection();
        return Ok(RequestVoteReply {
            term: common_state.current_term(),
            vote_granted: false,
        });
    }

    common_state.observe_term(args.term).await?;

    // set a negative reply by default, we will update it if we can grant the vote
    let mut reply = RequestVoteReply {
        term: common_state.current_term(),
        vote_granted: false,
    };

    if let Some(voted_for) = common_state.voted_for() {
        if voted_for != args.candidate_id {
            tracing::trace!("already voted for {} in term {}", voted_for, common_state.current_term());
            return Ok(reply);
        }
    }

    let my_last_log = common_state.last_log_position();
    if !args.last_log_position().is_at_least_as_up_to_date_as(&my_last_log) {
        tracing::trace!(
            "candidate log {:?} is behind ours {:?}",
            args.last_log_position(),
            my_last_log
        );
        return Ok(reply);
    }

    common_state.grant_vote(args.candidate_id).await?;
    reply.vote_granted = true;

    tracing::trace!("vote granted to {}", args.candidate_id);
    Ok(reply)
}

/// Answers a vote request coming from the mailbox.
///
/// Fatal errors are returned without answering: the caller sees the request dropped
/// rather than a vote that was never made durable.
pub async fn answer_vote_request<S, L, O>(
    common_state: &mut CommonState<S, L, O>,
    request: RequestVoteRequest,
) -> Result<(), ElectionError>
where
    S: StateStore,
    L: LogInspector,
    O: RoleObserver,
{
    match handle_vote_request(common_state, &request.args).await {
        Ok(reply) => {
            let _ = request.reply_to.send(Ok(reply));
            Ok(())
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::warn!("rejecting vote request: {}", e);
            let _ = request.reply_to.send(Err(e));
            Ok(())
        }
    }
}

/// Handles the news that a leader is alive, as reported by the replication layer.
///
/// Returns `true` if `heartbeat` comes from the legitimate leader of our current term
#[tracing::instrument(level = "trace", skip(common_state))]
pub async fn handle_heartbeat<S, L, O>(
    common_state: &mut CommonState<S, L, O>,
    heartbeat: Heartbeat,
) -> Result<bool, ElectionError>
where
    S: StateStore,
    L: LogInspector,
    O: RoleObserver,
{
    if !common_state.config().is_peer(heartbeat.leader_id) {
        tracing::warn!("heartbeat from unknown node {}, ignoring", heartbeat.leader_id);
        return Ok(false);
    }

    if heartbeat.term < common_state.current_term() {
        tracing::trace!(
            "heartbeat term = {} < current term = {}: ignoring",
            heartbeat.term,
            common_state.current_term()
        );
        common_state.note_stale_rejection();
        return Ok(false);
    }

    common_state.observe_term(heartbeat.term).await?;

    if common_state.role() == Role::Leader {
        tracing::error!(
            "two leaders with the same term detected: {} and {} (me)",
            heartbeat.leader_id,
            common_state.me()
        );
        return Ok(false);
    }

    if let Some(leader_id) = common_state.leader_id() {
        if leader_id != heartbeat.leader_id {
            tracing::error!(
                "two leaders with the same term detected: {} and {}",
                heartbeat.leader_id,
                leader_id
            );
        }
    }

    common_state.become_follower(Some(heartbeat.leader_id));
    Ok(true)
}

pub fn handle_poll_state<S, L, O>(common_state: &CommonState<S, L, O>, request: PollStateRequest)
where
    S: StateStore,
    L: LogInspector,
    O: RoleObserver,
{
    let _ = request.reply_to.send(common_state.status());
}

/// Handles one message the same way in every role
pub async fn handle_message<S, L, O>(
    common_state: &mut CommonState<S, L, O>,
    message: RaftMessage,
) -> Result<(), ElectionError>
where
    S: StateStore,
    L: LogInspector,
    O: RoleObserver,
{
    match message {
        RaftMessage::RequestVoteRequest(request) => answer_vote_request(common_state, request).await?,
        RaftMessage::Heartbeat(heartbeat) => {
            handle_heartbeat(common_state, heartbeat).await?;
        }
        RaftMessage::StepDown => {
            if common_state.role() == Role::Leader {
                tracing::info!("replication layer asked to step down");
                common_state.become_follower(None);
            } else {
                tracing::trace!("not the leader, ignoring step down");
            }
        }
        RaftMessage::PollStateRequest(request) => handle_poll_state(common_state, request),
    }
    Ok(())
}
