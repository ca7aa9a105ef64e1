use std::fmt::{Debug, Formatter, Result as FmtResult};

use crate::config::ElectionConfig;
use crate::error::ElectionError;
use crate::log_position::{LogInspector, LogPosition};
use crate::messages::poll_state::NodeStatus;
use crate::observer::RoleObserver;
use crate::storage::{HardState, StateStore};
use crate::timer::ElectionTimer;
use crate::types::{NodeId, Role};

/// State shared by all the behaviors of a node, owned by its actor.
///
/// The role, term and vote are private: every change goes through one of the
/// transition methods below, which persist before they touch the in-memory copy.
pub struct CommonState<S, L, O> {
    config: ElectionConfig,
    role: Role,
    current_term: u64,
    voted_for: Option<NodeId>,
    leader_id: Option<NodeId>,
    stale_rejections: u64,
    pub(crate) election_timer: ElectionTimer,
    store: S,
    log: L,
    observer: O,
}

impl<S, L, O> CommonState<S, L, O>
where
    S: StateStore,
    L: LogInspector,
    O: RoleObserver,
{
    /// Every node starts as a follower, from whatever term and vote were persisted
    pub fn new(config: ElectionConfig, hard_state: HardState, store: S, log: L, observer: O) -> Self {
        let election_timer = ElectionTimer::new(config.election_timeout.clone());
        Self {
            config,
            role: Role::Follower,
            current_term: hard_state.current_term,
            voted_for: hard_state.voted_for,
            leader_id: None,
            stale_rejections: 0,
            election_timer,
            store,
            log,
            observer,
        }
    }

    /// Validates the configuration and loads the persisted term and vote
    pub async fn recover(config: ElectionConfig, store: S, log: L, observer: O) -> Result<Self, ElectionError> {
        config.validate()?;
        let hard_state = store.load().await?;
        tracing::info!(
            term = hard_state.current_term,
            voted_for = ?hard_state.voted_for,
            "recovered persistent state"
        );
        Ok(Self::new(config, hard_state, store, log, observer))
    }

    pub fn me(&self) -> NodeId {
        self.config.node_id
    }

    pub fn config(&self) -> &ElectionConfig {
        &self.config
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn current_term(&self) -> u64 {
        self.current_term
    }

    pub fn voted_for(&self) -> Option<NodeId> {
        self.voted_for
    }

    pub fn leader_id(&self) -> Option<NodeId> {
        self.leader_id
    }

    pub fn last_log_position(&self) -> LogPosition {
        self.log.last_log_position()
    }

    pub fn hard_state(&self) -> HardState {
        HardState {
            current_term: self.current_term,
            voted_for: self.voted_for,
        }
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            id: self.me(),
            role: self.role,
            term: self.current_term,
            voted_for: self.voted_for,
            leader_id: self.leader_id,
            stale_rejections: self.stale_rejections,
        }
    }

    pub fn note_stale_rejection(&mut self) {
        self.stale_rejections += 1;
    }

    /// Makes `next` durable, then adopts it. Nothing changes in memory if the store fails.
    async fn persist(&mut self, next: HardState) -> Result<(), ElectionError> {
        assert!(
            next.current_term >= self.current_term,
            "term must never decrease: {} -> {}",
            self.current_term,
            next.current_term
        );

        if next == self.hard_state() {
            return Ok(());
        }

        self.store.save(&next).await?;
        self.current_term = next.current_term;
        self.voted_for = next.voted_for;
        Ok(())
    }

    /// Adopts `term` if it is greater than ours, stepping down to follower with a cleared vote.
    ///
    /// Returns `true` if the term changed.
    pub async fn observe_term(&mut self, term: u64) -> Result<bool, ElectionError> {
        if term <= self.current_term {
            return Ok(false);
        }

        self.persist(HardState {
            current_term: term,
            voted_for: None,
        })
        .await?;

        if self.role != Role::Follower {
            tracing::info!("transition: {} → follower, term {}", self.role, term);
        } else {
            tracing::debug!("new term: {}", term);
        }
        self.role = Role::Follower;
        self.leader_id = None;
        self.election_timer.reset();
        self.observer.on_become_follower(term);
        Ok(true)
    }

    /// Starts a new election: next term, vote for self, fresh timer.
    /// Called both by followers and by candidates whose election timed out.
    pub async fn become_candidate(&mut self) -> Result<(), ElectionError> {
        assert_ne!(self.role, Role::Leader, "a leader never starts an election");

        let next_term = self
            .current_term
            .checked_add(1)
            .ok_or(ElectionError::TermExhausted(self.current_term))?;
        self.persist(HardState {
            current_term: next_term,
            voted_for: Some(self.me()),
        })
        .await?;

        tracing::info!("transition: {} → candidate, term {}", self.role, self.current_term);
        self.role = Role::Candidate;
        self.leader_id = None;
        self.election_timer.reset();
        Ok(())
    }

    pub fn become_leader(&mut self) {
        assert_eq!(self.role, Role::Candidate, "only candidates can win an election");

        tracing::info!("transition: candidate → leader, term {}", self.current_term);
        self.role = Role::Leader;
        self.leader_id = Some(self.me());
        self.observer.on_become_leader(self.current_term);
    }

    /// Becomes follower in the current term, `leader_id` is the leader we heard from, if any
    pub fn become_follower(&mut self, leader_id: Option<NodeId>) {
        let previous = self.role;
        self.role = Role::Follower;
        self.leader_id = leader_id;
        self.election_timer.reset();

        if previous != Role::Follower {
            tracing::info!("transition: {} → follower, term {}", previous, self.current_term);
            self.observer.on_become_follower(self.current_term);
        }
    }

    /// Records a vote for `candidate_id` in the current term
    pub async fn grant_vote(&mut self, candidate_id: NodeId) -> Result<(), ElectionError> {
        assert!(
            self.voted_for.is_none() || self.voted_for == Some(candidate_id),
            "already voted for {:?} in term {}",
            self.voted_for,
            self.current_term
        );

        self.persist(HardState {
            current_term: self.current_term,
            voted_for: Some(candidate_id),
        })
        .await?;
        self.election_timer.reset();
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn check_validity(&self) {
        match self.role {
            Role::Follower => assert_ne!(self.leader_id, Some(self.me())),
            Role::Candidate => {
                assert_eq!(self.voted_for, Some(self.me()));
                assert_eq!(self.leader_id, None);
            }
            Role::Leader => {
                assert_eq!(self.voted_for, Some(self.me()));
                assert_eq!(self.leader_id, Some(self.me()));
            }
        }
    }
}

impl<S, L, O> Debug for CommonState<S, L, O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CommonState")
            .field("me", &self.config.node_id)
            .field("role", &self.role)
            .field("current_term", &self.current_term)
            .field("voted_for", &self.voted_for)
            .field("leader_id", &self.leader_id)
            .finish_non_exhaustive()
    }
}
