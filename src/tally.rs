use std::collections::{BTreeMap, BTreeSet};

use crate::types::NodeId;

/// Votes needed to win an election, the candidate's own vote included
pub fn majority(cluster_size: usize) -> usize {
    cluster_size / 2 + 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyOutcome {
    /// a majority might still be reached
    Pending,
    Won,
    /// not enough voters left to reach a majority, wait for the next election
    Lost,
}

/// Votes collected by one candidacy, thrown away when the candidacy ends
#[derive(Debug)]
pub struct VoteTally {
    term: u64,
    cluster_size: usize,
    granted: BTreeSet<NodeId>,
    refused: BTreeSet<NodeId>,
    unreachable: BTreeSet<NodeId>,
    higher_terms: BTreeMap<NodeId, u64>,
}

impl VoteTally {
    /// Starts a tally for `term` that already counts the candidate's vote for itself
    pub fn new(term: u64, me: NodeId, cluster_size: usize) -> Self {
        Self {
            term,
            cluster_size,
            granted: BTreeSet::from([me]),
            refused: BTreeSet::new(),
            unreachable: BTreeSet::new(),
            higher_terms: BTreeMap::new(),
        }
    }

    pub fn term(&self) -> u64 {
        self.term
    }

    pub fn granted(&self) -> usize {
        self.granted.len()
    }

    pub fn higher_terms(&self) -> &BTreeMap<NodeId, u64> {
        &self.higher_terms
    }

    fn has_answered(&self, from: NodeId) -> bool {
        self.granted.contains(&from) || self.refused.contains(&from)
    }

    pub fn record_vote(&mut self, from: NodeId, vote_granted: bool) -> TallyOutcome {
        if self.has_answered(from) {
            tracing::warn!("node {} voted twice in term {}, ignoring", from, self.term);
            return self.outcome();
        }

        self.unreachable.remove(&from);
        if vote_granted {
            self.granted.insert(from);
        } else {
            self.refused.insert(from);
        }
        self.outcome()
    }

    /// A peer that could not be reached is an implicit refusal for this term
    pub fn record_failure(&mut self, from: NodeId) -> TallyOutcome {
        if !self.has_answered(from) {
            self.unreachable.insert(from);
        }
        self.outcome()
    }

    pub fn record_higher_term(&mut self, from: NodeId, term: u64) {
        self.higher_terms.insert(from, term);
    }

    pub fn outcome(&self) -> TallyOutcome {
        let needed = majority(self.cluster_size);
        let lost = self.refused.len() + self.unreachable.len();
        if self.granted.len() >= needed {
            TallyOutcome::Won
        } else if self.cluster_size - lost < needed {
            TallyOutcome::Lost
        } else {
            TallyOutcome::Pending
        }
    }
}
