// src/monitor/dedup.rs
//! Round-based deduplication of polled events.
//!
//! Overlapping windows re-fetch the same messages on consecutive ticks. An
//! event is "new" when its id was not observed in the remembered rounds;
//! every fetched id is recorded for the current round whether new or not.
//!
//! Only identifiers are kept, never payloads, so memory stays at
//! O(horizon x events per window). With the default horizon of one round an
//! event that drops out of a single window (scheduling slip) and then shows
//! up again is delivered as new a second time. Widen the horizon to cover
//! the whole overlap window if that matters to the caller.

use std::collections::{HashSet, VecDeque};
use std::num::NonZeroUsize;

use super::types::{Event, EventId};

/// Classify `events` against the ids of the previous round.
///
/// Returns the new events (in fetch order) and the id set for this round.
/// Pure: the same inputs always give the same output.
pub fn filter_round<'a>(
    events: &'a [Event],
    seen_last_round: &HashSet<EventId>,
) -> (Vec<&'a Event>, HashSet<EventId>) {
    let mut fresh = Vec::new();
    let mut seen_this_round = HashSet::with_capacity(events.len());
    for ev in events {
        if !seen_last_round.contains(&ev.id) {
            fresh.push(ev);
        }
        seen_this_round.insert(ev.id.clone());
    }
    (fresh, seen_this_round)
}

/// Rolling memory of the last `horizon` rounds of seen ids.
#[derive(Debug, Clone)]
pub struct SeenHistory {
    horizon: NonZeroUsize,
    rounds: VecDeque<HashSet<EventId>>,
}

impl Default for SeenHistory {
    fn default() -> Self {
        Self::single_round()
    }
}

impl SeenHistory {
    /// Rounds are allocated as they are observed, so any horizon is cheap
    /// until it fills up.
    pub fn new(horizon: NonZeroUsize) -> Self {
        Self {
            horizon,
            rounds: VecDeque::new(),
        }
    }

    /// Remember exactly the previous round ("last round" / "this round").
    pub fn single_round() -> Self {
        Self::new(NonZeroUsize::MIN)
    }

    pub fn horizon(&self) -> usize {
        self.horizon.get()
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.rounds.iter().any(|round| round.contains(id))
    }

    /// Number of ids currently remembered across all rounds.
    pub fn remembered(&self) -> usize {
        self.rounds.iter().map(HashSet::len).sum()
    }

    /// Record one round and return the indices of the events that are new.
    pub fn observe(&mut self, events: &[Event]) -> Vec<usize> {
        let mut fresh = Vec::new();
        let mut this_round = HashSet::with_capacity(events.len());
        for (i, ev) in events.iter().enumerate() {
            if !self.contains(&ev.id) {
                fresh.push(i);
            }
            this_round.insert(ev.id.clone());
        }

        self.rounds.push_back(this_round);
        while self.rounds.len() > self.horizon.get() {
            self.rounds.pop_front();
        }
        fresh
    }
}
