//! Per-participant invincibility, held for as long as any reason is active.
//!
//! Each reason has at most one live expiry. An expiry only removes the exact
//! grant it was scheduled for: a reason removed early, or removed and granted
//! again, leaves the old expiry stale.

use crate::timer::TimerQueue;
use arena_shared::ParticipantId;
use log::trace;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reason(Cow<'static, str>);

impl Reason {
    pub const POST_HIT: Reason = Reason(Cow::Borrowed("post-hit"));

    pub fn new(tag: impl Into<String>) -> Self {
        Self(Cow::Owned(tag.into()))
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvincibilityChange {
    pub id: ParticipantId,
    pub is_invincible: bool,
}

#[derive(Default)]
struct InvincibilitySet {
    // reason -> generation of its current grant
    active: HashMap<Reason, u64>,
    next_generation: u64,
}

struct Expiry {
    participant: ParticipantId,
    reason: Reason,
    generation: u64,
}

#[derive(Default)]
pub struct InvincibilityTracker {
    sets: HashMap<ParticipantId, InvincibilitySet>,
    timers: TimerQueue<Expiry>,
}

impl InvincibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: ParticipantId) {
        self.sets.insert(id, InvincibilitySet::default());
    }

    /// Grants `reason` until `now + duration_ms`. Granting an active reason
    /// restarts its countdown without adding a second entry or expiry.
    /// Returns a change only when the participant becomes invincible.
    pub fn add(
        &mut self,
        id: ParticipantId,
        reason: Reason,
        duration_ms: u64,
        now: u64,
    ) -> Option<InvincibilityChange> {
        let set = self.sets.get_mut(&id)?;
        let was_invincible = !set.active.is_empty();

        let generation = set.next_generation;
        set.next_generation += 1;

        if set.active.insert(reason.clone(), generation).is_some() {
            self.timers
                .retain(|expiry| !(expiry.participant == id && expiry.reason == reason));
        }
        self.timers.schedule(
            now + duration_ms,
            Expiry {
                participant: id,
                reason,
                generation,
            },
        );

        (!was_invincible).then_some(InvincibilityChange {
            id,
            is_invincible: true,
        })
    }

    /// Withdraws `reason` and cancels its pending expiry. Returns a change only
    /// when the participant becomes vulnerable.
    pub fn remove(&mut self, id: ParticipantId, reason: &Reason) -> Option<InvincibilityChange> {
        let set = self.sets.get_mut(&id)?;
        set.active.remove(reason)?;

        self.timers
            .retain(|expiry| !(expiry.participant == id && &expiry.reason == reason));

        set.active.is_empty().then_some(InvincibilityChange {
            id,
            is_invincible: false,
        })
    }

    /// Forgets the participant. Pending expiries are dropped without firing.
    pub fn release(&mut self, id: ParticipantId) {
        self.sets.remove(&id);
        self.timers.retain(|expiry| expiry.participant != id);
    }

    pub fn is_invincible(&self, id: ParticipantId) -> bool {
        self.sets.get(&id).is_some_and(|set| !set.active.is_empty())
    }

    pub fn has_reason(&self, id: ParticipantId, reason: &Reason) -> bool {
        self.sets
            .get(&id)
            .is_some_and(|set| set.active.contains_key(reason))
    }

    pub fn active_reasons(&self, id: ParticipantId) -> usize {
        self.sets.get(&id).map_or(0, |set| set.active.len())
    }

    pub fn pending_expiries(&self) -> usize {
        self.timers.len()
    }

    pub fn tick(&mut self, now: u64) -> Vec<InvincibilityChange> {
        let mut changes = Vec::new();

        for expiry in self.timers.drain_due(now) {
            let current = self
                .sets
                .get(&expiry.participant)
                .and_then(|set| set.active.get(&expiry.reason).copied());

            if current != Some(expiry.generation) {
                trace!(
                    "Discarded stale '{}' expiry for participant {}",
                    expiry.reason,
                    expiry.participant
                );
                continue;
            }

            if let Some(change) = self.remove(expiry.participant, &expiry.reason) {
                changes.push(change);
            }
        }

        changes
    }
}
