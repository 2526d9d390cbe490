//! Dash ability state machine.
//!
//! `Available -> OnCooldown{performing} -> OnCooldown -> Available`. Only a
//! trigger while `Available` is accepted. Every scheduled continuation carries
//! the generation it was issued for and is discarded if the participant's
//! generation has moved on or the participant is gone.

use crate::timer::TimerQueue;
use arena_shared::ParticipantId;
use log::{debug, trace};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashPhase {
    Available,
    OnCooldown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbilityState {
    pub phase: DashPhase,
    /// True only during the damage-dealing start of the cooldown
    pub performing: bool,
    pub generation: u64,
}

impl AbilityState {
    fn new() -> Self {
        Self {
            phase: DashPhase::Available,
            performing: false,
            generation: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashOutcome {
    Accepted,
    Rejected(DashRejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashRejection {
    OnCooldown,
    UnknownParticipant,
}

/// A committed dash transition, ready to be replicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashChange {
    pub id: ParticipantId,
    pub performing: bool,
    pub on_cooldown: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DashTimerKind {
    PerformingEnd,
    CooldownEnd,
}

#[derive(Debug)]
struct DashTimer {
    participant: ParticipantId,
    generation: u64,
    kind: DashTimerKind,
}

/// Dash state for every live participant plus the queue of pending
/// performing-end and cooldown-end continuations.
pub struct AbilityTimers {
    states: HashMap<ParticipantId, AbilityState>,
    timers: TimerQueue<DashTimer>,
    performing_ms: u64,
    cooldown_ms: u64,
}

impl AbilityTimers {
    /// Both durations are measured from the trigger.
    pub fn new(performing_ms: u64, cooldown_ms: u64) -> Self {
        Self {
            states: HashMap::new(),
            timers: TimerQueue::new(),
            performing_ms,
            cooldown_ms,
        }
    }

    /// Starts tracking `id` as `Available` at generation 0.
    pub fn register(&mut self, id: ParticipantId) {
        self.states.insert(id, AbilityState::new());
    }

    /// Starts a dash if `id` is `Available`. A trigger during the cooldown is
    /// rejected and leaves the running timers untouched.
    pub fn trigger(&mut self, id: ParticipantId, now: u64) -> DashOutcome {
        let Some(state) = self.states.get_mut(&id) else {
            return DashOutcome::Rejected(DashRejection::UnknownParticipant);
        };

        if state.phase == DashPhase::OnCooldown {
            trace!("Dash from participant {} ignored, on cooldown", id);
            return DashOutcome::Rejected(DashRejection::OnCooldown);
        }

        state.generation += 1;
        state.phase = DashPhase::OnCooldown;
        state.performing = true;

        let generation = state.generation;
        self.timers.schedule(
            now + self.performing_ms,
            DashTimer {
                participant: id,
                generation,
                kind: DashTimerKind::PerformingEnd,
            },
        );
        self.timers.schedule(
            now + self.cooldown_ms,
            DashTimer {
                participant: id,
                generation,
                kind: DashTimerKind::CooldownEnd,
            },
        );

        debug!("Participant {} dashed (generation {})", id, generation);
        DashOutcome::Accepted
    }

    /// Forgets the participant and purges its pending callbacks.
    ///
    /// Any callback that still fires for a released id finds no state and is
    /// discarded in [`AbilityTimers::tick`].
    pub fn release(&mut self, id: ParticipantId) {
        if self.states.remove(&id).is_some() {
            debug!("Dash state of participant {} released", id);
        }
        self.timers.retain(|timer| timer.participant != id);
    }

    /// None once the participant is released.
    pub fn state(&self, id: ParticipantId) -> Option<&AbilityState> {
        self.states.get(&id)
    }

    /// False for unknown ids.
    pub fn is_performing(&self, id: ParticipantId) -> bool {
        self.states.get(&id).is_some_and(|state| state.performing)
    }

    /// Scheduled continuations, stale ones included.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Fires every due continuation and returns the transitions that committed.
    pub fn tick(&mut self, now: u64) -> Vec<DashChange> {
        let mut changes = Vec::new();

        for timer in self.timers.drain_due(now) {
            let state = match self.states.get_mut(&timer.participant) {
                Some(state) if state.generation == timer.generation => state,
                _ => {
                    trace!(
                        "Discarded stale {:?} for participant {} (generation {})",
                        timer.kind,
                        timer.participant,
                        timer.generation
                    );
                    continue;
                }
            };

            match timer.kind {
                DashTimerKind::PerformingEnd => state.performing = false,
                DashTimerKind::CooldownEnd => {
                    state.performing = false;
                    state.phase = DashPhase::Available;
                }
            }

            changes.push(DashChange {
                id: timer.participant,
                performing: state.performing,
                on_cooldown: state.phase == DashPhase::OnCooldown,
            });
        }

        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timers() -> AbilityTimers {
        let mut timers = AbilityTimers::new(400, 1500);
        timers.register(1);
        timers
    }

    #[test]
    fn test_new_participant_available() {
        let timers = timers();
        let state = timers.state(1).unwrap();
        assert_eq!(state.phase, DashPhase::Available);
        assert!(!state.performing);
        assert_eq!(state.generation, 0);
    }

    #[test]
    fn test_trigger_accepted() {
        let mut timers = timers();

        assert_eq!(timers.trigger(1, 0), DashOutcome::Accepted);

        let state = timers.state(1).unwrap();
        assert_eq!(state.phase, DashPhase::OnCooldown);
        assert!(state.performing);
        assert_eq!(state.generation, 1);
        assert_eq!(timers.pending_timers(), 2);
    }

    #[test]
    fn test_trigger_unknown_participant() {
        let mut timers = timers();
        assert_eq!(
            timers.trigger(99, 0),
            DashOutcome::Rejected(DashRejection::UnknownParticipant)
        );
    }

    #[test]
    fn test_full_cycle() {
        let mut timers = timers();
        timers.trigger(1, 1000);

        assert!(timers.tick(1399).is_empty());
        assert!(timers.is_performing(1));

        assert_eq!(
            timers.tick(1400),
            vec![DashChange {
                id: 1,
                performing: false,
                on_cooldown: true
            }]
        );
        assert!(!timers.is_performing(1));
        assert_eq!(timers.trigger(1, 1400), DashOutcome::Rejected(DashRejection::OnCooldown));

        assert_eq!(
            timers.tick(2500),
            vec![DashChange {
                id: 1,
                performing: false,
                on_cooldown: false
            }]
        );
        assert_eq!(timers.state(1).unwrap().phase, DashPhase::Available);
        assert_eq!(timers.trigger(1, 2500), DashOutcome::Accepted);
    }

    #[test]
    fn test_retrigger_on_cooldown_does_not_extend() {
        let mut timers = timers();
        timers.trigger(1, 0);

        for now in [100, 500, 1000, 1400] {
            assert_eq!(
                timers.trigger(1, now),
                DashOutcome::Rejected(DashRejection::OnCooldown)
            );
        }
        assert_eq!(timers.state(1).unwrap().generation, 1);
        assert_eq!(timers.pending_timers(), 2);

        timers.tick(1500);
        assert_eq!(timers.state(1).unwrap().phase, DashPhase::Available);
    }

    #[test]
    fn test_late_tick_fires_both_in_order() {
        let mut timers = timers();
        timers.trigger(1, 0);

        let changes = timers.tick(5000);
        assert_eq!(changes.len(), 2);
        assert!(changes[0].on_cooldown);
        assert!(!changes[1].on_cooldown);
    }

    #[test]
    fn test_release_mid_cooldown_discards_timers() {
        let mut timers = timers();
        timers.trigger(1, 0);

        timers.release(1);

        assert_eq!(timers.pending_timers(), 0);
        assert!(timers.state(1).is_none());
        assert!(timers.tick(10_000).is_empty());
    }

    #[test]
    fn test_release_then_register_starts_fresh() {
        let mut timers = timers();
        timers.trigger(1, 0);
        timers.release(1);

        timers.register(1);

        let state = timers.state(1).unwrap();
        assert_eq!(state.phase, DashPhase::Available);
        assert_eq!(state.generation, 0);
        assert_eq!(timers.pending_timers(), 0);
        assert!(timers.tick(10_000).is_empty());
        assert_eq!(timers.trigger(1, 10_000), DashOutcome::Accepted);
    }

    #[test]
    fn test_stale_generation_discarded() {
        let mut timers = timers();
        timers.trigger(1, 0);
        timers.tick(1500);

        // Re-register under the same id: a fresh state restarts at generation 0
        timers.register(1);
        timers.timers.schedule(
            1600,
            DashTimer {
                participant: 1,
                generation: 1,
                kind: DashTimerKind::CooldownEnd,
            },
        );

        assert!(timers.tick(1600).is_empty());
        assert_eq!(timers.state(1).unwrap().phase, DashPhase::Available);
    }

    #[test]
    fn test_participants_independent() {
        let mut timers = timers();
        timers.register(2);

        timers.trigger(1, 0);
        timers.trigger(2, 200);
        timers.release(1);

        let changes = timers.tick(600);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].id, 2);
        assert!(!timers.is_performing(2));
    }
}
