//! Round lifecycle: `Active -> Ended -> Active`, forever.
//!
//! Hits only score while the round is active. The hit that reaches the win
//! score ends the round and despawns every agent; connections stay registered
//! and get fresh agents when the restart delay has elapsed.

use crate::broadcast::ReplicationBroadcaster;
use crate::invincibility::Reason;
use crate::registry::ConnectionRegistry;
use arena_shared::{Delta, ParticipantId, ParticipantInfo, RoundInfo, RoundPhase};
use log::{error, info};

#[derive(Debug, Clone, PartialEq)]
pub enum HitOutcome {
    Scored {
        attacker: ParticipantId,
        new_score: u32,
    },
    RoundWon {
        winner: ParticipantInfo,
    },
    Rejected(HitRejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitRejection {
    RoundEnded,
    SelfContact,
    UnknownParticipant,
    AttackerNotPerforming,
    VictimInvincible,
}

/// Scores hits and drives `Active -> Ended -> Active`.
///
/// While `Ended` every hit is rejected. The next round starts on the first
/// tick at least `restart_delay_ms` after the win.
pub struct RoundStateMachine {
    phase: RoundPhase,
    ended_at: u64,
    winner: Option<ParticipantInfo>,
    win_score: u32,
    restart_delay_ms: u64,
    invincibility_ms: u64,
}

impl RoundStateMachine {
    /// Starts in the `Active` phase.
    pub fn new(win_score: u32, restart_delay_ms: u64, invincibility_ms: u64) -> Self {
        Self {
            phase: RoundPhase::Active,
            ended_at: 0,
            winner: None,
            win_score,
            restart_delay_ms,
            invincibility_ms,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Winner of the last round, kept until the next one starts.
    pub fn winner(&self) -> Option<&ParticipantInfo> {
        self.winner.as_ref()
    }

    /// Time of the win while the round is over.
    pub fn ended_at(&self) -> Option<u64> {
        (self.phase == RoundPhase::Ended).then_some(self.ended_at)
    }

    /// Observer view of the round as of `now`.
    pub fn info(&self, now: u64) -> RoundInfo {
        let restart_in_ms = match self.phase {
            RoundPhase::Active => 0,
            RoundPhase::Ended => (self.ended_at + self.restart_delay_ms).saturating_sub(now),
        };
        RoundInfo {
            phase: self.phase,
            winner: self.winner.clone(),
            restart_in_ms,
        }
    }

    /// Resolves one directed hit reported by the collision hook.
    pub fn on_hit(
        &mut self,
        attacker: ParticipantId,
        victim: ParticipantId,
        now: u64,
        registry: &mut ConnectionRegistry,
        out: &mut ReplicationBroadcaster,
    ) -> HitOutcome {
        if let Some(rejection) = self.validate_hit(attacker, victim, registry) {
            return HitOutcome::Rejected(rejection);
        }

        let Some(agent) = registry.agent_by_id_mut(attacker) else {
            return HitOutcome::Rejected(HitRejection::UnknownParticipant);
        };
        let new_score = agent.award_point();

        if new_score >= self.win_score {
            let winner = agent.info();
            self.end_round(winner.clone(), now, registry, out);
            return HitOutcome::RoundWon { winner };
        }

        out.commit(Delta::ScoreChanged {
            id: attacker,
            new_score,
        });
        if let Some(change) =
            registry
                .shields_mut()
                .add(victim, Reason::POST_HIT, self.invincibility_ms, now)
        {
            out.commit(Delta::InvincibilityChanged {
                id: change.id,
                is_invincible: change.is_invincible,
            });
        }

        info!(
            "Participant {} hit participant {} (score {})",
            attacker, victim, new_score
        );
        HitOutcome::Scored {
            attacker,
            new_score,
        }
    }

    fn validate_hit(
        &self,
        attacker: ParticipantId,
        victim: ParticipantId,
        registry: &ConnectionRegistry,
    ) -> Option<HitRejection> {
        if self.phase == RoundPhase::Ended {
            return Some(HitRejection::RoundEnded);
        }
        if attacker == victim {
            return Some(HitRejection::SelfContact);
        }
        if registry.agent_by_id(attacker).is_none() || registry.agent_by_id(victim).is_none() {
            return Some(HitRejection::UnknownParticipant);
        }
        if !registry.abilities().is_performing(attacker) {
            return Some(HitRejection::AttackerNotPerforming);
        }
        if registry.shields().is_invincible(victim) {
            return Some(HitRejection::VictimInvincible);
        }
        None
    }

    fn end_round(
        &mut self,
        winner: ParticipantInfo,
        now: u64,
        registry: &mut ConnectionRegistry,
        out: &mut ReplicationBroadcaster,
    ) {
        self.phase = RoundPhase::Ended;
        self.ended_at = now;

        info!(
            "Round won by '{}' with {} points, next round in {}ms",
            winner.display_name, winner.score, self.restart_delay_ms
        );
        out.commit(Delta::RoundEnded {
            winner_id: winner.id,
            winner_name: winner.display_name.clone(),
            winner_score: winner.score,
            winner_color: winner.team_color,
            restart_delay_ms: self.restart_delay_ms,
        });
        self.winner = Some(winner);

        for connection in registry.connections() {
            registry.despawn(connection, out);
        }
    }

    /// Restart check, run once per tick. Returns true when a new round began.
    pub fn tick(
        &mut self,
        now: u64,
        registry: &mut ConnectionRegistry,
        out: &mut ReplicationBroadcaster,
    ) -> bool {
        if self.phase != RoundPhase::Ended {
            return false;
        }
        if now.saturating_sub(self.ended_at) < self.restart_delay_ms {
            return false;
        }

        self.phase = RoundPhase::Active;
        self.winner = None;
        registry.spawns_mut().release_all();

        for connection in registry.connections() {
            if let Err(e) = registry.replace(connection, out) {
                error!("Connection {} sits out this round: {}", connection, e);
            }
        }
        out.commit(Delta::RoundStarted);

        info!(
            "New round started with {} participants",
            registry.participant_count()
        );
        true
    }
}
