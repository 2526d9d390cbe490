//! The arena authority: the only place match state is mutated.
//!
//! Every external event (connect, disconnect, dash, move, contact) and the
//! periodic tick are funnelled through one `Arena` value, so no two mutations
//! ever overlap. Time is logical: each tick advances the clock by the
//! configured interval, and every timer fires on the first tick at or after
//! its deadline.

use crate::ability::{AbilityTimers, DashChange, DashOutcome, DashRejection};
use crate::broadcast::{Committed, ReplicationBroadcaster};
use crate::config::ArenaConfig;
use crate::error::{ConfigError, Result};
use crate::invincibility::InvincibilityChange;
use crate::motion::{MotionBuffer, Mover};
use crate::registry::ConnectionRegistry;
use crate::round::{HitOutcome, RoundStateMachine};
use crate::spawn::SpawnAllocator;
use arena_shared::{ConnectionId, Delta, ParticipantId, ParticipantInfo, RoundInfo, Vec3};
use log::{debug, info};

/// Inputs the authority reacts to, as delivered by the transport.
#[derive(Debug, Clone)]
pub enum ArenaEvent {
    Connect {
        connection: ConnectionId,
        display_name: Option<String>,
    },
    Disconnect {
        connection: ConnectionId,
    },
    Dash {
        connection: ConnectionId,
        direction: Vec3,
    },
    Move {
        connection: ConnectionId,
        direction: Vec3,
    },
    Contact {
        a: ParticipantId,
        b: ParticipantId,
    },
    Tick,
}

/// Full picture of the arena for a (re)joining observer.
#[derive(Debug, Clone, PartialEq)]
pub struct ArenaSnapshot {
    pub roster: Vec<ParticipantInfo>,
    pub round: RoundInfo,
    /// Deltas up to and including this sequence are already reflected
    pub as_of_seq: u64,
}

/// The single owner of all match state.
///
/// Every connect, input, contact and tick goes through one `Arena`, and each
/// committed change lands in its outbox in commit order. Motion is handed to
/// the injected [`Mover`].
pub struct Arena<M: Mover = MotionBuffer> {
    config: ArenaConfig,
    now_ms: u64,
    ticks: u64,
    registry: ConnectionRegistry,
    round: RoundStateMachine,
    broadcaster: ReplicationBroadcaster,
    mover: M,
}

impl<M: Mover> Arena<M> {
    /// Validates `config` and builds an empty arena at time zero.
    pub fn new(config: ArenaConfig, mover: M) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let spawns = SpawnAllocator::new(config.spawn_points.clone());
        Ok(Self::build(config, spawns, mover))
    }

    /// Same as [`Arena::new`] with a fixed spawn draw sequence.
    pub fn with_seed(
        config: ArenaConfig,
        mover: M,
        seed: u64,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let spawns = SpawnAllocator::with_seed(config.spawn_points.clone(), seed);
        Ok(Self::build(config, spawns, mover))
    }

    fn build(config: ArenaConfig, spawns: SpawnAllocator, mover: M) -> Self {
        let abilities = AbilityTimers::new(config.dash_performing_ms, config.dash_cooldown_ms);
        let round = RoundStateMachine::new(
            config.win_score,
            config.restart_delay_ms,
            config.invincibility_ms,
        );

        info!(
            "Arena ready: {} spawn points, win score {}, {}ms ticks",
            config.spawn_points.len(),
            config.win_score,
            config.tick_interval_ms
        );

        Self {
            config,
            now_ms: 0,
            ticks: 0,
            registry: ConnectionRegistry::new(spawns, abilities),
            round,
            broadcaster: ReplicationBroadcaster::new(),
            mover,
        }
    }

    /// Applies one event. Outcomes are dropped; call the matching method
    /// directly when the result matters.
    pub fn handle(&mut self, event: ArenaEvent) {
        match event {
            ArenaEvent::Connect {
                connection,
                display_name,
            } => {
                // Failures are logged by the registry
                let _ = self.connect(connection, display_name.as_deref());
            }
            ArenaEvent::Disconnect { connection } => {
                self.disconnect(connection);
            }
            ArenaEvent::Dash {
                connection,
                direction,
            } => {
                self.request_dash(connection, direction);
            }
            ArenaEvent::Move {
                connection,
                direction,
            } => {
                self.move_intent(connection, direction);
            }
            ArenaEvent::Contact { a, b } => {
                self.contact(a, b);
            }
            ArenaEvent::Tick => self.tick(),
        }
    }

    /// Spawns a participant for a new connection. Joining while the round is
    /// over still spawns, so the newcomer can watch the result; hits are
    /// rejected until the next round anyway.
    pub fn connect(
        &mut self,
        connection: ConnectionId,
        display_name: Option<&str>,
    ) -> Result<ParticipantInfo> {
        self.registry
            .on_connect(connection, display_name, &mut self.broadcaster)
    }

    /// Removes the connection and its agent. Returns the agent that left.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Option<ParticipantInfo> {
        self.registry.on_disconnect(connection, &mut self.broadcaster)
    }

    /// Triggers the connection's dash and pushes its agent along `direction`
    /// with `dash_power`.
    pub fn request_dash(&mut self, connection: ConnectionId, direction: Vec3) -> DashOutcome {
        let Some(id) = self.registry.agent(connection).map(|agent| agent.id) else {
            return DashOutcome::Rejected(DashRejection::UnknownParticipant);
        };

        let outcome = self.registry.abilities_mut().trigger(id, self.now_ms);
        if outcome == DashOutcome::Accepted {
            self.broadcaster.commit(Delta::DashStateChanged {
                id,
                performing: true,
                on_cooldown: true,
            });
            self.mover
                .apply_impulse(id, direction.normalized(), self.config.dash_power);
        }
        outcome
    }

    /// Turns the agent towards `direction` and pushes it along. Ignored while
    /// the agent is mid-dash or for a zero direction.
    pub fn move_intent(&mut self, connection: ConnectionId, direction: Vec3) -> bool {
        let Some(id) = self.registry.agent(connection).map(|agent| agent.id) else {
            return false;
        };
        if self.registry.abilities().is_performing(id) {
            return false;
        }

        let direction = direction.normalized();
        if direction == Vec3::ZERO {
            return false;
        }

        self.mover.apply_rotation(
            id,
            Vec3::new(0.0, direction.yaw_degrees(), 0.0),
            self.config.rotation_speed,
        );
        self.mover.apply_impulse(id, direction, self.config.moving_speed);
        true
    }

    /// Resolves an unordered contact pair as two directed hits, `a` on `b`
    /// first.
    pub fn contact(&mut self, a: ParticipantId, b: ParticipantId) -> [HitOutcome; 2] {
        let forward = self.hit(a, b);
        let backward = self.hit(b, a);
        [forward, backward]
    }

    /// One directed hit. See [`RoundStateMachine::on_hit`] for the rules.
    pub fn hit(&mut self, attacker: ParticipantId, victim: ParticipantId) -> HitOutcome {
        self.round.on_hit(
            attacker,
            victim,
            self.now_ms,
            &mut self.registry,
            &mut self.broadcaster,
        )
    }

    /// Advances the clock one interval, then fires dash timers, invincibility
    /// expiries and the restart check, in that order.
    pub fn tick(&mut self) {
        self.now_ms += self.config.tick_interval_ms;
        self.ticks += 1;
        let now = self.now_ms;

        for DashChange {
            id,
            performing,
            on_cooldown,
        } in self.registry.abilities_mut().tick(now)
        {
            self.broadcaster.commit(Delta::DashStateChanged {
                id,
                performing,
                on_cooldown,
            });
        }

        for InvincibilityChange { id, is_invincible } in self.registry.shields_mut().tick(now) {
            self.broadcaster.commit(Delta::InvincibilityChanged { id, is_invincible });
        }

        self.round.tick(now, &mut self.registry, &mut self.broadcaster);

        if self.ticks % 60 == 0 && self.registry.connection_count() > 0 {
            debug!(
                "Tick {} ({}ms): {} connections, {} participants, round {:?}",
                self.ticks,
                now,
                self.registry.connection_count(),
                self.registry.participant_count(),
                self.round.phase()
            );
        }
    }

    /// Roster and round as of the last committed delta.
    pub fn snapshot(&self) -> ArenaSnapshot {
        ArenaSnapshot {
            roster: self.registry.roster(),
            round: self.round.info(self.now_ms),
            as_of_seq: self.broadcaster.last_seq(),
        }
    }

    /// Takes everything committed since the last drain, oldest first.
    pub fn drain_deltas(&mut self) -> Vec<Committed> {
        self.broadcaster.drain()
    }

    /// Observer view of the connection's current agent.
    pub fn participant(&self, connection: ConnectionId) -> Option<ParticipantInfo> {
        self.registry.agent(connection).map(|agent| agent.info())
    }

    pub fn is_invincible(&self, id: ParticipantId) -> bool {
        self.registry.shields().is_invincible(id)
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn round(&self) -> &RoundStateMachine {
        &self.round
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Logical time: `tick_interval_ms` per tick since start.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn mover(&self) -> &M {
        &self.mover
    }

    /// The transport drains recorded motion through this.
    pub fn mover_mut(&mut self) -> &mut M {
        &mut self.mover
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::DashPhase;
    use arena_shared::{MotionCommand, RoundPhase};
    use assert_approx_eq::assert_approx_eq;

    fn config() -> ArenaConfig {
        ArenaConfig {
            tick_interval_ms: 100,
            ..ArenaConfig::default()
        }
    }

    fn arena() -> Arena {
        Arena::with_seed(config(), MotionBuffer::new(), 42).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ArenaConfig {
            win_score: 0,
            ..ArenaConfig::default()
        };
        assert!(Arena::new(config, MotionBuffer::new()).is_err());
    }

    #[test]
    fn test_tick_advances_clock() {
        let mut arena = arena();
        arena.tick();
        arena.tick();
        assert_eq!(arena.now_ms(), 200);
    }

    #[test]
    fn test_dash_applies_impulse() {
        let mut arena = arena();
        let id = arena.connect(1, None).unwrap().id;

        let outcome = arena.request_dash(1, Vec3::new(0.0, 0.0, 2.0));

        assert_eq!(outcome, DashOutcome::Accepted);
        match &arena.mover().commands()[0] {
            MotionCommand::Impulse {
                id: target,
                direction,
                magnitude,
            } => {
                assert_eq!(*target, id);
                assert_approx_eq!(direction.z, 1.0, 1e-6);
                assert_approx_eq!(*magnitude, 12.0, 1e-6);
            }
            other => panic!("Expected impulse, got {:?}", other),
        }
    }

    #[test]
    fn test_dash_without_participant_rejected() {
        let mut arena = arena();
        assert_eq!(
            arena.request_dash(7, Vec3::new(1.0, 0.0, 0.0)),
            DashOutcome::Rejected(DashRejection::UnknownParticipant)
        );
        assert!(arena.mover().commands().is_empty());
    }

    #[test]
    fn test_rejected_dash_has_no_effect() {
        let mut arena = arena();
        arena.connect(1, None).unwrap();
        arena.request_dash(1, Vec3::new(1.0, 0.0, 0.0));
        arena.drain_deltas();
        arena.mover_mut().drain();

        assert_eq!(
            arena.request_dash(1, Vec3::new(1.0, 0.0, 0.0)),
            DashOutcome::Rejected(DashRejection::OnCooldown)
        );
        assert!(arena.drain_deltas().is_empty());
        assert!(arena.mover().commands().is_empty());
    }

    #[test]
    fn test_dash_cycle_replicated() {
        let mut arena = arena();
        let id = arena.connect(1, None).unwrap().id;
        arena.drain_deltas();
        arena.request_dash(1, Vec3::new(1.0, 0.0, 0.0));

        for _ in 0..15 {
            arena.tick();
        }

        let dash_states: Vec<(bool, bool)> = arena
            .drain_deltas()
            .into_iter()
            .filter_map(|c| match c.delta {
                Delta::DashStateChanged {
                    id: changed,
                    performing,
                    on_cooldown,
                } if changed == id => Some((performing, on_cooldown)),
                _ => None,
            })
            .collect();
        assert_eq!(dash_states, vec![(true, true), (false, true), (false, false)]);
        assert_eq!(
            arena.registry().abilities().state(id).unwrap().phase,
            DashPhase::Available
        );
    }

    #[test]
    fn test_move_intent_rotates_and_pushes() {
        let mut arena = arena();
        arena.connect(1, None).unwrap();

        assert!(arena.move_intent(1, Vec3::new(1.0, 0.0, 0.0)));

        let commands = arena.mover_mut().drain();
        assert_eq!(commands.len(), 2);
        match &commands[0] {
            MotionCommand::Rotate { euler_delta, .. } => {
                assert_approx_eq!(euler_delta.y, 90.0, 1e-4);
            }
            other => panic!("Expected rotation, got {:?}", other),
        }
    }

    #[test]
    fn test_move_intent_blocked_while_dashing() {
        let mut arena = arena();
        arena.connect(1, None).unwrap();
        arena.request_dash(1, Vec3::new(1.0, 0.0, 0.0));
        arena.mover_mut().drain();

        assert!(!arena.move_intent(1, Vec3::new(0.0, 0.0, 1.0)));
        assert!(arena.mover().commands().is_empty());

        for _ in 0..4 {
            arena.tick();
        }
        assert!(arena.move_intent(1, Vec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_move_intent_zero_direction_ignored() {
        let mut arena = arena();
        arena.connect(1, None).unwrap();
        assert!(!arena.move_intent(1, Vec3::ZERO));
    }

    #[test]
    fn test_contact_is_symmetric() {
        let mut arena = arena();
        let a = arena.connect(1, None).unwrap().id;
        let b = arena.connect(2, None).unwrap().id;
        arena.request_dash(2, Vec3::new(1.0, 0.0, 0.0));

        // Reported with the dashing participant second
        let [forward, backward] = arena.contact(a, b);

        assert!(matches!(forward, HitOutcome::Rejected(_)));
        assert_eq!(
            backward,
            HitOutcome::Scored {
                attacker: b,
                new_score: 1
            }
        );
        assert!(arena.is_invincible(a));
    }

    #[test]
    fn test_handle_dispatches_events() {
        let mut arena = arena();
        arena.handle(ArenaEvent::Connect {
            connection: 1,
            display_name: Some("Rex".to_string()),
        });
        arena.handle(ArenaEvent::Tick);

        assert_eq!(arena.participant(1).unwrap().display_name, "Rex");
        assert_eq!(arena.now_ms(), 100);

        arena.handle(ArenaEvent::Disconnect { connection: 1 });
        assert!(arena.participant(1).is_none());
    }

    #[test]
    fn test_snapshot_tracks_committed_seq() {
        let mut arena = arena();
        arena.connect(1, None).unwrap();
        arena.connect(2, None).unwrap();

        let snapshot = arena.snapshot();

        assert_eq!(snapshot.roster.len(), 2);
        assert_eq!(snapshot.round.phase, RoundPhase::Active);
        assert_eq!(snapshot.as_of_seq, 2);
    }
}
