//! Connection to participant mapping and participant lifecycle.
//!
//! The registry owns every live agent together with its dash and
//! invincibility state, so tearing an agent down always releases its timers.
//! A connection may exist without an agent (between round end and restart).

use crate::ability::AbilityTimers;
use crate::broadcast::ReplicationBroadcaster;
use crate::error::{ArenaError, Result};
use crate::invincibility::InvincibilityTracker;
use crate::participant::ParticipantAgent;
use crate::spawn::SpawnAllocator;
use crate::utils::display_name_for;
use arena_shared::{ConnectionId, Delta, ParticipantId, ParticipantInfo, TeamColor};
use log::{error, info, warn};
use std::collections::{BTreeMap, HashMap};

struct Slot {
    display_name: String,
    agent: Option<ParticipantAgent>,
}

/// Owns every connection slot and its current agent, together with the
/// spawn pool and the per-agent dash and invincibility state.
///
/// A connection may be registered without an agent (between rounds, or when
/// the pool ran dry at a restart).
pub struct ConnectionRegistry {
    slots: BTreeMap<ConnectionId, Slot>,
    owners: HashMap<ParticipantId, ConnectionId>,
    next_participant_id: ParticipantId,
    spawns: SpawnAllocator,
    abilities: AbilityTimers,
    shields: InvincibilityTracker,
}

impl ConnectionRegistry {
    /// Empty registry drawing from `spawns`.
    pub fn new(spawns: SpawnAllocator, abilities: AbilityTimers) -> Self {
        Self {
            slots: BTreeMap::new(),
            owners: HashMap::new(),
            next_participant_id: 1,
            spawns,
            abilities,
            shields: InvincibilityTracker::new(),
        }
    }

    /// Registers `connection` and spawns its first agent.
    ///
    /// Nothing is registered when the join fails, so the transport can turn
    /// the connection away.
    pub fn on_connect(
        &mut self,
        connection: ConnectionId,
        requested_name: Option<&str>,
        out: &mut ReplicationBroadcaster,
    ) -> Result<ParticipantInfo> {
        if self.slots.contains_key(&connection) {
            warn!("Connection {} tried to join twice", connection);
            return Err(ArenaError::DuplicateConnection(connection));
        }

        let display_name = display_name_for(connection, requested_name);
        let agent = self.spawn_agent(connection, display_name.clone())?;
        let participant = agent.info();

        self.slots.insert(
            connection,
            Slot {
                display_name,
                agent: Some(agent),
            },
        );
        out.commit(Delta::ParticipantJoined(participant.clone()));

        Ok(participant)
    }

    /// Unregisters `connection`, tearing down its agent and refilling the
    /// spawn pool. Unknown connections are ignored.
    pub fn on_disconnect(
        &mut self,
        connection: ConnectionId,
        out: &mut ReplicationBroadcaster,
    ) -> Option<ParticipantInfo> {
        let slot = self.slots.remove(&connection)?;
        self.spawns.release_all();

        let removed = slot.agent.map(|agent| self.teardown(agent));
        if let Some(participant) = &removed {
            out.commit(Delta::ParticipantLeft { id: participant.id });
        }
        info!("Connection {} left the arena", connection);

        removed
    }

    /// Swaps the agent of `connection` for a fresh one at a newly drawn spawn
    /// point. The old agent, if any, is only torn down once the new spawn
    /// point is secured.
    pub fn replace(
        &mut self,
        connection: ConnectionId,
        out: &mut ReplicationBroadcaster,
    ) -> Result<ParticipantInfo> {
        let display_name = self
            .slots
            .get(&connection)
            .map(|slot| slot.display_name.clone())
            .ok_or(ArenaError::UnknownConnection(connection))?;

        let agent = self.spawn_agent(connection, display_name)?;
        let participant = agent.info();

        let previous = self
            .slots
            .get_mut(&connection)
            .and_then(|slot| slot.agent.replace(agent));
        let previous = previous.map(|old| self.teardown(old).id);

        out.commit(Delta::ParticipantReplaced {
            connection,
            previous,
            participant: participant.clone(),
        });

        Ok(participant)
    }

    /// Tears down the agent of `connection` but keeps the connection registered.
    pub fn despawn(
        &mut self,
        connection: ConnectionId,
        out: &mut ReplicationBroadcaster,
    ) -> Option<ParticipantInfo> {
        let agent = self.slots.get_mut(&connection)?.agent.take()?;
        let participant = self.teardown(agent);
        out.commit(Delta::ParticipantLeft { id: participant.id });
        Some(participant)
    }

    fn spawn_agent(
        &mut self,
        connection: ConnectionId,
        display_name: String,
    ) -> Result<ParticipantAgent> {
        let position = self.spawns.take().map_err(|e| {
            error!("Cannot spawn participant for connection {}: {}", connection, e);
            e
        })?;

        let id = self.next_participant_id;
        self.next_participant_id += 1;

        let agent = ParticipantAgent::new(
            id,
            connection,
            display_name,
            TeamColor::for_connection(connection),
            position,
        );
        self.abilities.register(id);
        self.shields.register(id);
        self.owners.insert(id, connection);

        info!(
            "Spawned participant {} ('{}') for connection {} at ({:.1}, {:.1}, {:.1})",
            id, agent.display_name, connection, position.x, position.y, position.z
        );
        Ok(agent)
    }

    fn teardown(&mut self, agent: ParticipantAgent) -> ParticipantInfo {
        self.abilities.release(agent.id);
        self.shields.release(agent.id);
        self.owners.remove(&agent.id);
        info!("Removed participant {} of connection {}", agent.id, agent.connection);
        agent.info()
    }

    /// True even while the connection has no agent.
    pub fn is_registered(&self, connection: ConnectionId) -> bool {
        self.slots.contains_key(&connection)
    }

    /// Current agent of `connection`, if it has one this round.
    pub fn agent(&self, connection: ConnectionId) -> Option<&ParticipantAgent> {
        self.slots.get(&connection)?.agent.as_ref()
    }

    /// Looks an agent up through its owning connection.
    pub fn agent_by_id(&self, id: ParticipantId) -> Option<&ParticipantAgent> {
        let connection = self.owners.get(&id)?;
        self.agent(*connection)
    }

    pub(crate) fn agent_by_id_mut(&mut self, id: ParticipantId) -> Option<&mut ParticipantAgent> {
        let connection = self.owners.get(&id)?;
        self.slots.get_mut(connection)?.agent.as_mut()
    }

    /// Registered connections in ascending order.
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.slots.keys().copied().collect()
    }

    /// Observer view of every live agent, by connection order.
    pub fn roster(&self) -> Vec<ParticipantInfo> {
        self.slots
            .values()
            .filter_map(|slot| slot.agent.as_ref().map(ParticipantAgent::info))
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.slots.len()
    }

    /// Connections that currently have an agent.
    pub fn participant_count(&self) -> usize {
        self.owners.len()
    }

    pub fn spawns(&self) -> &SpawnAllocator {
        &self.spawns
    }

    pub fn spawns_mut(&mut self) -> &mut SpawnAllocator {
        &mut self.spawns
    }

    pub fn abilities(&self) -> &AbilityTimers {
        &self.abilities
    }

    pub fn abilities_mut(&mut self) -> &mut AbilityTimers {
        &mut self.abilities
    }

    pub fn shields(&self) -> &InvincibilityTracker {
        &self.shields
    }

    pub fn shields_mut(&mut self) -> &mut InvincibilityTracker {
        &mut self.shields
    }
}
