//! Match tuning and server limits.
//!
//! All durations are milliseconds in the tick time base: a timer fires on the
//! first tick whose logical time is at or past its deadline.

use crate::error::ConfigError;
use crate::utils::MAX_DISPLAY_NAME_BYTES;
use arena_shared::{
    Packet, ParticipantInfo, RoundInfo, RoundPhase, TeamColor, Vec3, MAX_PACKET_SIZE,
};
use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct ArenaConfig {
    /// Score that ends the round
    pub win_score: u32,
    /// Time between round end and the next round start
    pub restart_delay_ms: u64,
    /// Full dash cooldown, measured from the trigger
    pub dash_cooldown_ms: u64,
    /// Damage-dealing part of the cooldown, measured from the trigger
    pub dash_performing_ms: u64,
    /// Impulse magnitude applied on an accepted dash
    pub dash_power: f32,
    /// Post-hit invincibility granted to the victim
    pub invincibility_ms: u64,
    pub moving_speed: f32,
    /// Degrees per second
    pub rotation_speed: f32,
    pub spawn_points: Vec<Vec3>,
    pub tick_interval_ms: u64,
    pub max_clients: usize,
    pub client_timeout_ms: u64,
    /// Sole accepted source of `Contact` reports. Without one, a connection
    /// may only report contacts its own agent takes part in.
    pub physics_addr: Option<SocketAddr>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            win_score: 3,
            restart_delay_ms: 5000,
            dash_cooldown_ms: 1500,
            dash_performing_ms: 400,
            dash_power: 12.0,
            invincibility_ms: 2000,
            moving_speed: 6.0,
            rotation_speed: 720.0,
            spawn_points: spawn_ring(8, 10.0),
            tick_interval_ms: 33,
            max_clients: 8,
            client_timeout_ms: 5000,
            physics_addr: None,
        }
    }
}

impl ArenaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.win_score == 0 {
            return Err(ConfigError::ZeroWinScore);
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        if self.dash_performing_ms > self.dash_cooldown_ms {
            return Err(ConfigError::PerformingExceedsCooldown {
                performing_ms: self.dash_performing_ms,
                cooldown_ms: self.dash_cooldown_ms,
            });
        }
        if self.spawn_points.is_empty() {
            return Err(ConfigError::NoSpawnPoints);
        }
        if self.max_clients == 0 {
            return Err(ConfigError::ZeroMaxClients);
        }
        let limit = max_supported_clients();
        if self.max_clients > limit {
            return Err(ConfigError::TooManyClients {
                max_clients: self.max_clients,
                limit,
            });
        }
        Ok(())
    }
}

/// Encoded size of a `Welcome` listing `roster_len` participants, with every
/// name at the byte cap and every optional field present.
fn worst_case_welcome_size(roster_len: u32) -> u64 {
    let widest = |id: u32| ParticipantInfo {
        id,
        connection: id,
        display_name: "x".repeat(MAX_DISPLAY_NAME_BYTES),
        team_color: TeamColor::for_connection(id),
        score: u32::MAX,
    };
    let packet = Packet::Welcome {
        connection_id: u32::MAX,
        participant: Some(widest(0)),
        roster: (0..roster_len).map(widest).collect(),
        round: RoundInfo {
            phase: RoundPhase::Ended,
            winner: Some(widest(0)),
            restart_in_ms: u64::MAX,
        },
        as_of_seq: u64::MAX,
    };
    bincode::serialized_size(&packet).unwrap_or(u64::MAX)
}

/// Largest roster whose `Welcome` still fits one datagram of
/// [`MAX_PACKET_SIZE`] bytes.
pub fn max_supported_clients() -> usize {
    let base = worst_case_welcome_size(0);
    let per_entry = worst_case_welcome_size(1).saturating_sub(base).max(1);
    ((MAX_PACKET_SIZE as u64).saturating_sub(base) / per_entry) as usize
}

/// Evenly spaced points on a circle in the XZ plane.
pub fn spawn_ring(count: usize, radius: f32) -> Vec<Vec3> {
    (0..count)
        .map(|i| {
            let angle = i as f32 / count as f32 * std::f32::consts::TAU;
            Vec3::new(radius * angle.cos(), 0.0, radius * angle.sin())
        })
        .collect()
}

/// Parses `x,y,z`. Used as a clap value parser for `--spawn-point`.
pub fn parse_spawn_point(raw: &str) -> Result<Vec3, ConfigError> {
    let coords: Vec<f32> = raw
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|_| ConfigError::InvalidSpawnPoint(raw.to_string()))?;

    match coords.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(ConfigError::InvalidSpawnPoint(raw.to_string())),
    }
}
