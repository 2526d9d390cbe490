use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_PACKET_SIZE: usize = 2048;

/// Transport-assigned session handle. Stable for the lifetime of a network session.
pub type ConnectionId = u32;
/// Identity of one spawned agent. A respawn produces a new id.
pub type ParticipantId = u32;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit vector in the same direction, or zero for a zero-length input.
    pub fn normalized(&self) -> Vec3 {
        let magnitude = self.length();
        if magnitude > 0.0 {
            Vec3::new(self.x / magnitude, self.y / magnitude, self.z / magnitude)
        } else {
            Vec3::ZERO
        }
    }

    /// Heading around the vertical axis in degrees, 0 facing +Z and 90 facing +X.
    pub fn yaw_degrees(&self) -> f32 {
        self.x.atan2(self.z).to_degrees()
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z).length()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TeamColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub const TEAM_PALETTE: [TeamColor; 8] = [
    TeamColor { r: 52, g: 101, b: 255 },
    TeamColor { r: 235, g: 64, b: 52 },
    TeamColor { r: 67, g: 196, b: 82 },
    TeamColor { r: 155, g: 89, b: 182 },
    TeamColor { r: 243, g: 156, b: 18 },
    TeamColor { r: 26, g: 188, b: 196 },
    TeamColor { r: 232, g: 67, b: 147 },
    TeamColor { r: 241, g: 214, b: 48 },
];

impl TeamColor {
    /// Palette colour for a connection, so a connection keeps its colour across rounds.
    pub fn for_connection(connection: ConnectionId) -> Self {
        TEAM_PALETTE[connection as usize % TEAM_PALETTE.len()]
    }
}

/// Observer-facing projection of one arena participant.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ParticipantInfo {
    pub id: ParticipantId,
    pub connection: ConnectionId,
    pub display_name: String,
    pub team_color: TeamColor,
    pub score: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Active,
    Ended,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RoundInfo {
    pub phase: RoundPhase,
    pub winner: Option<ParticipantInfo>,
    /// Time left until the next round starts; zero while the round is active.
    pub restart_in_ms: u64,
}

/// A committed change of authoritative state.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Delta {
    ParticipantJoined(ParticipantInfo),
    ParticipantLeft {
        id: ParticipantId,
    },
    /// The agent owned by `connection` was swapped for a freshly spawned one.
    ParticipantReplaced {
        connection: ConnectionId,
        previous: Option<ParticipantId>,
        participant: ParticipantInfo,
    },
    ScoreChanged {
        id: ParticipantId,
        new_score: u32,
    },
    InvincibilityChanged {
        id: ParticipantId,
        is_invincible: bool,
    },
    DashStateChanged {
        id: ParticipantId,
        performing: bool,
        on_cooldown: bool,
    },
    RoundEnded {
        winner_id: ParticipantId,
        winner_name: String,
        winner_score: u32,
        winner_color: TeamColor,
        restart_delay_ms: u64,
    },
    RoundStarted,
}

/// Instruction for whoever owns the rigid bodies.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum MotionCommand {
    Impulse {
        id: ParticipantId,
        direction: Vec3,
        magnitude: f32,
    },
    Rotate {
        id: ParticipantId,
        euler_delta: Vec3,
        speed: f32,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
        display_name: Option<String>,
    },
    Heartbeat,
    Move {
        sequence: u32,
        direction: Vec3,
    },
    Dash {
        sequence: u32,
        direction: Vec3,
    },
    /// Contact report from the physics collaborator; member order carries no meaning.
    Contact {
        a: ParticipantId,
        b: ParticipantId,
    },
    ResyncRequest,
    Disconnect,

    Connected {
        connection_id: ConnectionId,
    },
    Welcome {
        connection_id: ConnectionId,
        participant: Option<ParticipantInfo>,
        roster: Vec<ParticipantInfo>,
        round: RoundInfo,
        as_of_seq: u64,
    },
    Delta {
        seq: u64,
        delta: Delta,
    },
    Motion(MotionCommand),
    Disconnected {
        reason: String,
    },
}
