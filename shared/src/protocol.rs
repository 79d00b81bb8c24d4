//! Wire protocol shared between the match server and a client. A single
//! `Packet` enum carries every event in both directions, serialized with
//! `bincode` over UDP — the same shape the original netcode prototype used,
//! just generalized from one global match to many.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Matchmaking region. Validated at the connection gateway against the
/// server's configured `VALID_REGIONS` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    Na,
    Eu,
    Asia,
    Global,
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NA" => Ok(Region::Na),
            "EU" => Ok(Region::Eu),
            "ASIA" => Ok(Region::Asia),
            "GLOBAL" => Ok(Region::Global),
            other => Err(format!("unknown region: {other}")),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Region::Na => "NA",
            Region::Eu => "EU",
            Region::Asia => "ASIA",
            Region::Global => "GLOBAL",
        };
        write!(f, "{s}")
    }
}

/// Where the player wants to aim/shoot this tick, supplied by the client
/// alongside the movement vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouseTarget {
    pub x: f32,
    pub y: f32,
    pub id: String,
}

/// A single tick's worth of movement intent. `x`/`y` are conventionally
/// `{-1, 0, 1}`; other values are passed through unvalidated (spec leaves
/// this unspecified).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputVector {
    pub x: i8,
    pub y: i8,
    pub mouse: Option<MouseTarget>,
}

impl InputVector {
    pub fn zero() -> Self {
        InputVector { x: 0, y: 0, mouse: None }
    }

    pub fn is_idle(&self) -> bool {
        self.x == 0 && self.y == 0
    }
}

/// An input payload as it sits in a player's FIFO queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInput {
    pub tick: u32,
    pub vector: InputVector,
}

/// Per-tick player state as published in a broadcast. `x, y, vx, vy, tick`
/// are always present; the remaining fields are included only when they
/// differ from the last broadcast this player received (or always, for a
/// full-state broadcast).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub tick: u32,
    pub hp: Option<u8>,
    pub by: Option<bool>,
    pub name: Option<String>,
    pub is_dead: Option<bool>,
    pub kills: Option<u32>,
    pub deaths: Option<u32>,
}

/// Ephemeral projectile announcement. The server never simulates projectile
/// motion past this single initial state; `dud` tells clients to despawn it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileUpdate {
    pub id: String,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub vx: Option<f32>,
    pub vy: Option<f32>,
    pub owner_id: Option<String>,
    pub dud: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameOverEntry {
    pub player_id: String,
    pub kills: u32,
    pub deaths: u32,
    pub name: String,
}

/// Every message exchanged between a client and the server, in either
/// direction, over one UDP socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Packet {
    // --- client -> server ---
    JoinQueue {
        region: String,
        name: String,
        player_match_id: Option<String>,
    },
    PlayerInput {
        tick: u32,
        vector: InputVector,
    },
    ProjectileHit {
        enemy_id: String,
        projectile_id: String,
    },
    ToggleBystander,
    Ping {
        nonce: u64,
    },

    // --- server -> client ---
    MatchFound {
        match_id: String,
        region: Region,
        player_id: String,
    },
    RejoinedMatch {
        match_id: String,
        region: Region,
    },
    StateUpdate {
        s_tick: u32,
        s_time: u64,
        players: Vec<PlayerState>,
        projectiles: Vec<ProjectileUpdate>,
    },
    MatchReset,
    GameOver(Vec<GameOverEntry>),
    ShowIsLive,
    AfkWarning {
        message: String,
    },
    AfkRemoved {
        message: String,
    },
    Error {
        message: String,
    },
    Pong {
        server_time: u64,
        nonce: u64,
    },
}
