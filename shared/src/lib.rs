//! Types and simulation code shared by the territory server and client.
//!
//! Both sides run the same [`snake`] code: the room advances snakes with it
//! every tick and the client reconciler uses it to extrapolate past the
//! newest snapshot.

pub mod config;
pub mod geometry;
pub mod snake;
pub mod state;

pub use config::{ArenaConfig, FoodConfig, GameConfig, NetConfig, ScoreConfig, SnakeConfig};
pub use snake::{ClaimError, SnakeState};
pub use state::{
    sanitize_player_name, sanitize_skin, DeathCause, DeathRecord, DeathStats, Direction, Food,
    PlayerId, PlayerState, Point, SnakePoint, TerritoryRegion,
};

use serde::{Deserialize, Serialize};

/// Largest datagram either side will send or accept.
pub const MAX_PACKET_SIZE: usize = 65507;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Join {
        name: String,
        skin: String,
    },
    /// `x`/`y` is where the client believes its head was when it turned and
    /// `sequence` is the head sequence it saw at that moment.
    Turn {
        direction: Direction,
        x: f64,
        y: f64,
        sequence: u32,
    },
    StartBoost,
    StopBoost,
    Freeze,
    Unfreeze,
    /// Clock ping stamped with the client's local send time.
    TimeSync {
        id: u32,
        client_time: f64,
    },
    Disconnect,

    Connected {
        client_id: PlayerId,
    },
    TimeSyncReply {
        id: u32,
        server_time: f64,
    },
    Spawn {
        player_id: PlayerId,
        snake: SnakeState,
    },
    Death {
        record: DeathRecord,
    },
    GameState {
        tick: u32,
        /// Server simulation time in ms.
        timestamp: f64,
        half_size: f64,
        players: Vec<PlayerState>,
        food: Vec<Food>,
    },
    Disconnected {
        reason: String,
    },
}
