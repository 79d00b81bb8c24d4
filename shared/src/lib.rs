//! Types and pure functions shared between the match server and a client:
//! arena/physics constants, vector and AABB primitives, the static platform
//! layout, and the wire protocol. Nothing in this crate holds any mutable
//! session state — that lives in `server`.

pub mod constants;
pub mod geometry;
pub mod platform;
pub mod protocol;

pub use constants::*;
pub use geometry::{aabb_overlap, clamp, launch_velocity, Bounds, Rect};
pub use platform::{default_platforms, Platform};
pub use protocol::{
    ClientInput, GameOverEntry, InputVector, MouseTarget, Packet, PlayerState, ProjectileUpdate,
    Region,
};
