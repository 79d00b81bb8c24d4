//! Tunable constants shared between the matchmaker, the per-match simulation
//! and (conceptually) clients. Values mirror the numbers a browser-based
//! platform shooter ships with; they are not meant to be reconfigured per
//! deploy.

/// Arena bounds, in world units. The origin is top-left; `y` grows downward.
pub const ARENA_WIDTH: f32 = 1920.0;
pub const ARENA_HEIGHT: f32 = 1080.0;

pub const GRAVITY: f32 = 1500.0;
pub const MAX_FALL_SPEED: f32 = 1500.0;
pub const WALK_SPEED: f32 = 750.0;
pub const JUMP_STRENGTH: f32 = 750.0;

/// Player hitbox. Position is the bottom-center pivot, matching the client's
/// sprite anchor.
pub const PLAYER_HALF_WIDTH: f32 = 25.0;
pub const PLAYER_WIDTH: f32 = PLAYER_HALF_WIDTH * 2.0;
pub const PLAYER_HEIGHT: f32 = 50.0;

pub const STARTING_X: f32 = 100.0;
pub const STARTING_Y: f32 = 100.0;

pub const MAX_HP: u8 = 100;
pub const DAMAGE_PER_HIT: u8 = 10;

pub const PROJECTILE_WIDTH: f32 = 20.0;
pub const PROJECTILE_HEIGHT: f32 = 20.0;
pub const PROJECTILE_SPEED: f32 = 30.0;

pub const PLATFORM_WIDTH: f32 = 500.0;
pub const PLATFORM_HEIGHT: f32 = 30.0;

pub const TICK_RATE_HZ: u32 = 30;
pub const FIXED_STEP_MS: f64 = 1000.0 / TICK_RATE_HZ as f64;

pub const DEFAULT_MAX_PLAYERS_PER_MATCH: usize = 10;

pub const RECONNECT_GRACE_MS: u64 = 20_000;
pub const AFK_WARNING_MS: u64 = 60_000;
pub const AFK_REMOVE_GRACE_MS: u64 = 10_000;
pub const RESPAWN_DELAY_MS: u64 = 3_000;
pub const MAX_KILL_AMOUNT: u32 = 4;
pub const MATCH_RESET_DELAY_MS: u64 = 10_000;

pub const INPUT_RATE_LIMIT_WINDOW_MS: u64 = 1_000;
pub const INPUT_RATE_LIMIT_MAX_PER_WINDOW: u32 = 100;

pub const DISCONNECT_SWEEP_INTERVAL_MS: u64 = 3_000;
