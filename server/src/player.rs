//! Per-player physics state, input queue and input-debt reconciliation
//! stack. This is the server-only analogue of the teacher's trivial
//! `shared::Player` DTO — here the struct also owns the bookkeeping that
//! makes client-side prediction reconcilable.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Instant;

use shared::{
    clamp, ClientInput, InputVector, MouseTarget, Platform, PlayerState, ARENA_HEIGHT,
    ARENA_WIDTH, GRAVITY, JUMP_STRENGTH, MAX_FALL_SPEED, MAX_HP, PLAYER_HALF_WIDTH, STARTING_X,
    STARTING_Y, WALK_SPEED,
};

/// Which branch of the input-debt protocol produced a physics step. Kept
/// for diagnostics only; it never affects the resulting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOrigin {
    /// Synthesized because the queue was empty.
    Predicted,
    /// A real payload applied with an empty debt stack.
    Direct,
    /// A real payload applied after the debt stack was cleared for
    /// diverging from prediction.
    Reconciled,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub addr: SocketAddr,

    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub is_on_surface: bool,
    pub can_double_jump: bool,
    pub is_jumping: bool,

    pub hp: u8,
    pub is_bystander: bool,
    pub is_dead: bool,
    pub kills: u32,
    pub deaths: u32,

    pub input_queue: VecDeque<ClientInput>,
    pub last_processed_input: ClientInput,
    pub input_debt: Vec<InputVector>,
    pub last_input_timestamp: Instant,
    pub is_disconnected: bool,
    last_broadcast_state: Option<PlayerState>,

    /// Set by `update()` when the applied vector carried a mouse target for
    /// a non-bystander; consumed by the match to emit a projectile.
    pub is_shooting: bool,
    pub pending_shot: Option<MouseTarget>,
}

impl Player {
    pub fn new(id: String, name: String, addr: SocketAddr) -> Self {
        Player {
            id,
            name,
            addr,
            x: STARTING_X,
            y: STARTING_Y,
            vx: 0.0,
            vy: 0.0,
            is_on_surface: false,
            can_double_jump: true,
            is_jumping: false,
            hp: MAX_HP,
            is_bystander: false,
            is_dead: false,
            kills: 0,
            deaths: 0,
            input_queue: VecDeque::new(),
            last_processed_input: ClientInput { tick: 0, vector: InputVector::zero() },
            input_debt: Vec::new(),
            last_input_timestamp: Instant::now(),
            is_disconnected: false,
            last_broadcast_state: None,
            is_shooting: false,
            pending_shot: None,
        }
    }

    pub fn queue_input(&mut self, input: ClientInput) {
        self.last_input_timestamp = Instant::now();
        self.input_queue.push_back(input);
    }

    pub fn is_afk(&self, vector: &InputVector) -> bool {
        vector.x == 0 && vector.y == 0 && self.is_on_surface
    }

    pub fn add_input_debt(&mut self, vector: InputVector) {
        self.input_debt.push(vector);
    }

    pub fn peek_debt(&self) -> Option<&InputVector> {
        self.input_debt.last()
    }

    pub fn pop_debt(&mut self) -> Option<InputVector> {
        self.input_debt.pop()
    }

    pub fn clear_debt(&mut self) {
        self.input_debt.clear();
    }

    /// One physics sub-step. `tick` is recorded on the player but does not
    /// affect the integration itself — it is echoed back in broadcast
    /// state so clients can line predicted frames up against it.
    pub fn update(&mut self, vector: &InputVector, dt: f32, tick: u32, platforms: &[Platform]) {
        self.is_shooting = false;
        self.pending_shot = None;

        self.vx = if vector.x != 0 { vector.x as f32 * WALK_SPEED } else { 0.0 };

        if vector.y < 0 {
            if self.is_on_surface {
                self.vy = vector.y as f32 * JUMP_STRENGTH;
                self.can_double_jump = true;
                self.is_on_surface = false;
                self.is_jumping = true;
            } else if self.can_double_jump {
                self.vy = vector.y as f32 * JUMP_STRENGTH;
                self.can_double_jump = false;
            }
        }

        self.vy = (self.vy + GRAVITY * dt).min(MAX_FALL_SPEED);

        self.x += self.vx * dt;
        self.y += self.vy * dt;

        self.x = clamp(self.x, PLAYER_HALF_WIDTH, ARENA_WIDTH - PLAYER_HALF_WIDTH);
        self.y = clamp(self.y, 0.0, ARENA_HEIGHT);

        if self.y == ARENA_HEIGHT {
            self.is_on_surface = true;
            self.vy = 0.0;
            self.is_jumping = false;
            self.can_double_jump = true;
        }

        self.resolve_platform_collision(platforms);

        if let Some(mouse) = &vector.mouse {
            if !self.is_bystander {
                self.is_shooting = true;
                self.pending_shot = Some(mouse.clone());
            }
        }

        let _ = tick;
    }

    fn resolve_platform_collision(&mut self, platforms: &[Platform]) {
        if self.vy <= 0.0 {
            return;
        }
        let left = self.x - PLAYER_HALF_WIDTH;
        let right = self.x + PLAYER_HALF_WIDTH;
        let bottom = self.y;
        for platform in platforms {
            let f = platform.bounds();
            let horizontal_overlap = right > f.left && left < f.right;
            if !horizontal_overlap {
                continue;
            }
            let landed_exactly = bottom == f.top;
            let tunneled = bottom > f.top && bottom < f.bottom;
            if landed_exactly || tunneled {
                self.y = f.top;
                self.vy = 0.0;
                self.can_double_jump = true;
                self.is_jumping = false;
                self.is_on_surface = true;
                return;
            }
        }
    }

    pub fn damage(&mut self, n: u8) {
        self.hp = self.hp.saturating_sub(n);
    }

    pub fn heal(&mut self, n: u8) {
        self.hp = self.hp.saturating_add(n).min(MAX_HP);
    }

    pub fn add_kill(&mut self) {
        self.kills += 1;
    }

    /// Marks the player dead and empties its input state, per the
    /// invariant that a dead player carries no pending work.
    pub fn add_death(&mut self) {
        self.is_dead = true;
        self.deaths += 1;
        self.input_queue.clear();
        self.clear_debt();
    }

    pub fn respawn(&mut self) {
        self.x = STARTING_X;
        self.y = STARTING_Y;
        self.vx = 0.0;
        self.vy = 0.0;
        self.hp = MAX_HP;
        self.is_dead = false;
        self.is_on_surface = false;
        self.can_double_jump = true;
        self.is_jumping = false;
    }

    pub fn reset_for_new_round(&mut self) {
        self.hp = MAX_HP;
        self.kills = 0;
        self.deaths = 0;
        self.is_dead = false;
    }

    pub fn full_broadcast_state(&mut self) -> PlayerState {
        let state = PlayerState {
            id: self.id.clone(),
            x: self.x,
            y: self.y,
            vx: self.vx,
            vy: self.vy,
            tick: self.last_processed_input.tick,
            hp: Some(self.hp),
            by: Some(self.is_bystander),
            name: Some(self.name.clone()),
            is_dead: Some(self.is_dead),
            kills: Some(self.kills),
            deaths: Some(self.deaths),
        };
        self.last_broadcast_state = Some(state.clone());
        state
    }

    pub fn delta_broadcast_state(&mut self) -> PlayerState {
        let previous = self.last_broadcast_state.clone();
        let hp = match &previous {
            Some(p) if p.hp == Some(self.hp) => None,
            _ => Some(self.hp),
        };
        let by = match &previous {
            Some(p) if p.by == Some(self.is_bystander) => None,
            _ => Some(self.is_bystander),
        };
        let name = match &previous {
            Some(p) if p.name.as_deref() == Some(self.name.as_str()) => None,
            _ => Some(self.name.clone()),
        };
        let is_dead = match &previous {
            Some(p) if p.is_dead == Some(self.is_dead) => None,
            _ => Some(self.is_dead),
        };
        let kills = match &previous {
            Some(p) if p.kills == Some(self.kills) => None,
            _ => Some(self.kills),
        };
        let deaths = match &previous {
            Some(p) if p.deaths == Some(self.deaths) => None,
            _ => Some(self.deaths),
        };

        let state = PlayerState {
            id: self.id.clone(),
            x: self.x,
            y: self.y,
            vx: self.vx,
            vy: self.vy,
            tick: self.last_processed_input.tick,
            hp,
            by,
            name,
            is_dead,
            kills,
            deaths,
        };

        self.last_broadcast_state = Some(PlayerState {
            hp: Some(self.hp),
            by: Some(self.is_bystander),
            name: Some(self.name.clone()),
            is_dead: Some(self.is_dead),
            kills: Some(self.kills),
            deaths: Some(self.deaths),
            ..state.clone()
        });

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::net::SocketAddr;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn fresh_player() -> Player {
        Player::new("p1".to_string(), "astrid".to_string(), addr())
    }

    #[test]
    fn jump_arc_matches_spec_scenario_one() {
        let mut p = fresh_player();
        p.is_on_surface = true;
        let vector = InputVector { x: 0, y: -1, mouse: None };
        p.update(&vector, 1.0 / 30.0, 1, &[]);
        assert_approx_eq!(p.vy, -700.0, 0.5);
        assert_approx_eq!(p.y, 76.67, 0.1);
    }

    #[test]
    fn platform_landing_stops_fall_and_restores_double_jump() {
        let mut p = fresh_player();
        p.x = 400.0;
        p.y = 780.0;
        p.vy = 1500.0;
        p.can_double_jump = false;
        let platform = Platform::new(115.0, 830.0, 500.0, 30.0);
        let vector = InputVector::zero();
        p.update(&vector, 1.0 / 30.0, 1, &[platform]);
        assert_eq!(p.y, 830.0);
        assert_eq!(p.vy, 0.0);
        assert!(p.can_double_jump);
    }

    #[test]
    fn double_jump_consumed_then_unavailable() {
        let mut p = fresh_player();
        p.is_on_surface = false;
        p.can_double_jump = true;
        let vector = InputVector { x: 0, y: -1, mouse: None };
        p.update(&vector, 1.0 / 30.0, 1, &[]);
        assert!(!p.can_double_jump);
        let vy_after_first = p.vy;
        p.update(&vector, 1.0 / 30.0, 2, &[]);
        assert!(p.vy > vy_after_first);
    }

    #[test]
    fn horizontal_position_is_clamped_to_arena() {
        let mut p = fresh_player();
        p.x = 10.0;
        let vector = InputVector { x: -1, y: 0, mouse: None };
        p.update(&vector, 1.0, 1, &[]);
        assert_eq!(p.x, PLAYER_HALF_WIDTH);
    }

    #[test]
    fn shooting_sets_flag_but_not_for_bystanders() {
        let mut p = fresh_player();
        let mouse = MouseTarget { x: 1.0, y: 1.0, id: "shot".to_string() };
        let vector = InputVector { x: 0, y: 0, mouse: Some(mouse.clone()) };
        p.update(&vector, 1.0 / 30.0, 1, &[]);
        assert!(p.is_shooting);

        p.is_bystander = true;
        p.update(&InputVector { x: 0, y: 0, mouse: Some(mouse) }, 1.0 / 30.0, 2, &[]);
        assert!(!p.is_shooting);
    }

    #[test]
    fn damage_and_heal_clamp_to_bounds() {
        let mut p = fresh_player();
        p.damage(150);
        assert_eq!(p.hp, 0);
        p.heal(200);
        assert_eq!(p.hp, MAX_HP);
    }

    #[test]
    fn death_clears_queue_and_debt() {
        let mut p = fresh_player();
        p.queue_input(ClientInput { tick: 1, vector: InputVector::zero() });
        p.add_input_debt(InputVector::zero());
        p.add_death();
        assert!(p.is_dead);
        assert!(p.input_queue.is_empty());
        assert!(p.input_debt.is_empty());
        assert_eq!(p.deaths, 1);
    }

    #[test]
    fn respawn_resets_position_and_hp() {
        let mut p = fresh_player();
        p.hp = 10;
        p.x = 900.0;
        p.is_dead = true;
        p.respawn();
        assert_eq!(p.hp, MAX_HP);
        assert_eq!(p.x, STARTING_X);
        assert!(!p.is_dead);
    }

    #[test]
    fn delta_state_omits_unchanged_fields() {
        let mut p = fresh_player();
        let first = p.delta_broadcast_state();
        assert!(first.hp.is_some());

        let second = p.delta_broadcast_state();
        assert!(second.hp.is_none());
        assert!(second.name.is_none());

        p.damage(5);
        let third = p.delta_broadcast_state();
        assert_eq!(third.hp, Some(95));
        assert!(third.name.is_none());
    }

    #[test]
    fn is_afk_requires_idle_vector_and_grounded() {
        let mut p = fresh_player();
        p.is_on_surface = true;
        assert!(p.is_afk(&InputVector::zero()));
        p.is_on_surface = false;
        assert!(!p.is_afk(&InputVector::zero()));
    }
}
