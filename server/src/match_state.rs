//! The per-match fixed-step simulation: accumulator-driven physics, the
//! input-debt reconciliation protocol, platform collision, shooting/hit
//! handling, and the death/respawn/win/reset state machine. Generalizes the
//! teacher's single global `GameState` into one instance per match.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use shared::{
    default_platforms, launch_velocity, ClientInput, GameOverEntry, InputVector, Packet, Platform,
    PlayerState, ProjectileUpdate, Region, AFK_REMOVE_GRACE_MS, AFK_WARNING_MS, FIXED_STEP_MS,
    INPUT_RATE_LIMIT_MAX_PER_WINDOW, INPUT_RATE_LIMIT_WINDOW_MS, MATCH_RESET_DELAY_MS,
    MAX_KILL_AMOUNT, PROJECTILE_SPEED, RECONNECT_GRACE_MS, RESPAWN_DELAY_MS,
};

use crate::player::Player;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Active,
    AwaitingReset,
}

#[derive(Debug, Clone, Copy)]
struct RateLimitState {
    count: u32,
    window_start: Instant,
}

pub struct Match {
    pub id: String,
    pub region: Region,
    pub players: HashMap<String, Player>,
    pub platforms: Vec<Platform>,
    pub server_tick: u32,
    accumulator: f64,
    last_update_time: Instant,
    pub phase: MatchPhase,
    pub should_remove: bool,
    respawn_queue: HashMap<String, Instant>,
    projectile_updates: HashMap<String, ProjectileUpdate>,
    pub disconnected_player_cleanup: HashMap<String, Instant>,
    rate_limits: HashMap<String, RateLimitState>,
    afk_warned: HashMap<String, Instant>,
    afk_removal_deadline: HashMap<String, Instant>,
    pending_full_state_broadcast: bool,
    match_reset_deadline: Option<Instant>,
    pub last_disconnect_sweep: Instant,
    outbox: Vec<(SocketAddr, Packet)>,
}

impl Match {
    pub fn new(id: String, region: Region) -> Self {
        let now = Instant::now();
        Match {
            id,
            region,
            players: HashMap::new(),
            platforms: default_platforms(),
            server_tick: 0,
            accumulator: 0.0,
            last_update_time: now,
            phase: MatchPhase::Active,
            should_remove: false,
            respawn_queue: HashMap::new(),
            projectile_updates: HashMap::new(),
            disconnected_player_cleanup: HashMap::new(),
            rate_limits: HashMap::new(),
            afk_warned: HashMap::new(),
            afk_removal_deadline: HashMap::new(),
            pending_full_state_broadcast: false,
            match_reset_deadline: None,
            last_disconnect_sweep: now,
            outbox: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn has_room(&self, max_players: usize) -> bool {
        self.players.len() < max_players
    }

    pub fn drain_outbound(&mut self) -> Vec<(SocketAddr, Packet)> {
        std::mem::take(&mut self.outbox)
    }

    fn send(&mut self, addr: SocketAddr, packet: Packet) {
        self.outbox.push((addr, packet));
    }

    fn broadcast(&mut self, packet: Packet) {
        let addrs: Vec<SocketAddr> = self.players.values().map(|p| p.addr).collect();
        for addr in addrs {
            self.outbox.push((addr, packet.clone()));
        }
    }

    /// Inserts a new player, or returns the existing id unchanged if it's
    /// already present — an id collision is treated as "already joined"
    /// rather than an error.
    pub fn add_player(&mut self, id: String, addr: SocketAddr, name: String) -> String {
        if self.players.contains_key(&id) {
            return id;
        }
        self.players.insert(id.clone(), Player::new(id.clone(), name, addr));
        self.pending_full_state_broadcast = true;
        id
    }

    pub fn rejoin_player(&mut self, id: &str, addr: SocketAddr) -> Result<(), String> {
        match self.players.get_mut(id) {
            None => Err(format!("no player {id} in this match")),
            Some(player) => {
                player.addr = addr;
                player.is_disconnected = false;
                self.disconnected_player_cleanup.remove(id);
                self.afk_warned.remove(id);
                self.afk_removal_deadline.remove(id);
                self.pending_full_state_broadcast = true;
                Ok(())
            }
        }
    }

    pub fn toggle_bystander(&mut self, id: &str) {
        if let Some(player) = self.players.get_mut(id) {
            player.is_bystander = !player.is_bystander;
        }
    }

    pub fn disconnect_player(&mut self, id: &str) {
        if let Some(player) = self.players.get_mut(id) {
            player.is_disconnected = true;
            self.disconnected_player_cleanup.insert(id.to_string(), Instant::now());
        }
    }

    /// Applies the per-player fixed-window rate limit, then enqueues the
    /// input if accepted. Returns false when the input was dropped.
    pub fn handle_player_input(&mut self, id: &str, input: ClientInput) -> bool {
        let now = Instant::now();
        let state = self.rate_limits.entry(id.to_string()).or_insert(RateLimitState {
            count: 0,
            window_start: now,
        });
        if now.duration_since(state.window_start).as_millis() as u64 >= INPUT_RATE_LIMIT_WINDOW_MS {
            state.count = 0;
            state.window_start = now;
        }
        if state.count >= INPUT_RATE_LIMIT_MAX_PER_WINDOW {
            return false;
        }
        state.count += 1;

        self.afk_warned.remove(id);
        self.afk_removal_deadline.remove(id);

        if let Some(player) = self.players.get_mut(id) {
            player.queue_input(input);
            true
        } else {
            false
        }
    }

    pub fn handle_projectile_hit(&mut self, shooter_id: &str, enemy_id: &str, projectile_id: &str) {
        if shooter_id == enemy_id {
            return;
        }
        let target_is_valid = match self.players.get(enemy_id) {
            Some(p) => !p.is_bystander,
            None => false,
        };
        if !target_is_valid || !self.players.contains_key(shooter_id) {
            return;
        }

        let owned_by_shooter = self
            .projectile_updates
            .get(projectile_id)
            .map(|u| u.owner_id.as_deref() == Some(shooter_id))
            .unwrap_or(false);
        if !owned_by_shooter {
            return;
        }
        self.projectile_updates.get_mut(projectile_id).unwrap().dud = Some(true);

        let died = {
            let victim = self.players.get_mut(enemy_id).unwrap();
            victim.damage(shared::DAMAGE_PER_HIT);
            victim.hp == 0
        };

        if !died {
            return;
        }

        {
            let victim = self.players.get_mut(enemy_id).unwrap();
            victim.add_death();
        }
        if let Some(killer) = self.players.get_mut(shooter_id) {
            killer.add_kill();
        }
        self.respawn_queue.insert(
            enemy_id.to_string(),
            Instant::now() + std::time::Duration::from_millis(RESPAWN_DELAY_MS),
        );

        self.check_for_win();
    }

    fn check_for_win(&mut self) {
        if self.phase != MatchPhase::Active {
            return;
        }
        let mut ranked: Vec<(&String, &Player)> = self.players.iter().collect();
        ranked.sort_by(|a, b| b.1.kills.cmp(&a.1.kills));
        let top_kills = ranked.first().map(|(_, p)| p.kills).unwrap_or(0);
        if top_kills < MAX_KILL_AMOUNT {
            return;
        }

        let standings: Vec<GameOverEntry> = ranked
            .into_iter()
            .map(|(id, p)| GameOverEntry {
                player_id: id.clone(),
                kills: p.kills,
                deaths: p.deaths,
                name: p.name.clone(),
            })
            .collect();

        self.phase = MatchPhase::AwaitingReset;
        for (id, _) in self.respawn_queue.drain() {
            if let Some(player) = self.players.get_mut(&id) {
                player.heal(shared::MAX_HP);
                player.is_dead = false;
            }
        }
        if self.match_reset_deadline.is_none() {
            self.match_reset_deadline =
                Some(Instant::now() + std::time::Duration::from_millis(MATCH_RESET_DELAY_MS));
        }
        self.broadcast(Packet::GameOver(standings));
    }

    fn reset_match(&mut self) {
        self.projectile_updates.clear();
        for player in self.players.values_mut() {
            player.reset_for_new_round();
        }
        self.pending_full_state_broadcast = true;
        self.phase = MatchPhase::Active;
        self.match_reset_deadline = None;
        self.broadcast(Packet::MatchReset);
    }

    pub fn inform_show_is_live(&mut self) {
        self.broadcast(Packet::ShowIsLive);
    }

    /// Driver-invoked. Advances the accumulator by real elapsed time and
    /// runs as many fixed steps as it covers, then services the coarser
    /// timers (respawns, match reset, disconnect grace sweep).
    pub fn update(&mut self) {
        let now = Instant::now();
        let frame_ms = now.duration_since(self.last_update_time).as_secs_f64() * 1000.0;
        self.last_update_time = now;
        self.accumulator += frame_ms.min(100.0);

        let dt = (FIXED_STEP_MS / 1000.0) as f32;
        while self.accumulator >= FIXED_STEP_MS {
            self.integrate_player_inputs(dt);
            self.process_afk_players();
            self.accumulator -= FIXED_STEP_MS;
            self.server_tick += 1;
        }

        self.process_respawns(now);
        self.process_match_reset(now);
    }

    fn integrate_player_inputs(&mut self, dt: f32) {
        let ids: Vec<String> =
            self.players.iter().filter(|(_, p)| !p.is_dead).map(|(id, _)| id.clone()).collect();

        for id in ids {
            let payload = self.players.get_mut(&id).and_then(|p| p.input_queue.pop_front());
            let mut applied = true;

            let (new_last_processed, shot) = match payload {
                None => {
                    let player = self.players.get_mut(&id).unwrap();
                    let mut predicted = player.last_processed_input.vector.clone();
                    predicted.y = 0;
                    predicted.mouse = None;
                    if !player.is_afk(&predicted) {
                        player.add_input_debt(predicted.clone());
                    }
                    let new_tick = player.last_processed_input.tick + 1;
                    player.update(&predicted, dt, new_tick, &self.platforms);
                    let shot = if player.is_shooting { player.pending_shot.clone() } else { None };
                    (Some(ClientInput { tick: new_tick, vector: predicted }), shot)
                }
                Some(payload) => {
                    let player = self.players.get_mut(&id).unwrap();
                    let top = player.peek_debt().cloned();
                    match top {
                        None => {
                            player.update(&payload.vector, dt, payload.tick, &self.platforms);
                        }
                        Some(t)
                            if t.x == payload.vector.x
                                && t.y == payload.vector.y
                                && payload.vector.mouse.is_none() =>
                        {
                            player.pop_debt();
                            applied = false;
                        }
                        Some(_) => {
                            player.clear_debt();
                            player.update(&payload.vector, dt, payload.tick, &self.platforms);
                        }
                    }
                    let shot = if applied && player.is_shooting {
                        player.pending_shot.clone()
                    } else {
                        None
                    };
                    (if applied { Some(payload) } else { None }, shot)
                }
            };

            if let Some(last_processed) = new_last_processed {
                self.players.get_mut(&id).unwrap().last_processed_input = last_processed;
                if let Some(mouse) = shot {
                    self.spawn_projectile(&id, mouse);
                }
            }
        }
    }

    fn spawn_projectile(&mut self, shooter_id: &str, mouse: shared::MouseTarget) {
        let player = match self.players.get(shooter_id) {
            Some(p) => p,
            None => return,
        };
        let (vx, vy) = launch_velocity(
            player.x,
            player.y - shared::PLAYER_HEIGHT,
            mouse.x,
            mouse.y,
            PROJECTILE_SPEED,
        );
        self.projectile_updates.insert(
            mouse.id.clone(),
            ProjectileUpdate {
                id: mouse.id,
                x: Some(player.x),
                y: Some(player.y - shared::PLAYER_HEIGHT),
                vx: Some(vx),
                vy: Some(vy),
                owner_id: Some(shooter_id.to_string()),
                dud: None,
            },
        );
    }

    fn process_afk_players(&mut self) {
        let now = Instant::now();
        let mut to_remove = Vec::new();
        let mut to_warn = Vec::new();

        for (id, player) in self.players.iter() {
            if player.is_disconnected {
                continue;
            }
            if let Some(deadline) = self.afk_removal_deadline.get(id) {
                if now >= *deadline {
                    to_remove.push(id.clone());
                }
                continue;
            }
            if now.duration_since(player.last_input_timestamp).as_millis() as u64 > AFK_WARNING_MS
                && !self.afk_warned.contains_key(id)
            {
                to_warn.push((id.clone(), player.addr));
            }
        }

        for (id, addr) in to_warn {
            self.afk_warned.insert(id.clone(), now);
            self.afk_removal_deadline.insert(
                id.clone(),
                now + std::time::Duration::from_millis(AFK_REMOVE_GRACE_MS),
            );
            self.send(
                addr,
                Packet::AfkWarning { message: "you will be removed for inactivity".to_string() },
            );
        }

        for id in to_remove {
            if let Some(player) = self.players.get(&id) {
                self.send(
                    player.addr,
                    Packet::AfkRemoved { message: "removed for inactivity".to_string() },
                );
            }
            self.remove_player_entirely(&id);
        }
    }

    fn process_respawns(&mut self, now: Instant) {
        let ready: Vec<String> = self
            .respawn_queue
            .iter()
            .filter(|(_, deadline)| now >= **deadline)
            .map(|(id, _)| id.clone())
            .collect();
        for id in ready {
            self.respawn_queue.remove(&id);
            if let Some(player) = self.players.get_mut(&id) {
                player.respawn();
            }
        }
    }

    fn process_match_reset(&mut self, now: Instant) {
        if self.phase == MatchPhase::AwaitingReset {
            if let Some(deadline) = self.match_reset_deadline {
                if now >= deadline {
                    self.reset_match();
                }
            }
        }
    }

    /// Removes every cleanup entry whose grace period has expired. Returns
    /// the ids reaped so the matchmaker can drop its own bookkeeping for
    /// them — the match never reaches back into the matchmaker directly.
    pub fn sweep_expired_disconnects(&mut self) -> Vec<String> {
        let now = Instant::now();
        if (now.duration_since(self.last_disconnect_sweep).as_millis() as u64)
            < shared::DISCONNECT_SWEEP_INTERVAL_MS
        {
            return Vec::new();
        }
        self.last_disconnect_sweep = now;

        let expired: Vec<String> = self
            .disconnected_player_cleanup
            .iter()
            .filter(|(_, disconnect_time)| {
                now.duration_since(**disconnect_time).as_millis() as u64 > RECONNECT_GRACE_MS
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            self.remove_player_entirely(id);
        }
        if self.players.is_empty() {
            self.should_remove = true;
        }
        expired
    }

    fn remove_player_entirely(&mut self, id: &str) {
        self.players.remove(id);
        self.disconnected_player_cleanup.remove(id);
        self.afk_warned.remove(id);
        self.afk_removal_deadline.remove(id);
        self.rate_limits.remove(id);
        self.respawn_queue.remove(id);
        if self.players.is_empty() {
            self.should_remove = true;
        }
    }

    /// Driver-invoked. Returns the serialized broadcast size in bytes, or
    /// zero if the match has no players.
    pub fn broadcast_game_state(&mut self) -> usize {
        if self.players.is_empty() {
            return 0;
        }

        let full = self.pending_full_state_broadcast;
        let players: Vec<PlayerState> = self
            .players
            .values_mut()
            .map(|p| if full { p.full_broadcast_state() } else { p.delta_broadcast_state() })
            .collect();
        let projectiles: Vec<ProjectileUpdate> = self.projectile_updates.drain().map(|(_, v)| v).collect();

        let packet = Packet::StateUpdate {
            s_tick: self.server_tick,
            s_time: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
            players,
            projectiles,
        };

        let size = bincode::serialized_size(&packet).unwrap_or(0) as usize;
        self.broadcast(packet);
        self.pending_full_state_broadcast = false;
        size
    }

    pub fn clean_up_session(&mut self) {
        self.players.clear();
        self.respawn_queue.clear();
        self.projectile_updates.clear();
        self.disconnected_player_cleanup.clear();
        self.rate_limits.clear();
        self.afk_warned.clear();
        self.afk_removal_deadline.clear();
        self.match_reset_deadline = None;
        self.outbox.clear();
        self.should_remove = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    fn match_with_one_player() -> (Match, String) {
        let mut m = Match::new("match-abc123".to_string(), Region::Na);
        let id = m.add_player("p1".to_string(), addr(1), "astrid".to_string());
        (m, id)
    }

    #[test]
    fn add_player_is_idempotent() {
        let (mut m, id) = match_with_one_player();
        let again = m.add_player(id.clone(), addr(2), "astrid".to_string());
        assert_eq!(id, again);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn rejoin_unknown_player_errors() {
        let mut m = Match::new("match-abc123".to_string(), Region::Na);
        assert!(m.rejoin_player("ghost", addr(1)).is_err());
    }

    #[test]
    fn input_debt_pops_on_matching_real_input() {
        let (mut m, id) = match_with_one_player();
        m.handle_player_input(&id, ClientInput { tick: 1, vector: InputVector { x: 1, y: 0, mouse: None } });

        // step 1: real input consumed, no debt yet.
        m.integrate_player_inputs(1.0 / 30.0);
        assert!(m.players[&id].input_debt.is_empty());

        // three more steps with nothing queued: each predicts and pushes debt.
        m.integrate_player_inputs(1.0 / 30.0);
        m.integrate_player_inputs(1.0 / 30.0);
        m.integrate_player_inputs(1.0 / 30.0);
        assert_eq!(m.players[&id].input_debt.len(), 3);

        // matching real input pops exactly one.
        m.handle_player_input(&id, ClientInput { tick: 2, vector: InputVector { x: 1, y: 0, mouse: None } });
        m.integrate_player_inputs(1.0 / 30.0);
        assert_eq!(m.players[&id].input_debt.len(), 2);
    }

    #[test]
    fn diverging_input_clears_debt_stack() {
        let (mut m, id) = match_with_one_player();
        m.handle_player_input(&id, ClientInput { tick: 1, vector: InputVector { x: 1, y: 0, mouse: None } });
        m.integrate_player_inputs(1.0 / 30.0);
        m.integrate_player_inputs(1.0 / 30.0);
        assert!(!m.players[&id].input_debt.is_empty());

        m.handle_player_input(&id, ClientInput { tick: 2, vector: InputVector { x: -1, y: 0, mouse: None } });
        m.integrate_player_inputs(1.0 / 30.0);
        assert!(m.players[&id].input_debt.is_empty());
    }

    #[test]
    fn no_input_window_never_gains_altitude() {
        let (mut m, id) = match_with_one_player();
        m.players.get_mut(&id).unwrap().is_on_surface = true;
        for _ in 0..5 {
            m.integrate_player_inputs(1.0 / 30.0);
        }
        assert!(m.players[&id].vy >= 0.0);
    }

    #[test]
    fn four_kills_triggers_game_over_and_schedules_reset() {
        let mut m = Match::new("match-abc123".to_string(), Region::Na);
        let shooter = m.add_player("shooter".to_string(), addr(1), "shooter".to_string());
        let victim = m.add_player("victim".to_string(), addr(2), "victim".to_string());

        for _ in 0..MAX_KILL_AMOUNT {
            m.players.get_mut(&victim).unwrap().hp = 10;
            m.projectile_updates.insert(
                "proj".to_string(),
                ProjectileUpdate {
                    id: "proj".to_string(),
                    x: None,
                    y: None,
                    vx: None,
                    vy: None,
                    owner_id: Some(shooter.clone()),
                    dud: None,
                },
            );
            m.handle_projectile_hit(&shooter, &victim, "proj");
        }

        assert_eq!(m.phase, MatchPhase::AwaitingReset);
        assert!(m.match_reset_deadline.is_some());
        assert_eq!(m.players[&shooter].kills, MAX_KILL_AMOUNT);
    }

    #[test]
    fn reset_match_clears_scores_but_keeps_bystander_flag() {
        let (mut m, id) = match_with_one_player();
        m.players.get_mut(&id).unwrap().kills = 4;
        m.players.get_mut(&id).unwrap().is_bystander = true;
        m.phase = MatchPhase::AwaitingReset;
        m.reset_match();
        assert_eq!(m.players[&id].kills, 0);
        assert_eq!(m.players[&id].hp, shared::MAX_HP);
        assert!(m.players[&id].is_bystander);
        assert_eq!(m.phase, MatchPhase::Active);
    }

    #[test]
    fn rate_limit_drops_excess_inputs_in_window() {
        let (mut m, id) = match_with_one_player();
        let mut accepted = 0;
        for tick in 0..(INPUT_RATE_LIMIT_MAX_PER_WINDOW + 10) {
            if m.handle_player_input(&id, ClientInput { tick, vector: InputVector::zero() }) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, INPUT_RATE_LIMIT_MAX_PER_WINDOW);
    }

    #[test]
    fn hit_on_bystander_is_ignored() {
        let mut m = Match::new("match-abc123".to_string(), Region::Na);
        let shooter = m.add_player("shooter".to_string(), addr(1), "shooter".to_string());
        let victim = m.add_player("victim".to_string(), addr(2), "victim".to_string());
        m.players.get_mut(&victim).unwrap().is_bystander = true;
        m.handle_projectile_hit(&shooter, &victim, "proj");
        assert_eq!(m.players[&victim].hp, shared::MAX_HP);
    }

    #[test]
    fn disconnect_then_immediate_sweep_does_not_remove_within_grace() {
        let (mut m, id) = match_with_one_player();
        m.disconnect_player(&id);
        m.last_disconnect_sweep = Instant::now() - std::time::Duration::from_millis(4000);
        let reaped = m.sweep_expired_disconnects();
        assert!(reaped.is_empty());
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn disconnect_past_grace_is_reaped_and_empties_match() {
        let (mut m, id) = match_with_one_player();
        m.disconnect_player(&id);
        m.disconnected_player_cleanup
            .insert(id.clone(), Instant::now() - std::time::Duration::from_millis(RECONNECT_GRACE_MS + 1));
        m.last_disconnect_sweep = Instant::now() - std::time::Duration::from_millis(4000);
        let reaped = m.sweep_expired_disconnects();
        assert_eq!(reaped, vec![id]);
        assert!(m.should_remove);
    }

    #[test]
    fn broadcast_returns_zero_for_empty_match() {
        let mut m = Match::new("match-abc123".to_string(), Region::Na);
        assert_eq!(m.broadcast_game_state(), 0);
    }

    #[test]
    fn full_state_broadcast_flag_clears_after_one_cycle() {
        let (mut m, _id) = match_with_one_player();
        assert!(m.pending_full_state_broadcast);
        let size = m.broadcast_game_state();
        assert!(size > 0);
        assert!(!m.pending_full_state_broadcast);
    }
}
