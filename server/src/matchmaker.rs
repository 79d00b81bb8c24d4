//! Registry of in-flight matches: region-based first-fit placement,
//! reconnect routing by stable `playerMatchId`, and the global 30 Hz driver
//! that advances and broadcasts every match. This is the component the
//! teacher has no counterpart for — it generalizes a single `GameState`
//! into many, while keeping the teacher's "one owner, no internal locking"
//! style (`server::network::Server` owning `GameState` directly).

use std::collections::HashMap;
use std::net::SocketAddr;

use log::{info, warn};
use shared::{ClientInput, Packet, Region};

use crate::ids::{derive_player_match_id, generate_match_id, generate_session_token};
use crate::match_state::Match;

pub enum EnqueueOutcome {
    Found { match_id: String, region: Region, player_id: String },
    Rejoined { match_id: String, region: Region },
}

pub struct Matchmaker {
    matches: HashMap<String, Match>,
    match_order: Vec<String>,
    disconnected_players: HashMap<String, String>,
    addr_index: HashMap<SocketAddr, (String, String)>,
    valid_regions: Vec<Region>,
    max_players_per_match: usize,
    show_is_live: bool,
}

impl Matchmaker {
    pub fn new(valid_regions: Vec<Region>, max_players_per_match: usize) -> Self {
        Matchmaker {
            matches: HashMap::new(),
            match_order: Vec::new(),
            disconnected_players: HashMap::new(),
            addr_index: HashMap::new(),
            valid_regions,
            max_players_per_match,
            show_is_live: false,
        }
    }

    pub fn is_valid_region(&self, region: Region) -> bool {
        self.valid_regions.contains(&region)
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    pub fn enqueue_player(
        &mut self,
        addr: SocketAddr,
        name: String,
        region: Region,
        player_match_id: Option<String>,
    ) -> Result<EnqueueOutcome, String> {
        if let Some(id) = player_match_id {
            if let Some(match_id) = self.disconnected_players.get(&id).cloned() {
                let existing_match = self
                    .matches
                    .get_mut(&match_id)
                    .ok_or_else(|| "match no longer exists".to_string())?;
                existing_match.rejoin_player(&id, addr)?;
                self.disconnected_players.remove(&id);
                self.addr_index.insert(addr, (match_id.clone(), id));
                return Ok(EnqueueOutcome::Rejoined { match_id, region: existing_match.region });
            }
        }

        for match_id in self.match_order.clone() {
            let candidate = match self.matches.get(&match_id) {
                Some(m) => m,
                None => continue,
            };
            if candidate.region == region && candidate.has_room(self.max_players_per_match) {
                let session_token = generate_session_token();
                let player_id = derive_player_match_id(&session_token, &match_id);
                let m = self.matches.get_mut(&match_id).unwrap();
                let assigned = m.add_player(player_id, addr, name);
                self.addr_index.insert(addr, (match_id.clone(), assigned.clone()));
                return Ok(EnqueueOutcome::Found { match_id, region, player_id: assigned });
            }
        }

        let match_id = loop {
            let candidate = generate_match_id();
            if !self.matches.contains_key(&candidate) {
                break candidate;
            }
        };
        let mut new_match = Match::new(match_id.clone(), region);
        let session_token = generate_session_token();
        let player_id = derive_player_match_id(&session_token, &match_id);
        let assigned = new_match.add_player(player_id, addr, name);
        self.matches.insert(match_id.clone(), new_match);
        self.match_order.push(match_id.clone());
        self.addr_index.insert(addr, (match_id.clone(), assigned.clone()));
        info!("created match {match_id} in region {region}");
        Ok(EnqueueOutcome::Found { match_id, region, player_id: assigned })
    }

    pub fn route(&mut self, addr: SocketAddr) -> Option<(&mut Match, String)> {
        let (match_id, player_id) = self.addr_index.get(&addr)?.clone();
        let m = self.matches.get_mut(&match_id)?;
        Some((m, player_id))
    }

    pub fn handle_player_input(&mut self, addr: SocketAddr, input: ClientInput) {
        if let Some((m, player_id)) = self.route(addr) {
            if !m.handle_player_input(&player_id, input) {
                warn!("dropped input from {player_id}: rate limit exceeded");
            }
        } else {
            warn!("input from unknown session {addr}");
        }
    }

    pub fn handle_projectile_hit(&mut self, addr: SocketAddr, enemy_id: &str, projectile_id: &str) {
        if let Some((m, player_id)) = self.route(addr) {
            m.handle_projectile_hit(&player_id, enemy_id, projectile_id);
        } else {
            warn!("projectileHit from unknown session {addr}");
        }
    }

    pub fn handle_toggle_bystander(&mut self, addr: SocketAddr) {
        if let Some((m, player_id)) = self.route(addr) {
            m.toggle_bystander(&player_id);
        }
    }

    pub fn handle_disconnect(&mut self, addr: SocketAddr) {
        if let Some((match_id, player_id)) = self.addr_index.remove(&addr) {
            if let Some(m) = self.matches.get_mut(&match_id) {
                m.disconnect_player(&player_id);
            }
            self.disconnected_players.insert(player_id, match_id);
        }
    }

    pub fn trigger_show_is_live(&mut self) {
        self.show_is_live = true;
    }

    /// One driver tick: reap empty matches, advance and broadcast the rest.
    /// Returns every outbound packet queued by every match this tick.
    pub fn drive(&mut self) -> Vec<(SocketAddr, Packet)> {
        let mut outbound = Vec::new();

        let order = self.match_order.clone();
        for match_id in order {
            let should_reap = matches!(self.matches.get(&match_id), Some(m) if m.should_remove);
            if should_reap {
                if let Some(mut m) = self.matches.remove(&match_id) {
                    m.clean_up_session();
                }
                self.match_order.retain(|id| id != &match_id);
                self.disconnected_players.retain(|_, mid| mid != &match_id);
                self.addr_index.retain(|_, (mid, _)| mid != &match_id);
                info!("reaped empty match {match_id}");
                continue;
            }

            let m = self.matches.get_mut(&match_id).unwrap();
            if self.show_is_live {
                m.inform_show_is_live();
            }
            let reaped_players = m.sweep_expired_disconnects();
            for player_id in reaped_players {
                self.addr_index.retain(|_, (mid, pid)| !(mid == &match_id && pid == &player_id));
            }

            m.update();
            m.broadcast_game_state();
            outbound.extend(m.drain_outbound());
        }

        self.show_is_live = false;
        outbound
    }

    pub fn shutdown(&mut self) {
        for (_, mut m) in self.matches.drain() {
            m.clean_up_session();
        }
        self.match_order.clear();
        self.disconnected_players.clear();
        self.addr_index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::InputVector;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    fn mm() -> Matchmaker {
        Matchmaker::new(vec![Region::Na, Region::Eu], 2)
    }

    #[test]
    fn first_player_creates_a_match() {
        let mut m = mm();
        let outcome = m.enqueue_player(addr(1), "a".to_string(), Region::Na, None).unwrap();
        assert_eq!(m.match_count(), 1);
        match outcome {
            EnqueueOutcome::Found { region, .. } => assert_eq!(region, Region::Na),
            _ => panic!("expected Found"),
        }
    }

    #[test]
    fn second_player_same_region_joins_existing_match() {
        let mut m = mm();
        m.enqueue_player(addr(1), "a".to_string(), Region::Na, None).unwrap();
        m.enqueue_player(addr(2), "b".to_string(), Region::Na, None).unwrap();
        assert_eq!(m.match_count(), 1);
    }

    #[test]
    fn full_match_spills_into_a_new_one() {
        let mut m = mm();
        m.enqueue_player(addr(1), "a".to_string(), Region::Na, None).unwrap();
        m.enqueue_player(addr(2), "b".to_string(), Region::Na, None).unwrap();
        m.enqueue_player(addr(3), "c".to_string(), Region::Na, None).unwrap();
        assert_eq!(m.match_count(), 2);
    }

    #[test]
    fn different_regions_never_share_a_match() {
        let mut m = mm();
        m.enqueue_player(addr(1), "a".to_string(), Region::Na, None).unwrap();
        m.enqueue_player(addr(2), "b".to_string(), Region::Eu, None).unwrap();
        assert_eq!(m.match_count(), 2);
    }

    #[test]
    fn disconnect_then_reconnect_within_grace_routes_back() {
        let mut m = mm();
        let outcome = m.enqueue_player(addr(1), "a".to_string(), Region::Na, None).unwrap();
        let player_id = match outcome {
            EnqueueOutcome::Found { player_id, .. } => player_id,
            _ => panic!(),
        };
        m.handle_disconnect(addr(1));
        let rejoin = m.enqueue_player(addr(99), "a".to_string(), Region::Na, Some(player_id)).unwrap();
        assert!(matches!(rejoin, EnqueueOutcome::Rejoined { .. }));
    }

    #[test]
    fn reconnect_after_grace_expires_is_rejected_even_if_match_survives() {
        let mut m = mm();
        let outcome = m.enqueue_player(addr(1), "a".to_string(), Region::Na, None).unwrap();
        let (match_id, player_id) = match outcome {
            EnqueueOutcome::Found { match_id, player_id, .. } => (match_id, player_id),
            _ => panic!(),
        };
        m.enqueue_player(addr(2), "b".to_string(), Region::Na, None).unwrap();

        m.handle_disconnect(addr(1));
        m.matches.get_mut(&match_id).unwrap().disconnected_player_cleanup.insert(
            player_id.clone(),
            std::time::Instant::now() - std::time::Duration::from_millis(shared::RECONNECT_GRACE_MS + 1),
        );
        m.matches.get_mut(&match_id).unwrap().last_disconnect_sweep =
            std::time::Instant::now() - std::time::Duration::from_millis(4000);
        m.drive();

        let rejoin = m.enqueue_player(addr(99), "a".to_string(), Region::Na, Some(player_id));
        assert!(rejoin.is_err());
    }

    #[test]
    fn routed_input_reaches_the_owning_match() {
        let mut m = mm();
        let outcome = m.enqueue_player(addr(1), "a".to_string(), Region::Na, None).unwrap();
        let player_id = match outcome {
            EnqueueOutcome::Found { player_id, .. } => player_id,
            _ => panic!(),
        };
        m.handle_player_input(addr(1), ClientInput { tick: 1, vector: InputVector::zero() });
        let (matched, _) = m.route(addr(1)).unwrap();
        assert!(!matched.players[&player_id].input_queue.is_empty());
    }

    #[test]
    fn drive_reaps_empty_matches() {
        let mut m = mm();
        let outcome = m.enqueue_player(addr(1), "a".to_string(), Region::Na, None).unwrap();
        let (match_id, player_id) = match outcome {
            EnqueueOutcome::Found { match_id, player_id, .. } => (match_id, player_id),
            _ => panic!(),
        };
        m.matches.get_mut(&match_id).unwrap().players.remove(&player_id);
        m.matches.get_mut(&match_id).unwrap().should_remove = true;
        m.drive();
        assert_eq!(m.match_count(), 0);
    }
}
