//! Connection gateway: the first stop for a new UDP session. Validates the
//! requested region and hands off to the matchmaker, grounded on the
//! teacher's `Server::handle_packet` `Packet::Connect` arm in
//! `server/src/network.rs`, generalized from "the one match" to "ask the
//! matchmaker which match".

use std::net::SocketAddr;
use std::str::FromStr;

use log::warn;
use shared::{Packet, Region};

use crate::matchmaker::{EnqueueOutcome, Matchmaker};

/// Handles a `JoinQueue` packet. Returns the single reply packet to send
/// back to `addr` — either a success event or an `error` telling the
/// client its session will be closed.
pub fn handle_join_queue(
    matchmaker: &mut Matchmaker,
    addr: SocketAddr,
    region: String,
    name: String,
    player_match_id: Option<String>,
) -> Packet {
    let region = match Region::from_str(&region) {
        Ok(r) if matchmaker.is_valid_region(r) => r,
        Ok(_) | Err(_) => {
            warn!("rejected join from {addr}: invalid region {region:?}");
            return Packet::Error { message: format!("invalid region: {region}") };
        }
    };

    match matchmaker.enqueue_player(addr, name, region, player_match_id) {
        Ok(EnqueueOutcome::Found { match_id, region, player_id }) => {
            Packet::MatchFound { match_id, region, player_id }
        }
        Ok(EnqueueOutcome::Rejoined { match_id, region }) => {
            Packet::RejoinedMatch { match_id, region }
        }
        Err(message) => {
            warn!("rejected join from {addr}: {message}");
            Packet::Error { message }
        }
    }
}

/// A session dropping is logged only here; the state transition itself
/// belongs to whichever match owned the session (spec §4.6).
pub fn handle_session_disconnect(matchmaker: &mut Matchmaker, addr: SocketAddr) {
    matchmaker.handle_disconnect(addr);
}
